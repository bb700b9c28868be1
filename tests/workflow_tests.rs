//! End-to-end workflow tests: events, notifications, and the acceptance
//! invariants exercised through the public library surface

use sqlx::sqlite::SqlitePoolOptions;

use tender::models::{Decision, Role};
use tender::models::{CreateProjectRequest, SubmitProposalRequest};
use tender::notify;
use tender::store::Store;
use tender::workflow::Workflow;

async fn setup() -> (Workflow, Store) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let store = Store::new(pool);
    (Workflow::new(store.clone()), store)
}

fn project_req(title: &str) -> CreateProjectRequest {
    CreateProjectRequest {
        title: title.to_string(),
        description: Some("Details".to_string()),
        budget: 500.0,
        skills_required: Some(vec!["rust".to_string()]),
    }
}

fn proposal_req(project_id: uuid::Uuid, rate: f64) -> SubmitProposalRequest {
    SubmitProposalRequest {
        project_id,
        rate,
        cover_letter: Some("I can do this".to_string()),
    }
}

#[tokio::test]
async fn test_acceptance_produces_notifications_after_commit() {
    let (workflow, store) = setup().await;
    let dispatcher = notify::spawn_dispatcher(store.clone(), workflow.subscribe());

    let alice = store.create_actor("alice", Role::Client).await.unwrap();
    let bob = store.create_actor("bob", Role::Freelancer).await.unwrap();
    let dave = store.create_actor("dave", Role::Freelancer).await.unwrap();

    let project = workflow
        .create_project(&alice, &project_req("Site"))
        .await
        .unwrap();
    let a = workflow
        .submit_proposal(&bob, &proposal_req(project.id, 50.0))
        .await
        .unwrap();
    workflow
        .submit_proposal(&dave, &proposal_req(project.id, 60.0))
        .await
        .unwrap();

    workflow
        .decide_proposal(&alice, a.id, Decision::Accepted)
        .await
        .unwrap();

    // Give the dispatcher task a moment to drain the channel
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    // Winner notified of acceptance
    let bob_notifications = store.list_notifications_for(bob.id).await.unwrap();
    assert!(bob_notifications
        .iter()
        .any(|n| n.message == "Your proposal was accepted"));

    // Losing sibling notified of rejection
    let dave_notifications = store.list_notifications_for(dave.id).await.unwrap();
    assert!(dave_notifications
        .iter()
        .any(|n| n.message == "Your proposal was rejected"));

    // Owner notified twice: the submissions, then the project start
    let alice_notifications = store.list_notifications_for(alice.id).await.unwrap();
    assert!(alice_notifications
        .iter()
        .any(|n| n.message == "Your project is now in progress"));
    assert_eq!(
        alice_notifications
            .iter()
            .filter(|n| n.message == "A new proposal was submitted on your project")
            .count(),
        2
    );

    dispatcher.abort();
}

#[tokio::test]
async fn test_failed_decision_produces_no_notification() {
    let (workflow, store) = setup().await;
    let dispatcher = notify::spawn_dispatcher(store.clone(), workflow.subscribe());

    let alice = store.create_actor("alice", Role::Client).await.unwrap();
    let carol = store.create_actor("carol", Role::Client).await.unwrap();
    let bob = store.create_actor("bob", Role::Freelancer).await.unwrap();

    let project = workflow
        .create_project(&alice, &project_req("Site"))
        .await
        .unwrap();
    let proposal = workflow
        .submit_proposal(&bob, &proposal_req(project.id, 50.0))
        .await
        .unwrap();

    // A denied accept emits nothing
    workflow
        .decide_proposal(&carol, proposal.id, Decision::Accepted)
        .await
        .unwrap_err();

    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    let bob_notifications = store.list_notifications_for(bob.id).await.unwrap();
    assert!(bob_notifications
        .iter()
        .all(|n| !n.message.contains("accepted")));

    dispatcher.abort();
}

#[tokio::test]
async fn test_notification_read_lifecycle() {
    let (workflow, store) = setup().await;
    let dispatcher = notify::spawn_dispatcher(store.clone(), workflow.subscribe());

    let alice = store.create_actor("alice", Role::Client).await.unwrap();
    let bob = store.create_actor("bob", Role::Freelancer).await.unwrap();

    let project = workflow
        .create_project(&alice, &project_req("Site"))
        .await
        .unwrap();
    let proposal = workflow
        .submit_proposal(&bob, &proposal_req(project.id, 50.0))
        .await
        .unwrap();
    workflow
        .decide_proposal(&alice, proposal.id, Decision::Accepted)
        .await
        .unwrap();

    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    let notifications = store.list_notifications_for(alice.id).await.unwrap();
    assert!(!notifications.is_empty());
    assert!(notifications.iter().all(|n| !n.read));

    let flipped = store.mark_all_notifications_read(alice.id).await.unwrap();
    assert_eq!(flipped as usize, notifications.len());

    let notifications = store.list_notifications_for(alice.id).await.unwrap();
    assert!(notifications.iter().all(|n| n.read));

    // Bob's are untouched
    let bob_notifications = store.list_notifications_for(bob.id).await.unwrap();
    assert!(bob_notifications.iter().all(|n| !n.read));

    dispatcher.abort();
}

#[tokio::test]
async fn test_contract_rate_snapshots_proposal_rate() {
    let (workflow, store) = setup().await;

    let alice = store.create_actor("alice", Role::Client).await.unwrap();
    let bob = store.create_actor("bob", Role::Freelancer).await.unwrap();

    let project = workflow
        .create_project(&alice, &project_req("Site"))
        .await
        .unwrap();
    let proposal = workflow
        .submit_proposal(&bob, &proposal_req(project.id, 72.5))
        .await
        .unwrap();
    workflow
        .decide_proposal(&alice, proposal.id, Decision::Accepted)
        .await
        .unwrap();

    let contract = store
        .get_contract_for_project(project.id)
        .await
        .unwrap()
        .expect("contract should exist");
    assert_eq!(contract.agreed_rate, 72.5);
    assert_eq!(contract.freelancer_id, bob.id);

    // Later proposal edits are impossible, so the snapshot can never drift
    let fetched = store.get_proposal(proposal.id).await.unwrap();
    assert_eq!(fetched.rate, 72.5);
}
