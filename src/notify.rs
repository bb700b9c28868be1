//! Notification dispatcher: turns committed domain events into persisted
//! notifications
//!
//! Runs as a spawned task consuming the workflow's broadcast channel, so
//! dispatch can never delay or undo a commit. Failures here are logged and
//! dropped; delivery transport is an external concern.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::store::Store;
use crate::workflow::DomainEvent;

/// Render the user-facing message for an event
pub fn render_message(event: &DomainEvent) -> String {
    match event {
        DomainEvent::ProposalSubmitted { .. } => {
            "A new proposal was submitted on your project".to_string()
        }
        DomainEvent::ProposalAccepted { .. } => "Your proposal was accepted".to_string(),
        DomainEvent::ProposalRejected { .. } => "Your proposal was rejected".to_string(),
        DomainEvent::ProjectInProgress { .. } => "Your project is now in progress".to_string(),
    }
}

fn references(event: &DomainEvent) -> (Option<uuid::Uuid>, Option<uuid::Uuid>) {
    match event {
        DomainEvent::ProposalSubmitted {
            project_id,
            proposal_id,
            ..
        }
        | DomainEvent::ProposalAccepted {
            project_id,
            proposal_id,
            ..
        }
        | DomainEvent::ProposalRejected {
            project_id,
            proposal_id,
            ..
        } => (Some(*project_id), Some(*proposal_id)),
        DomainEvent::ProjectInProgress { project_id, .. } => (Some(*project_id), None),
    }
}

/// Persist a single event as a notification row
pub async fn dispatch(store: &Store, event: &DomainEvent) {
    let (project_id, proposal_id) = references(event);
    let message = render_message(event);
    if let Err(e) = store
        .create_notification(event.recipient(), &message, project_id, proposal_id)
        .await
    {
        tracing::error!("Failed to persist notification: {}", e);
    }
}

/// Spawn the dispatcher loop over a subscription to the workflow's events
pub fn spawn_dispatcher(store: Store, mut events: broadcast::Receiver<DomainEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => dispatch(&store, &event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Notification dispatcher lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
