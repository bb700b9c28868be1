//! The acceptance transaction: accept one proposal, atomically
//!
//! Given a pending proposal, this produces the whole post-acceptance world
//! state in a single unit of work: the contract, the accepted proposal, the
//! in-progress project, and the rejected siblings. Preconditions are
//! re-validated inside the transaction rather than trusted from the caller,
//! because two accepts can race between the caller's check and the commit.
//!
//! The transaction runs in immediate mode: the write lock is taken before
//! any read. A deferred transaction would let two racing accepts both pass
//! re-validation under read locks and then fail upgrading to write; in
//! immediate mode the second one waits, then re-reads the state the first
//! one committed. The unique constraint on contracts.project_id is the
//! final arbiter: exactly one racing accept can insert, the other maps the
//! violation to a conflict and rolls back with no partial writes.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{is_lock_contention, is_unique_violation, AppError, Result};
use crate::models::{Contract, Proposal, ProposalStatus};
use crate::workflow::events::DomainEvent;

/// Everything the committed acceptance produced
#[derive(Debug)]
pub struct AcceptanceOutcome {
    pub proposal: Proposal,
    pub contract: Contract,
    pub events: Vec<DomainEvent>,
}

/// State written by the transaction, captured before commit so the events
/// can be built afterwards
struct Committed {
    proposal: Proposal,
    contract: Contract,
    owner_id: Uuid,
    rejected: Vec<(Uuid, Uuid)>,
}

/// Accept a pending proposal in one atomic unit of work.
///
/// On any precondition violation the transaction aborts with a conflict and
/// nothing is written: the proposal stays pending, the project stays open,
/// and no contract exists.
pub async fn accept_proposal(pool: &SqlitePool, proposal_id: Uuid) -> Result<AcceptanceOutcome> {
    let mut conn = pool.acquire().await?;

    // A lock timeout here means a racing writer held the database the whole
    // wait; report it as contention on the decision, not a storage failure.
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_lock_contention(&e) {
                AppError::Conflict("Another decision is in progress for this project".to_string())
            } else {
                e.into()
            }
        })?;

    let committed = match apply(&mut conn, proposal_id).await {
        Ok(committed) => committed,
        Err(e) => {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(e);
        }
    };
    if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
        let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
        return Err(e.into());
    }

    // Events only now that the commit is durable
    let project_id = committed.proposal.project_id;
    let mut events = vec![DomainEvent::ProposalAccepted {
        proposal_id,
        project_id,
        bidder_id: committed.proposal.bidder_id,
    }];
    for (sibling_id, sibling_bidder) in &committed.rejected {
        events.push(DomainEvent::ProposalRejected {
            proposal_id: *sibling_id,
            project_id,
            bidder_id: *sibling_bidder,
        });
    }
    events.push(DomainEvent::ProjectInProgress {
        project_id,
        owner_id: committed.owner_id,
    });

    Ok(AcceptanceOutcome {
        proposal: committed.proposal,
        contract: committed.contract,
        events,
    })
}

/// The body of the transaction: every statement runs on the connection
/// holding the write lock
async fn apply(conn: &mut SqliteConnection, proposal_id: Uuid) -> Result<Committed> {
    let now = Utc::now();

    // Step 1: re-validate inside the transaction
    let row: Option<(String, String, f64, String, String, chrono::DateTime<Utc>)> =
        sqlx::query_as(
            r#"
            SELECT project_id, bidder_id, rate, cover_letter, status, submitted_at
            FROM proposals
            WHERE id = ?
            "#,
        )
        .bind(proposal_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    let (project_id_s, bidder_id_s, rate, cover_letter, status_s, submitted_at) = row
        .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", proposal_id)))?;

    let status: ProposalStatus = status_s
        .parse()
        .map_err(|e| AppError::Internal(format!("Invalid status: {}", e)))?;
    if status != ProposalStatus::Pending {
        return Err(AppError::Conflict(format!(
            "Proposal is already {}",
            status.as_str()
        )));
    }

    let project_id = parse_uuid(&project_id_s)?;
    let bidder_id = parse_uuid(&bidder_id_s)?;

    let project_row: Option<(String, String)> =
        sqlx::query_as("SELECT status, owner_id FROM projects WHERE id = ?")
            .bind(&project_id_s)
            .fetch_optional(&mut *conn)
            .await?;
    let (project_status, owner_id_s) = project_row
        .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project_id)))?;
    if project_status != "open" {
        return Err(AppError::Conflict("Project is not open".to_string()));
    }
    let owner_id = parse_uuid(&owner_id_s)?;

    // Step 2: create the contract; the unique constraint on project_id
    // makes creation exactly-once even under concurrent commits
    let contract_id = Uuid::new_v4();
    let start_date = now.date_naive();
    sqlx::query(
        r#"
        INSERT INTO contracts (id, project_id, freelancer_id, agreed_rate, start_date, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(contract_id.to_string())
    .bind(&project_id_s)
    .bind(&bidder_id_s)
    .bind(rate)
    .bind(start_date)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Contract already exists for this project".to_string())
        } else {
            e.into()
        }
    })?;

    // Step 3: mark the winning proposal accepted, conditionally
    let updated = sqlx::query(
        r#"
        UPDATE proposals SET status = 'accepted', updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(now)
    .bind(proposal_id.to_string())
    .execute(&mut *conn)
    .await?;
    if updated.rows_affected() != 1 {
        return Err(AppError::Conflict("Proposal is already decided".to_string()));
    }

    // Step 4: move the project to in-progress, conditionally
    let updated = sqlx::query(
        r#"
        UPDATE projects SET status = 'in_progress', updated_at = ?
        WHERE id = ? AND status = 'open'
        "#,
    )
    .bind(now)
    .bind(&project_id_s)
    .execute(&mut *conn)
    .await?;
    if updated.rows_affected() != 1 {
        return Err(AppError::Conflict("Project is not open".to_string()));
    }

    // Step 5: bulk-reject every other pending sibling in one conditional
    // statement, so a concurrently withdrawn bid is never resurrected
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        UPDATE proposals SET status = 'rejected', updated_at = ?
        WHERE project_id = ? AND status = 'pending' AND id <> ?
        RETURNING id, bidder_id
        "#,
    )
    .bind(now)
    .bind(&project_id_s)
    .bind(proposal_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let rejected = rows
        .iter()
        .map(|(id, bidder)| Ok((parse_uuid(id)?, parse_uuid(bidder)?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Committed {
        proposal: Proposal {
            id: proposal_id,
            project_id,
            bidder_id,
            rate,
            cover_letter,
            status: ProposalStatus::Accepted,
            submitted_at,
            updated_at: now,
        },
        contract: Contract {
            id: contract_id,
            project_id,
            freelancer_id: bidder_id,
            agreed_rate: rate,
            start_date,
            created_at: now,
        },
        owner_id,
        rejected,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Internal(format!("Invalid UUID: {}", e)))
}
