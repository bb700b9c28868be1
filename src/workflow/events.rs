//! Domain events emitted by the workflow engine
//!
//! Events fire strictly after the storage transaction commits, so a rolled
//! back attempt never produces one.

use uuid::Uuid;

/// Events broadcast to the notification dispatcher
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A freelancer submitted a proposal on an open project
    ProposalSubmitted {
        proposal_id: Uuid,
        project_id: Uuid,
        bidder_id: Uuid,
        owner_id: Uuid,
    },
    /// A proposal was accepted and a contract created
    ProposalAccepted {
        proposal_id: Uuid,
        project_id: Uuid,
        bidder_id: Uuid,
    },
    /// A proposal was rejected, either directly or as a losing sibling
    ProposalRejected {
        proposal_id: Uuid,
        project_id: Uuid,
        bidder_id: Uuid,
    },
    /// The project moved to in-progress after an acceptance
    ProjectInProgress {
        project_id: Uuid,
        owner_id: Uuid,
    },
}

impl DomainEvent {
    /// The actor who should be notified about this event
    pub fn recipient(&self) -> Uuid {
        match self {
            DomainEvent::ProposalSubmitted { owner_id, .. } => *owner_id,
            DomainEvent::ProposalAccepted { bidder_id, .. } => *bidder_id,
            DomainEvent::ProposalRejected { bidder_id, .. } => *bidder_id,
            DomainEvent::ProjectInProgress { owner_id, .. } => *owner_id,
        }
    }
}
