//! Data models for actors, projects, proposals and contracts

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of an actor, fixed at profile creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Freelancer,
    /// Staff role, used only for visibility (sees everything)
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Freelancer => "freelancer",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "freelancer" => Ok(Role::Freelancer),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// An authenticated identity with a role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Status of a project; system-controlled, never client-writable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Open => "open",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ProjectStatus::Open),
            "in_progress" => Ok(ProjectStatus::InProgress),
            "completed" => Ok(ProjectStatus::Completed),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            _ => Err(format!("Invalid project status: {}", s)),
        }
    }
}

/// A unit of work posted by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub budget: f64,
    pub skills_required: Vec<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status of a proposal
///
/// Transitions are monotonic: Pending moves to Accepted or Rejected and
/// never leaves either terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
        }
    }

    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Accepted | ProposalStatus::Rejected)
    }
}

impl std::str::FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProposalStatus::Pending),
            "accepted" => Ok(ProposalStatus::Accepted),
            "rejected" => Ok(ProposalStatus::Rejected),
            _ => Err(format!("Invalid proposal status: {}", s)),
        }
    }
}

/// A freelancer's bid on a project
///
/// At most one proposal exists per (project, bidder) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub project_id: Uuid,
    pub bidder_id: Uuid,
    pub rate: f64,
    pub cover_letter: String,
    pub status: ProposalStatus,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The binding record created when a proposal is accepted
///
/// Unique per project, created only by the acceptance transaction, and
/// immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub project_id: Uuid,
    pub freelancer_id: Uuid,
    pub agreed_rate: f64,
    pub start_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Feedback one contract party leaves about the other after acceptance
///
/// The reviewee is always derived from the contract parties; at most one
/// review per (project, reviewer, reviewee) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub project_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted notification produced from a domain event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub message: String,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Request to provision an actor
#[derive(Debug, Deserialize)]
pub struct CreateActorRequest {
    pub username: String,
    pub role: Role,
}

/// Request to create a new project
#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: Option<String>,
    pub budget: f64,
    pub skills_required: Option<Vec<String>>,
}

/// Request to edit a project; status is deliberately absent
#[derive(Debug, Default, Deserialize)]
pub struct EditProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub budget: Option<f64>,
    pub skills_required: Option<Vec<String>>,
}

/// Request to submit a proposal
#[derive(Debug, Deserialize)]
pub struct SubmitProposalRequest {
    pub project_id: Uuid,
    pub rate: f64,
    pub cover_letter: Option<String>,
}

/// Request to edit a pending proposal; status is deliberately absent
#[derive(Debug, Default, Deserialize)]
pub struct EditProposalRequest {
    pub rate: Option<f64>,
    pub cover_letter: Option<String>,
}

/// A client's decision on a pending proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Rejected,
}

/// Request body for deciding a proposal
#[derive(Debug, Deserialize)]
pub struct DecideProposalRequest {
    pub decision: Decision,
}

/// Request to review the other party on a contracted project; the reviewee
/// is derived server-side, never client-supplied
#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    pub project_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}
