//! Authorization policy: allow/deny decisions per actor, action and resource
//!
//! Pure decision function over a fixed rule table. Each resource kind
//! supplies an ownership resolver instead of attribute probing, so the
//! rules below dispatch on an explicit [`Ownership`] value.

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Actor, Contract, Project, ProjectStatus, Proposal, ProposalStatus, Role};
use crate::visibility::{self, ProjectRelation};

/// An action an actor attempts against a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Edit,
    Delete,
    Decide,
}

impl Action {
    /// Safe actions never mutate state
    pub fn is_safe(&self) -> bool {
        matches!(self, Action::Read)
    }
}

/// A resource under policy, carrying enough context for ownership and
/// visibility resolution
pub enum Resource<'a> {
    /// An existing project; relation is the acting freelancer's link to it
    Project {
        project: &'a Project,
        relation: ProjectRelation,
    },
    /// Creating a project (no instance exists yet)
    NewProject,
    /// An existing proposal together with its parent project
    Proposal {
        proposal: &'a Proposal,
        project: &'a Project,
    },
    /// Creating a proposal on the given project
    NewProposal { project: &'a Project },
    /// A contract together with its project
    Contract {
        contract: &'a Contract,
        project: &'a Project,
    },
}

/// Owning side(s) of a resource, resolved per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// A single exclusive owner
    Single(Uuid),
    /// Both parties hold a read relationship, neither owns exclusively
    Parties { client: Uuid, freelancer: Uuid },
    /// No instance yet (creation targets)
    None,
}

impl Resource<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Project { .. } | Resource::NewProject => "project",
            Resource::Proposal { .. } | Resource::NewProposal { .. } => "proposal",
            Resource::Contract { .. } => "contract",
        }
    }

    /// Ownership resolver keyed by resource kind
    pub fn ownership(&self) -> Ownership {
        match self {
            Resource::Project { project, .. } => Ownership::Single(project.owner_id),
            Resource::Proposal { proposal, .. } => Ownership::Single(proposal.bidder_id),
            Resource::Contract { contract, project } => Ownership::Parties {
                client: project.owner_id,
                freelancer: contract.freelancer_id,
            },
            Resource::NewProject | Resource::NewProposal { .. } => Ownership::None,
        }
    }
}

/// Outcome of a policy evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Map a denial to the typed permission error
    pub fn check(self) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AppError::PermissionDenied(reason)),
        }
    }
}

/// Evaluate the policy rules, in order:
///
/// 1. safe reads on a visible resource are allowed;
/// 2. role gates on creation;
/// 3. ownership (and status) gates on mutation;
/// 4. everything else is denied.
pub fn authorize(actor: &Actor, action: Action, resource: &Resource) -> Decision {
    if action.is_safe() {
        let visible = match resource {
            Resource::Project { project, relation } => {
                visibility::can_view_project(actor, project, *relation)
            }
            Resource::Proposal { proposal, project } => {
                visibility::can_view_proposal(actor, proposal, project)
            }
            Resource::Contract { contract, project } => {
                visibility::can_view_contract(actor, contract, project)
            }
            Resource::NewProject | Resource::NewProposal { .. } => false,
        };
        return if visible {
            Decision::Allow
        } else {
            Decision::Deny(format!("{} is not visible to you", resource.kind()))
        };
    }

    match (action, resource) {
        (Action::Create, Resource::NewProject) => {
            if actor.role == Role::Client {
                Decision::Allow
            } else {
                Decision::Deny("Only clients can create projects".to_string())
            }
        }
        (Action::Create, Resource::NewProposal { project }) => {
            if actor.role != Role::Freelancer {
                Decision::Deny("Only freelancers can submit proposals".to_string())
            } else if actor.id == project.owner_id {
                Decision::Deny("You cannot bid on your own project".to_string())
            } else {
                Decision::Allow
            }
        }
        (Action::Edit | Action::Delete, Resource::Project { project, .. }) => {
            if Ownership::Single(actor.id) != resource.ownership() {
                Decision::Deny("You are not the owner of this project".to_string())
            } else if project.status != ProjectStatus::Open {
                Decision::Deny("Project is no longer open and cannot be changed".to_string())
            } else {
                Decision::Allow
            }
        }
        (Action::Edit | Action::Delete, Resource::Proposal { proposal, .. }) => {
            if Ownership::Single(actor.id) != resource.ownership() {
                Decision::Deny("You are not the bidder on this proposal".to_string())
            } else if proposal.status != ProposalStatus::Pending {
                Decision::Deny(format!(
                    "Cannot change a proposal that is already {}",
                    proposal.status.as_str()
                ))
            } else {
                Decision::Allow
            }
        }
        (Action::Decide, Resource::Proposal { project, .. }) => {
            if actor.id == project.owner_id {
                Decision::Allow
            } else {
                Decision::Deny("You are not the client for this project".to_string())
            }
        }
        _ => Decision::Deny("No matching rule".to_string()),
    }
}
