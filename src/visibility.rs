//! Read-scoping predicates: which resources an actor may list or view
//!
//! These are the pure form of the rules; the listing queries in
//! [`crate::store`] express the same scoping as SQL predicates so the
//! filtering happens in storage, not in memory.

use crate::models::{Actor, Contract, Project, ProjectStatus, Proposal, Role};

/// An actor's relationship to a project, looked up by the caller
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectRelation {
    /// The actor holds a proposal on the project
    pub has_proposal: bool,
    /// The actor is the freelancer on the project's contract
    pub has_contract: bool,
}

/// Clients see their own projects; freelancers see open projects plus any
/// they hold a proposal or contract on; admins see all.
pub fn can_view_project(actor: &Actor, project: &Project, relation: ProjectRelation) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Client => project.owner_id == actor.id,
        Role::Freelancer => {
            project.status == ProjectStatus::Open || relation.has_proposal || relation.has_contract
        }
    }
}

/// Freelancers see their own proposals; clients see proposals on projects
/// they own; admins see all.
pub fn can_view_proposal(actor: &Actor, proposal: &Proposal, project: &Project) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Freelancer => proposal.bidder_id == actor.id,
        Role::Client => project.owner_id == actor.id,
    }
}

/// Both parties to a contract may see it; admins see all.
pub fn can_view_contract(actor: &Actor, contract: &Contract, project: &Project) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Freelancer => contract.freelancer_id == actor.id,
        Role::Client => project.owner_id == actor.id,
    }
}
