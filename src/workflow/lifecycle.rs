//! Proposal lifecycle: submit, withdraw, edit, decide
//!
//! The engine authorizes the actor, validates the transition, and delegates
//! accepted decisions to the acceptance transaction. Rejections are a single
//! conditional status write with the same re-validation discipline.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    Actor, CreateProjectRequest, Decision, EditProjectRequest, EditProposalRequest, Project,
    ProjectStatus, Proposal, ProposalStatus, Review, SubmitProposalRequest, SubmitReviewRequest,
};
use crate::policy::{self, Action, Resource};
use crate::store::Store;
use crate::workflow::acceptance;
use crate::workflow::events::DomainEvent;

/// The workflow engine: every mutating action goes through here
#[derive(Clone)]
pub struct Workflow {
    store: Store,
    events: broadcast::Sender<DomainEvent>,
}

impl Workflow {
    pub fn new(store: Store) -> Self {
        let (events, _) = broadcast::channel(256);
        Self { store, events }
    }

    /// Subscribe to domain events (consumed by the notification dispatcher)
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }

    /// Emit after a durable commit; a missing subscriber is not an error
    fn emit(&self, event: DomainEvent) {
        let _ = self.events.send(event);
    }

    // Project actions

    pub async fn create_project(
        &self,
        actor: &Actor,
        req: &CreateProjectRequest,
    ) -> Result<Project> {
        policy::authorize(actor, Action::Create, &Resource::NewProject).check()?;

        if req.title.trim().is_empty() {
            return Err(AppError::Validation("Project title is required".to_string()));
        }
        if req.budget <= 0.0 {
            return Err(AppError::Validation("Budget must be positive".to_string()));
        }

        let project = self
            .store
            .create_project(
                actor.id,
                req.title.trim(),
                req.description.as_deref().unwrap_or(""),
                req.budget,
                req.skills_required.clone().unwrap_or_default(),
            )
            .await?;

        tracing::info!(project_id = %project.id, owner = %actor.id, "Project created");
        Ok(project)
    }

    pub async fn edit_project(
        &self,
        actor: &Actor,
        project_id: Uuid,
        fields: &EditProjectRequest,
    ) -> Result<Project> {
        let project = self.store.get_project(project_id).await?;
        policy::authorize(
            actor,
            Action::Edit,
            &Resource::Project {
                project: &project,
                relation: Default::default(),
            },
        )
        .check()?;

        if let Some(budget) = fields.budget {
            if budget <= 0.0 {
                return Err(AppError::Validation("Budget must be positive".to_string()));
            }
        }

        self.store.update_project(project_id, fields).await
    }

    pub async fn delete_project(&self, actor: &Actor, project_id: Uuid) -> Result<()> {
        let project = self.store.get_project(project_id).await?;
        policy::authorize(
            actor,
            Action::Delete,
            &Resource::Project {
                project: &project,
                relation: Default::default(),
            },
        )
        .check()?;

        self.store.delete_project(project_id).await
    }

    // Proposal actions

    /// Submit a proposal on an open project.
    ///
    /// Fails with a validation error when the project is not open or the
    /// bidder already has a proposal on it; the (project, bidder) unique
    /// constraint backstops the duplicate check under concurrency.
    pub async fn submit_proposal(
        &self,
        actor: &Actor,
        req: &SubmitProposalRequest,
    ) -> Result<Proposal> {
        let project = self.store.get_project(req.project_id).await?;
        policy::authorize(
            actor,
            Action::Create,
            &Resource::NewProposal { project: &project },
        )
        .check()?;

        if project.status != ProjectStatus::Open {
            return Err(AppError::Validation(
                "Project is not open for proposals".to_string(),
            ));
        }
        if req.rate <= 0.0 {
            return Err(AppError::Validation("Rate must be positive".to_string()));
        }
        if self.store.has_proposal(project.id, actor.id).await? {
            return Err(AppError::Validation(
                "You have already submitted a proposal for this project".to_string(),
            ));
        }

        let proposal = self
            .store
            .create_proposal(
                project.id,
                actor.id,
                req.rate,
                req.cover_letter.as_deref().unwrap_or(""),
            )
            .await?;

        self.emit(DomainEvent::ProposalSubmitted {
            proposal_id: proposal.id,
            project_id: project.id,
            bidder_id: actor.id,
            owner_id: project.owner_id,
        });
        tracing::info!(proposal_id = %proposal.id, project_id = %project.id, "Proposal submitted");
        Ok(proposal)
    }

    /// Withdraw (delete) a pending proposal
    pub async fn withdraw_proposal(&self, actor: &Actor, proposal_id: Uuid) -> Result<()> {
        let proposal = self.store.get_proposal(proposal_id).await?;
        let project = self.store.get_project(proposal.project_id).await?;
        policy::authorize(
            actor,
            Action::Delete,
            &Resource::Proposal {
                proposal: &proposal,
                project: &project,
            },
        )
        .check()?;

        self.store.delete_proposal(proposal_id).await
    }

    /// Edit a pending proposal's rate or cover letter; the status field has
    /// no edit path and only moves through decide
    pub async fn edit_proposal(
        &self,
        actor: &Actor,
        proposal_id: Uuid,
        fields: &EditProposalRequest,
    ) -> Result<Proposal> {
        let proposal = self.store.get_proposal(proposal_id).await?;
        let project = self.store.get_project(proposal.project_id).await?;
        policy::authorize(
            actor,
            Action::Edit,
            &Resource::Proposal {
                proposal: &proposal,
                project: &project,
            },
        )
        .check()?;

        if let Some(rate) = fields.rate {
            if rate <= 0.0 {
                return Err(AppError::Validation("Rate must be positive".to_string()));
            }
        }

        self.store.update_proposal(proposal_id, fields).await
    }

    /// Decide a pending proposal.
    ///
    /// Rejections are a single conditional write. Acceptance hands off to
    /// the acceptance transaction; the proposal's own status write happens
    /// inside that atomic unit, never before it. A proposal that has
    /// already been decided short-circuits to a conflict without entering
    /// the transaction.
    pub async fn decide_proposal(
        &self,
        actor: &Actor,
        proposal_id: Uuid,
        decision: Decision,
    ) -> Result<Proposal> {
        let proposal = self.store.get_proposal(proposal_id).await?;
        let project = self.store.get_project(proposal.project_id).await?;
        policy::authorize(
            actor,
            Action::Decide,
            &Resource::Proposal {
                proposal: &proposal,
                project: &project,
            },
        )
        .check()?;

        if proposal.status != ProposalStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Proposal is already {}",
                proposal.status.as_str()
            )));
        }

        match decision {
            Decision::Rejected => {
                if !self.store.reject_proposal_if_pending(proposal_id).await? {
                    // Lost a race between the check above and the write
                    let current = self.store.get_proposal(proposal_id).await?;
                    return Err(AppError::Conflict(format!(
                        "Proposal is already {}",
                        current.status.as_str()
                    )));
                }
                self.emit(DomainEvent::ProposalRejected {
                    proposal_id,
                    project_id: project.id,
                    bidder_id: proposal.bidder_id,
                });
                tracing::info!(proposal_id = %proposal_id, "Proposal rejected");
                self.store.get_proposal(proposal_id).await
            }
            Decision::Accepted => {
                let outcome = acceptance::accept_proposal(self.store.pool(), proposal_id).await?;
                for event in outcome.events {
                    self.emit(event);
                }
                tracing::info!(
                    proposal_id = %proposal_id,
                    contract_id = %outcome.contract.id,
                    "Proposal accepted, contract created"
                );
                Ok(outcome.proposal)
            }
        }
    }

    // Review actions

    /// Review the other party on a contracted project.
    ///
    /// The reviewee is derived from the contract, never taken from the
    /// request: the owner reviews the freelancer and the freelancer reviews
    /// the owner. One review per direction, backed by a unique constraint.
    pub async fn submit_review(&self, actor: &Actor, req: &SubmitReviewRequest) -> Result<Review> {
        let project = self.store.get_project(req.project_id).await?;
        let contract = self
            .store
            .get_contract_for_project(project.id)
            .await?
            .ok_or_else(|| {
                AppError::Validation("Cannot review: no contract exists for this project".to_string())
            })?;

        let reviewee_id = if actor.id == project.owner_id {
            contract.freelancer_id
        } else if actor.id == contract.freelancer_id {
            project.owner_id
        } else {
            return Err(AppError::PermissionDenied(
                "Only the contract parties can review this project".to_string(),
            ));
        };

        if !(1..=5).contains(&req.rating) {
            return Err(AppError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let review = self
            .store
            .create_review(
                project.id,
                actor.id,
                reviewee_id,
                req.rating,
                req.comment.as_deref().unwrap_or(""),
            )
            .await?;
        tracing::info!(review_id = %review.id, project_id = %project.id, "Review submitted");
        Ok(review)
    }
}
