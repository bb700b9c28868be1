//! HTTP action surface
//!
//! One handler per core action. The acting identity arrives in the
//! `x-actor-id` header; authentication proper is an external collaborator.
//! Single-resource reads re-check visibility and surface out-of-scope ids
//! as not-found.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    Actor, Contract, CreateActorRequest, CreateProjectRequest, DecideProposalRequest,
    EditProjectRequest, EditProposalRequest, Notification, Project, Proposal, Review, Role,
    SubmitProposalRequest, SubmitReviewRequest,
};
use crate::visibility::{self, ProjectRelation};
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/actors", post(create_actor))
        .route("/actors/me", get(whoami))
        .route("/projects", post(create_project).get(list_projects))
        .route(
            "/projects/:id",
            get(get_project).patch(edit_project).delete(delete_project),
        )
        .route("/proposals", post(submit_proposal).get(list_proposals))
        .route(
            "/proposals/:id",
            get(get_proposal)
                .patch(edit_proposal)
                .delete(withdraw_proposal),
        )
        .route("/proposals/:id/decision", post(decide_proposal))
        .route("/contracts", get(list_contracts))
        .route("/reviews", post(submit_review).get(list_reviews))
        .route("/projects/:id/reviews", get(list_project_reviews))
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", patch(mark_notification_read))
        .route("/notifications/:id/unread", patch(mark_notification_unread))
        .route("/notifications/read-all", post(mark_all_notifications_read))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Resolve the acting identity from the request headers
async fn current_actor(state: &AppState, headers: &HeaderMap) -> Result<Actor> {
    let raw = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::PermissionDenied("Missing x-actor-id header".to_string()))?;
    let id = Uuid::parse_str(raw)
        .map_err(|_| AppError::PermissionDenied("Invalid x-actor-id header".to_string()))?;
    state.store.get_actor(id).await
}

/// A freelancer's relationship to a project, for visibility checks
async fn project_relation(state: &AppState, actor: &Actor, project_id: Uuid) -> Result<ProjectRelation> {
    if actor.role != Role::Freelancer {
        return Ok(ProjectRelation::default());
    }
    let has_proposal = state.store.has_proposal(project_id, actor.id).await?;
    let has_contract = state
        .store
        .get_contract_for_project(project_id)
        .await?
        .map(|c| c.freelancer_id == actor.id)
        .unwrap_or(false);
    Ok(ProjectRelation {
        has_proposal,
        has_contract,
    })
}

// Actors

async fn create_actor(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateActorRequest>,
) -> Result<Json<Actor>> {
    if req.username.trim().is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    let actor = state.store.create_actor(req.username.trim(), req.role).await?;
    Ok(Json(actor))
}

async fn whoami(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Actor>> {
    let actor = current_actor(&state, &headers).await?;
    Ok(Json(actor))
}

// Projects

async fn create_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<Project>> {
    let actor = current_actor(&state, &headers).await?;
    let project = state.workflow.create_project(&actor, &req).await?;
    Ok(Json(project))
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Project>>> {
    let actor = current_actor(&state, &headers).await?;
    let projects = state.store.list_projects_for(&actor).await?;
    Ok(Json(projects))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>> {
    let actor = current_actor(&state, &headers).await?;
    let project = state.store.get_project(id).await?;
    let relation = project_relation(&state, &actor, id).await?;
    if !visibility::can_view_project(&actor, &project, relation) {
        return Err(AppError::NotFound(format!("Project {} not found", id)));
    }
    Ok(Json(project))
}

async fn edit_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<EditProjectRequest>,
) -> Result<Json<Project>> {
    let actor = current_actor(&state, &headers).await?;
    let project = state.workflow.edit_project(&actor, id, &req).await?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let actor = current_actor(&state, &headers).await?;
    state.workflow.delete_project(&actor, id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

// Proposals

async fn submit_proposal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SubmitProposalRequest>,
) -> Result<Json<Proposal>> {
    let actor = current_actor(&state, &headers).await?;
    let proposal = state.workflow.submit_proposal(&actor, &req).await?;
    Ok(Json(proposal))
}

async fn list_proposals(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Proposal>>> {
    let actor = current_actor(&state, &headers).await?;
    let proposals = state.store.list_proposals_for(&actor).await?;
    Ok(Json(proposals))
}

async fn get_proposal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Proposal>> {
    let actor = current_actor(&state, &headers).await?;
    let proposal = state.store.get_proposal(id).await?;
    let project = state.store.get_project(proposal.project_id).await?;
    if !visibility::can_view_proposal(&actor, &proposal, &project) {
        return Err(AppError::NotFound(format!("Proposal {} not found", id)));
    }
    Ok(Json(proposal))
}

async fn edit_proposal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<EditProposalRequest>,
) -> Result<Json<Proposal>> {
    let actor = current_actor(&state, &headers).await?;
    let proposal = state.workflow.edit_proposal(&actor, id, &req).await?;
    Ok(Json(proposal))
}

async fn withdraw_proposal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let actor = current_actor(&state, &headers).await?;
    state.workflow.withdraw_proposal(&actor, id).await?;
    Ok(Json(serde_json::json!({ "withdrawn": id })))
}

async fn decide_proposal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<DecideProposalRequest>,
) -> Result<Json<Proposal>> {
    let actor = current_actor(&state, &headers).await?;
    let proposal = state
        .workflow
        .decide_proposal(&actor, id, req.decision)
        .await?;
    Ok(Json(proposal))
}

// Contracts

async fn list_contracts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Contract>>> {
    let actor = current_actor(&state, &headers).await?;
    let contracts = state.store.list_contracts_for(&actor).await?;
    Ok(Json(contracts))
}

// Reviews

async fn submit_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SubmitReviewRequest>,
) -> Result<Json<Review>> {
    let actor = current_actor(&state, &headers).await?;
    let review = state.workflow.submit_review(&actor, &req).await?;
    Ok(Json(review))
}

async fn list_reviews(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Review>>> {
    let actor = current_actor(&state, &headers).await?;
    let reviews = state.store.list_reviews_for(&actor).await?;
    Ok(Json(reviews))
}

/// Reviews on a project are reputation data: any authenticated actor may
/// read them
async fn list_project_reviews(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Review>>> {
    current_actor(&state, &headers).await?;
    state.store.get_project(id).await?;
    let reviews = state.store.list_reviews_for_project(id).await?;
    Ok(Json(reviews))
}

// Notifications

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>> {
    let actor = current_actor(&state, &headers).await?;
    let notifications = state.store.list_notifications_for(actor.id).await?;
    Ok(Json(notifications))
}

/// Load a notification, enforcing that the caller is its recipient
async fn owned_notification(state: &AppState, actor: &Actor, id: Uuid) -> Result<Notification> {
    let notification = state.store.get_notification(id).await?;
    if notification.recipient_id != actor.id {
        return Err(AppError::NotFound(format!("Notification {} not found", id)));
    }
    Ok(notification)
}

async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>> {
    let actor = current_actor(&state, &headers).await?;
    owned_notification(&state, &actor, id).await?;
    state.store.set_notification_read(id, true).await?;
    Ok(Json(state.store.get_notification(id).await?))
}

async fn mark_notification_unread(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>> {
    let actor = current_actor(&state, &headers).await?;
    owned_notification(&state, &actor, id).await?;
    state.store.set_notification_read(id, false).await?;
    Ok(Json(state.store.get_notification(id).await?))
}

async fn mark_all_notifications_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let actor = current_actor(&state, &headers).await?;
    let updated = state.store.mark_all_notifications_read(actor.id).await?;
    Ok(Json(serde_json::json!({ "marked_read": updated })))
}
