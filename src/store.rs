//! Database store for actors, projects, proposals, contracts and notifications
//!
//! Listing queries apply the visibility rules at the SQL level so scoping
//! holds at scale; the pure predicates in [`crate::visibility`] mirror them.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{is_unique_violation, AppError, Result};
use crate::models::{
    Actor, Contract, EditProjectRequest, EditProposalRequest, Notification, Project,
    ProjectStatus, Proposal, ProposalStatus, Review, Role,
};

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for code that needs its own transaction scope
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Actor operations

    pub async fn create_actor(&self, username: &str, role: Role) -> Result<Actor> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO actors (id, username, role, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(username)
        .bind(role.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation(format!("Username '{}' is already taken", username))
            } else {
                e.into()
            }
        })?;

        Ok(Actor {
            id,
            username: username.to_string(),
            role,
            created_at: now,
        })
    }

    pub async fn get_actor(&self, id: Uuid) -> Result<Actor> {
        let row = sqlx::query_as::<_, ActorRow>(
            r#"
            SELECT id, username, role, created_at
            FROM actors
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Actor {} not found", id)))?;

        row.try_into()
    }

    // Project operations

    pub async fn create_project(
        &self,
        owner_id: Uuid,
        title: &str,
        description: &str,
        budget: f64,
        skills_required: Vec<String>,
    ) -> Result<Project> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let skills_json = serde_json::to_string(&skills_required)
            .map_err(|e| AppError::Internal(format!("Failed to encode skills: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO projects (id, owner_id, title, description, budget, skills_required, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 'open', ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(owner_id.to_string())
        .bind(title)
        .bind(description)
        .bind(budget)
        .bind(&skills_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Project {
            id,
            owner_id,
            title: title.to_string(),
            description: description.to_string(),
            budget,
            skills_required,
            status: ProjectStatus::Open,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Project> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id, owner_id, title, description, budget, skills_required, status, created_at, updated_at
            FROM projects
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {} not found", id)))?;

        row.try_into()
    }

    /// List projects the actor may see, scoped per role in SQL
    pub async fn list_projects_for(&self, actor: &Actor) -> Result<Vec<Project>> {
        let query = match actor.role {
            Role::Admin => sqlx::query_as::<_, ProjectRow>(
                r#"
                SELECT id, owner_id, title, description, budget, skills_required, status, created_at, updated_at
                FROM projects
                ORDER BY created_at DESC
                "#,
            ),
            Role::Client => sqlx::query_as::<_, ProjectRow>(
                r#"
                SELECT id, owner_id, title, description, budget, skills_required, status, created_at, updated_at
                FROM projects
                WHERE owner_id = ?
                ORDER BY created_at DESC
                "#,
            )
            .bind(actor.id.to_string()),
            Role::Freelancer => sqlx::query_as::<_, ProjectRow>(
                r#"
                SELECT id, owner_id, title, description, budget, skills_required, status, created_at, updated_at
                FROM projects
                WHERE status = 'open'
                   OR id IN (SELECT project_id FROM proposals WHERE bidder_id = ?)
                   OR id IN (SELECT project_id FROM contracts WHERE freelancer_id = ?)
                ORDER BY created_at DESC
                "#,
            )
            .bind(actor.id.to_string())
            .bind(actor.id.to_string()),
        };

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Merge field edits into an open project.
    ///
    /// The write is conditional on the status still being open, so a racing
    /// acceptance cannot interleave with the read-then-write merge.
    pub async fn update_project(&self, id: Uuid, fields: &EditProjectRequest) -> Result<Project> {
        let current = self.get_project(id).await?;
        let now = Utc::now();

        let title = fields.title.clone().unwrap_or(current.title);
        let description = fields.description.clone().unwrap_or(current.description);
        let budget = fields.budget.unwrap_or(current.budget);
        let skills = fields
            .skills_required
            .clone()
            .unwrap_or(current.skills_required);
        let skills_json = serde_json::to_string(&skills)
            .map_err(|e| AppError::Internal(format!("Failed to encode skills: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE projects
            SET title = ?, description = ?, budget = ?, skills_required = ?, updated_at = ?
            WHERE id = ? AND status = 'open'
            "#,
        )
        .bind(&title)
        .bind(&description)
        .bind(budget)
        .bind(&skills_json)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() != 1 {
            return Err(AppError::Conflict(
                "Project is no longer open and cannot be changed".to_string(),
            ));
        }

        Ok(Project {
            id,
            owner_id: current.owner_id,
            title,
            description,
            budget,
            skills_required: skills,
            status: current.status,
            created_at: current.created_at,
            updated_at: now,
        })
    }

    pub async fn delete_project(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Proposal operations

    pub async fn create_proposal(
        &self,
        project_id: Uuid,
        bidder_id: Uuid,
        rate: f64,
        cover_letter: &str,
    ) -> Result<Proposal> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO proposals (id, project_id, bidder_id, rate, cover_letter, status, submitted_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(project_id.to_string())
        .bind(bidder_id.to_string())
        .bind(rate)
        .bind(cover_letter)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation(
                    "You have already submitted a proposal for this project".to_string(),
                )
            } else {
                e.into()
            }
        })?;

        Ok(Proposal {
            id,
            project_id,
            bidder_id,
            rate,
            cover_letter: cover_letter.to_string(),
            status: ProposalStatus::Pending,
            submitted_at: now,
            updated_at: now,
        })
    }

    pub async fn get_proposal(&self, id: Uuid) -> Result<Proposal> {
        let row = sqlx::query_as::<_, ProposalRow>(
            r#"
            SELECT id, project_id, bidder_id, rate, cover_letter, status, submitted_at, updated_at
            FROM proposals
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", id)))?;

        row.try_into()
    }

    /// List proposals the actor may see: freelancers their own, clients the
    /// ones on their projects, admins all
    pub async fn list_proposals_for(&self, actor: &Actor) -> Result<Vec<Proposal>> {
        let query = match actor.role {
            Role::Admin => sqlx::query_as::<_, ProposalRow>(
                r#"
                SELECT id, project_id, bidder_id, rate, cover_letter, status, submitted_at, updated_at
                FROM proposals
                ORDER BY submitted_at DESC
                "#,
            ),
            Role::Freelancer => sqlx::query_as::<_, ProposalRow>(
                r#"
                SELECT id, project_id, bidder_id, rate, cover_letter, status, submitted_at, updated_at
                FROM proposals
                WHERE bidder_id = ?
                ORDER BY submitted_at DESC
                "#,
            )
            .bind(actor.id.to_string()),
            Role::Client => sqlx::query_as::<_, ProposalRow>(
                r#"
                SELECT id, project_id, bidder_id, rate, cover_letter, status, submitted_at, updated_at
                FROM proposals
                WHERE project_id IN (SELECT id FROM projects WHERE owner_id = ?)
                ORDER BY submitted_at DESC
                "#,
            )
            .bind(actor.id.to_string()),
        };

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn has_proposal(&self, project_id: Uuid, bidder_id: Uuid) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM proposals WHERE project_id = ? AND bidder_id = ?",
        )
        .bind(project_id.to_string())
        .bind(bidder_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Merge field edits into a pending proposal, conditionally on it still
    /// being pending
    pub async fn update_proposal(
        &self,
        id: Uuid,
        fields: &EditProposalRequest,
    ) -> Result<Proposal> {
        let current = self.get_proposal(id).await?;
        let now = Utc::now();

        let rate = fields.rate.unwrap_or(current.rate);
        let cover_letter = fields.cover_letter.clone().unwrap_or(current.cover_letter);

        let result = sqlx::query(
            r#"
            UPDATE proposals SET rate = ?, cover_letter = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(rate)
        .bind(&cover_letter)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() != 1 {
            return Err(AppError::Conflict(
                "Proposal has already been decided".to_string(),
            ));
        }

        Ok(Proposal {
            rate,
            cover_letter,
            updated_at: now,
            ..current
        })
    }

    pub async fn delete_proposal(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM proposals WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Conditionally move a single pending proposal to rejected.
    ///
    /// Returns false when no pending row matched, which the caller turns
    /// into a conflict against the current status.
    pub async fn reject_proposal_if_pending(&self, id: Uuid) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE proposals SET status = 'rejected', updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // Contract operations

    pub async fn get_contract_for_project(&self, project_id: Uuid) -> Result<Option<Contract>> {
        let row = sqlx::query_as::<_, ContractRow>(
            r#"
            SELECT id, project_id, freelancer_id, agreed_rate, start_date, created_at
            FROM contracts
            WHERE project_id = ?
            "#,
        )
        .bind(project_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// List contracts where the actor is a party (owner side or freelancer side)
    pub async fn list_contracts_for(&self, actor: &Actor) -> Result<Vec<Contract>> {
        let query = match actor.role {
            Role::Admin => sqlx::query_as::<_, ContractRow>(
                r#"
                SELECT id, project_id, freelancer_id, agreed_rate, start_date, created_at
                FROM contracts
                ORDER BY created_at DESC
                "#,
            ),
            Role::Freelancer => sqlx::query_as::<_, ContractRow>(
                r#"
                SELECT id, project_id, freelancer_id, agreed_rate, start_date, created_at
                FROM contracts
                WHERE freelancer_id = ?
                ORDER BY created_at DESC
                "#,
            )
            .bind(actor.id.to_string()),
            Role::Client => sqlx::query_as::<_, ContractRow>(
                r#"
                SELECT id, project_id, freelancer_id, agreed_rate, start_date, created_at
                FROM contracts
                WHERE project_id IN (SELECT id FROM projects WHERE owner_id = ?)
                ORDER BY created_at DESC
                "#,
            )
            .bind(actor.id.to_string()),
        };

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }

    // Review operations

    pub async fn create_review(
        &self,
        project_id: Uuid,
        reviewer_id: Uuid,
        reviewee_id: Uuid,
        rating: i32,
        comment: &str,
    ) -> Result<Review> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO reviews (id, project_id, reviewer_id, reviewee_id, rating, comment, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(project_id.to_string())
        .bind(reviewer_id.to_string())
        .bind(reviewee_id.to_string())
        .bind(rating)
        .bind(comment)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation(
                    "You have already reviewed this party for this project".to_string(),
                )
            } else {
                e.into()
            }
        })?;

        Ok(Review {
            id,
            project_id,
            reviewer_id,
            reviewee_id,
            rating,
            comment: comment.to_string(),
            created_at: now,
        })
    }

    /// List reviews the actor wrote or received; admins see all
    pub async fn list_reviews_for(&self, actor: &Actor) -> Result<Vec<Review>> {
        let query = match actor.role {
            Role::Admin => sqlx::query_as::<_, ReviewRow>(
                r#"
                SELECT id, project_id, reviewer_id, reviewee_id, rating, comment, created_at
                FROM reviews
                ORDER BY created_at DESC
                "#,
            ),
            Role::Client | Role::Freelancer => sqlx::query_as::<_, ReviewRow>(
                r#"
                SELECT id, project_id, reviewer_id, reviewee_id, rating, comment, created_at
                FROM reviews
                WHERE reviewer_id = ? OR reviewee_id = ?
                ORDER BY created_at DESC
                "#,
            )
            .bind(actor.id.to_string())
            .bind(actor.id.to_string()),
        };

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Reviews on one project, newest first. Reputation data: readable by
    /// any authenticated actor.
    pub async fn list_reviews_for_project(&self, project_id: Uuid) -> Result<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, project_id, reviewer_id, reviewee_id, rating, comment, created_at
            FROM reviews
            WHERE project_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    // Notification operations

    pub async fn create_notification(
        &self,
        recipient_id: Uuid,
        message: &str,
        project_id: Option<Uuid>,
        proposal_id: Option<Uuid>,
    ) -> Result<Notification> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, message, read, project_id, proposal_id, created_at)
            VALUES (?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(recipient_id.to_string())
        .bind(message)
        .bind(project_id.map(|u| u.to_string()))
        .bind(proposal_id.map(|u| u.to_string()))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Notification {
            id,
            recipient_id,
            message: message.to_string(),
            read: false,
            project_id,
            proposal_id,
            created_at: now,
        })
    }

    pub async fn get_notification(&self, id: Uuid) -> Result<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, recipient_id, message, read, project_id, proposal_id, created_at
            FROM notifications
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;

        row.try_into()
    }

    pub async fn list_notifications_for(&self, recipient_id: Uuid) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, recipient_id, message, read, project_id, proposal_id, created_at
            FROM notifications
            WHERE recipient_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(recipient_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn set_notification_read(&self, id: Uuid, read: bool) -> Result<()> {
        sqlx::query("UPDATE notifications SET read = ? WHERE id = ?")
            .bind(read)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark every unread notification for the recipient as read, returning
    /// the number of rows flipped
    pub async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = 1 WHERE recipient_id = ? AND read = 0",
        )
        .bind(recipient_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// Internal row types for sqlx

#[derive(sqlx::FromRow)]
struct ActorRow {
    id: String,
    username: String,
    role: String,
    created_at: chrono::DateTime<Utc>,
}

impl TryFrom<ActorRow> for Actor {
    type Error = AppError;

    fn try_from(row: ActorRow) -> Result<Self> {
        Ok(Actor {
            id: parse_uuid(&row.id)?,
            username: row.username,
            role: row
                .role
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid role: {}", e)))?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    owner_id: String,
    title: String,
    description: String,
    budget: f64,
    skills_required: String,
    status: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = AppError;

    fn try_from(row: ProjectRow) -> Result<Self> {
        Ok(Project {
            id: parse_uuid(&row.id)?,
            owner_id: parse_uuid(&row.owner_id)?,
            title: row.title,
            description: row.description,
            budget: row.budget,
            skills_required: serde_json::from_str(&row.skills_required)
                .map_err(|e| AppError::Internal(format!("Invalid skills list: {}", e)))?,
            status: row
                .status
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid status: {}", e)))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProposalRow {
    id: String,
    project_id: String,
    bidder_id: String,
    rate: f64,
    cover_letter: String,
    status: String,
    submitted_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl TryFrom<ProposalRow> for Proposal {
    type Error = AppError;

    fn try_from(row: ProposalRow) -> Result<Self> {
        Ok(Proposal {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            bidder_id: parse_uuid(&row.bidder_id)?,
            rate: row.rate,
            cover_letter: row.cover_letter,
            status: row
                .status
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid status: {}", e)))?,
            submitted_at: row.submitted_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ContractRow {
    id: String,
    project_id: String,
    freelancer_id: String,
    agreed_rate: f64,
    start_date: chrono::NaiveDate,
    created_at: chrono::DateTime<Utc>,
}

impl TryFrom<ContractRow> for Contract {
    type Error = AppError;

    fn try_from(row: ContractRow) -> Result<Self> {
        Ok(Contract {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            freelancer_id: parse_uuid(&row.freelancer_id)?,
            agreed_rate: row.agreed_rate,
            start_date: row.start_date,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: String,
    project_id: String,
    reviewer_id: String,
    reviewee_id: String,
    rating: i32,
    comment: String,
    created_at: chrono::DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = AppError;

    fn try_from(row: ReviewRow) -> Result<Self> {
        Ok(Review {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            reviewer_id: parse_uuid(&row.reviewer_id)?,
            reviewee_id: parse_uuid(&row.reviewee_id)?,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    recipient_id: String,
    message: String,
    read: bool,
    project_id: Option<String>,
    proposal_id: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            id: parse_uuid(&row.id)?,
            recipient_id: parse_uuid(&row.recipient_id)?,
            message: row.message,
            read: row.read,
            project_id: row.project_id.as_deref().map(parse_uuid).transpose()?,
            proposal_id: row.proposal_id.as_deref().map(parse_uuid).transpose()?,
            created_at: row.created_at,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Internal(format!("Invalid UUID: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Store {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        Store::new(pool)
    }

    async fn make_actor(store: &Store, name: &str, role: Role) -> Actor {
        store.create_actor(name, role).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_actor() {
        let store = setup_test_db().await;
        let actor = make_actor(&store, "alice", Role::Client).await;
        assert_eq!(actor.username, "alice");
        assert_eq!(actor.role, Role::Client);
    }

    #[tokio::test]
    async fn test_create_actor_duplicate_username() {
        let store = setup_test_db().await;
        make_actor(&store, "alice", Role::Client).await;
        let result = store.create_actor("alice", Role::Freelancer).await;
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_actor_not_found() {
        let store = setup_test_db().await;
        let result = store.get_actor(Uuid::new_v4()).await;
        assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_project_starts_open() {
        let store = setup_test_db().await;
        let client = make_actor(&store, "alice", Role::Client).await;
        let project = store
            .create_project(client.id, "Build a site", "Details", 500.0, vec!["rust".into()])
            .await
            .unwrap();
        assert_eq!(project.status, ProjectStatus::Open);
        assert_eq!(project.owner_id, client.id);

        let fetched = store.get_project(project.id).await.unwrap();
        assert_eq!(fetched.skills_required, vec!["rust".to_string()]);
        assert_eq!(fetched.budget, 500.0);
    }

    #[tokio::test]
    async fn test_update_project_fields() {
        let store = setup_test_db().await;
        let client = make_actor(&store, "alice", Role::Client).await;
        let project = store
            .create_project(client.id, "Old title", "", 100.0, vec![])
            .await
            .unwrap();

        let updated = store
            .update_project(
                project.id,
                &EditProjectRequest {
                    title: Some("New title".into()),
                    budget: Some(250.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.budget, 250.0);
        // Status untouched by the field update path
        assert_eq!(updated.status, ProjectStatus::Open);
    }

    #[tokio::test]
    async fn test_update_project_requires_open_status() {
        let store = setup_test_db().await;
        let client = make_actor(&store, "alice", Role::Client).await;
        let project = store
            .create_project(client.id, "Site", "", 100.0, vec![])
            .await
            .unwrap();

        sqlx::query("UPDATE projects SET status = 'in_progress' WHERE id = ?")
            .bind(project.id.to_string())
            .execute(store.pool())
            .await
            .unwrap();

        let result = store
            .update_project(
                project.id,
                &EditProjectRequest {
                    title: Some("Changed".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result.unwrap_err(), AppError::Conflict(_)));

        // Nothing written
        let fetched = store.get_project(project.id).await.unwrap();
        assert_eq!(fetched.title, "Site");
    }

    #[tokio::test]
    async fn test_update_proposal_requires_pending_status() {
        let store = setup_test_db().await;
        let client = make_actor(&store, "alice", Role::Client).await;
        let freelancer = make_actor(&store, "bob", Role::Freelancer).await;
        let project = store
            .create_project(client.id, "Work", "", 100.0, vec![])
            .await
            .unwrap();
        let proposal = store
            .create_proposal(project.id, freelancer.id, 50.0, "")
            .await
            .unwrap();

        store.reject_proposal_if_pending(proposal.id).await.unwrap();

        let result = store
            .update_proposal(
                proposal.id,
                &EditProposalRequest {
                    rate: Some(99.0),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result.unwrap_err(), AppError::Conflict(_)));

        let fetched = store.get_proposal(proposal.id).await.unwrap();
        assert_eq!(fetched.rate, 50.0);
    }

    #[tokio::test]
    async fn test_delete_project() {
        let store = setup_test_db().await;
        let client = make_actor(&store, "alice", Role::Client).await;
        let project = store
            .create_project(client.id, "Gone soon", "", 100.0, vec![])
            .await
            .unwrap();

        store.delete_project(project.id).await.unwrap();
        let result = store.get_project(project.id).await;
        assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_proposal_rejected_by_constraint() {
        let store = setup_test_db().await;
        let client = make_actor(&store, "alice", Role::Client).await;
        let freelancer = make_actor(&store, "bob", Role::Freelancer).await;
        let project = store
            .create_project(client.id, "Work", "", 100.0, vec![])
            .await
            .unwrap();

        store
            .create_proposal(project.id, freelancer.id, 50.0, "")
            .await
            .unwrap();
        let result = store.create_proposal(project.id, freelancer.id, 60.0, "").await;
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reject_proposal_if_pending() {
        let store = setup_test_db().await;
        let client = make_actor(&store, "alice", Role::Client).await;
        let freelancer = make_actor(&store, "bob", Role::Freelancer).await;
        let project = store
            .create_project(client.id, "Work", "", 100.0, vec![])
            .await
            .unwrap();
        let proposal = store
            .create_proposal(project.id, freelancer.id, 50.0, "")
            .await
            .unwrap();

        assert!(store.reject_proposal_if_pending(proposal.id).await.unwrap());
        let fetched = store.get_proposal(proposal.id).await.unwrap();
        assert_eq!(fetched.status, ProposalStatus::Rejected);

        // Second attempt matches no pending row
        assert!(!store.reject_proposal_if_pending(proposal.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_project_visibility_per_role() {
        let store = setup_test_db().await;
        let alice = make_actor(&store, "alice", Role::Client).await;
        let carol = make_actor(&store, "carol", Role::Client).await;
        let bob = make_actor(&store, "bob", Role::Freelancer).await;
        let admin = make_actor(&store, "root", Role::Admin).await;

        let p1 = store
            .create_project(alice.id, "Alice's", "", 100.0, vec![])
            .await
            .unwrap();
        store
            .create_project(carol.id, "Carol's", "", 100.0, vec![])
            .await
            .unwrap();

        // Clients see only their own
        let seen = store.list_projects_for(&alice).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, p1.id);

        // Freelancers see all open projects
        let seen = store.list_projects_for(&bob).await.unwrap();
        assert_eq!(seen.len(), 2);

        // Admin sees everything
        let seen = store.list_projects_for(&admin).await.unwrap();
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_proposal_visibility_per_role() {
        let store = setup_test_db().await;
        let alice = make_actor(&store, "alice", Role::Client).await;
        let carol = make_actor(&store, "carol", Role::Client).await;
        let bob = make_actor(&store, "bob", Role::Freelancer).await;
        let dave = make_actor(&store, "dave", Role::Freelancer).await;

        let p1 = store
            .create_project(alice.id, "Alice's", "", 100.0, vec![])
            .await
            .unwrap();
        let p2 = store
            .create_project(carol.id, "Carol's", "", 100.0, vec![])
            .await
            .unwrap();

        store.create_proposal(p1.id, bob.id, 50.0, "").await.unwrap();
        store.create_proposal(p2.id, dave.id, 60.0, "").await.unwrap();

        // Freelancer sees own proposals only
        let seen = store.list_proposals_for(&bob).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].bidder_id, bob.id);

        // Client sees proposals on their own projects only
        let seen = store.list_proposals_for(&alice).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].project_id, p1.id);
    }

    #[tokio::test]
    async fn test_contract_unique_per_project() {
        let store = setup_test_db().await;
        let client = make_actor(&store, "alice", Role::Client).await;
        let freelancer = make_actor(&store, "bob", Role::Freelancer).await;
        let project = store
            .create_project(client.id, "Work", "", 100.0, vec![])
            .await
            .unwrap();

        let insert = |id: Uuid| {
            sqlx::query(
                r#"
                INSERT INTO contracts (id, project_id, freelancer_id, agreed_rate, start_date, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id.to_string())
            .bind(project.id.to_string())
            .bind(freelancer.id.to_string())
            .bind(50.0)
            .bind(chrono::Utc::now().date_naive())
            .bind(chrono::Utc::now())
        };

        insert(Uuid::new_v4()).execute(store.pool()).await.unwrap();
        let err = insert(Uuid::new_v4()).execute(store.pool()).await.unwrap_err();
        assert!(is_unique_violation(&err));

        assert!(store.get_contract_for_project(project.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_review_unique_per_direction() {
        let store = setup_test_db().await;
        let client = make_actor(&store, "alice", Role::Client).await;
        let freelancer = make_actor(&store, "bob", Role::Freelancer).await;
        let project = store
            .create_project(client.id, "Work", "", 100.0, vec![])
            .await
            .unwrap();

        store
            .create_review(project.id, client.id, freelancer.id, 5, "Great")
            .await
            .unwrap();
        let result = store
            .create_review(project.id, client.id, freelancer.id, 4, "Again")
            .await;
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));

        // The opposite direction is a distinct review
        store
            .create_review(project.id, freelancer.id, client.id, 4, "Clear brief")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_review_listing_scope() {
        let store = setup_test_db().await;
        let alice = make_actor(&store, "alice", Role::Client).await;
        let bob = make_actor(&store, "bob", Role::Freelancer).await;
        let carol = make_actor(&store, "carol", Role::Freelancer).await;
        let project = store
            .create_project(alice.id, "Work", "", 100.0, vec![])
            .await
            .unwrap();

        store
            .create_review(project.id, alice.id, bob.id, 5, "")
            .await
            .unwrap();

        // Reviewer and reviewee both see it; an unrelated actor does not
        assert_eq!(store.list_reviews_for(&alice).await.unwrap().len(), 1);
        assert_eq!(store.list_reviews_for(&bob).await.unwrap().len(), 1);
        assert_eq!(store.list_reviews_for(&carol).await.unwrap().len(), 0);

        assert_eq!(
            store.list_reviews_for_project(project.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_notifications_read_flow() {
        let store = setup_test_db().await;
        let bob = make_actor(&store, "bob", Role::Freelancer).await;
        let carol = make_actor(&store, "carol", Role::Freelancer).await;

        let n1 = store
            .create_notification(bob.id, "Your proposal was accepted", None, None)
            .await
            .unwrap();
        store
            .create_notification(bob.id, "Your proposal was rejected", None, None)
            .await
            .unwrap();
        store
            .create_notification(carol.id, "Unrelated", None, None)
            .await
            .unwrap();

        let listed = store.list_notifications_for(bob.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|n| !n.read));

        store.set_notification_read(n1.id, true).await.unwrap();
        assert!(store.get_notification(n1.id).await.unwrap().read);

        // Bulk read flips only bob's remaining unread row
        let flipped = store.mark_all_notifications_read(bob.id).await.unwrap();
        assert_eq!(flipped, 1);
        let carol_notifications = store.list_notifications_for(carol.id).await.unwrap();
        assert!(!carol_notifications[0].read);
    }
}
