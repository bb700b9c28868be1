//! Tender server - freelance marketplace workflow core

pub mod api;
pub mod error;
pub mod models;
pub mod notify;
pub mod policy;
pub mod store;
pub mod visibility;
pub mod workflow;

use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    pub store: store::Store,
    pub workflow: workflow::Workflow,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Arc<Self> {
        let store = store::Store::new(pool);
        let workflow = workflow::Workflow::new(store.clone());
        Arc::new(Self { store, workflow })
    }
}
