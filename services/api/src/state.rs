//! Application state shared across handlers

use std::sync::Arc;

use auth::SessionManager;
use common::store::DocumentStore;

use crate::config::AppConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub sessions: SessionManager,
    pub config: Arc<AppConfig>,
}
