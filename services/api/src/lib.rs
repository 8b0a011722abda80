//! HTTP gateway for the site backend
//!
//! Resolves the caller's session, checks the permission each action needs,
//! turns list requests into document-store queries and wraps every result
//! in the response envelope.

pub mod bootstrap;
pub mod config;
pub mod documents;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod resources;
pub mod routes;
pub mod state;

pub use crate::config::AppConfig;
pub use crate::routes::create_router;
pub use crate::state::AppState;
