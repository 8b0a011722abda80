//! Authentication and authorization for the site backend
//!
//! Holds the role/permission table, the session model and the session
//! resolver used by every protected route, plus password hashing and input
//! validation helpers shared by the login and user-management endpoints.

pub mod models;
pub mod password;
pub mod permissions;
pub mod session;
pub mod token;
pub mod validation;

pub use models::{Identity, Session};
pub use permissions::{Permission, Role, role_allows, role_allows_all, role_allows_any};
pub use session::{SessionConfig, SessionManager, SessionStore};
