//! Authentication models

pub mod session;
pub mod user;

// Re-export for convenience
pub use session::{Identity, Session};
pub use user::{LoginCredentials, UserAccount};
