//! Common library for the site backend
//!
//! This crate provides the infrastructure shared by the services: the
//! PostgreSQL pool, the Redis client, the document store abstraction with
//! its Postgres and in-memory implementations, and their error types.

pub mod cache;
pub mod database;
pub mod error;
pub mod store;

/// Example usage of the document store
///
/// ```rust,no_run
/// use common::database::{DatabaseConfig, init_pool, migrate};
/// use common::store::{DocumentStore, Filter, PgDocumentStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::from_env()?;
///     let pool = init_pool(&config).await?;
///     migrate(&pool).await?;
///     let store = PgDocumentStore::new(pool);
///     let drafts = store.count("news", &Filter::new().eq("status", "draft")).await?;
///     println!("Draft posts: {}", drafts);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
