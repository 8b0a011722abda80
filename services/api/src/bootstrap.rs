//! Construction of the shared state from configuration

use std::sync::Arc;

use anyhow::{Context, Result};
use auth::{
    Role, SessionManager, SessionStore,
    models::user::USERS_COLLECTION,
    password::hash_password,
    session::{MemorySessionStore, RedisSessionStore},
    validation::{validate_email, validate_password},
};
use common::{
    cache::RedisPool,
    database::{self, init_pool},
    store::{Document, DocumentStore, Filter, ID_FIELD, MemoryStore, PgDocumentStore},
};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::{AppConfig, StoreBackend},
    documents::{CREATED_AT, UPDATED_AT, now_timestamp},
    resources::RESOURCES,
    state::AppState,
};

/// Connect the configured stores and seed the first administrator
pub async fn build_state(config: AppConfig) -> Result<AppState> {
    let (store, session_store): (Arc<dyn DocumentStore>, Arc<dyn SessionStore>) =
        match config.store_backend {
            StoreBackend::Postgres => {
                let pool = init_pool(&config.database_config()).await?;
                if !database::health_check(&pool).await? {
                    anyhow::bail!("Failed to connect to database");
                }
                database::migrate(&pool).await?;
                for resource in RESOURCES {
                    for field in resource.unique {
                        database::ensure_unique_index(&pool, resource.collection, field).await?;
                    }
                }
                info!("Database connection successful");

                let redis_pool = RedisPool::new(&config.redis_config()).await?;
                let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool));
                let sessions: Arc<dyn SessionStore> =
                    Arc::new(RedisSessionStore::new(redis_pool));
                (store, sessions)
            }
            StoreBackend::Memory => {
                info!("Using in-memory stores; data is lost on restart");
                let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
                let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
                (store, sessions)
            }
        };

    if seed_admin(store.as_ref(), &config).await? {
        info!("Seeded the initial superadmin account");
    }

    let sessions = SessionManager::new(session_store, config.session_config());
    Ok(AppState {
        store,
        sessions,
        config: Arc::new(config),
    })
}

/// Insert the configured superadmin when no user exists yet. Returns
/// whether an account was created.
pub async fn seed_admin(store: &dyn DocumentStore, config: &AppConfig) -> Result<bool> {
    let Some((name, email, password)) = config.admin_seed() else {
        return Ok(false);
    };
    if store.count(USERS_COLLECTION, &Filter::new()).await? > 0 {
        return Ok(false);
    }

    let email = email.trim().to_lowercase();
    validate_email(&email).map_err(anyhow::Error::msg)?;
    validate_password(password)
        .map_err(anyhow::Error::msg)
        .context("ADMIN_PASSWORD is too weak")?;

    let now = now_timestamp();
    let mut user = Document::new();
    user.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
    user.insert("name".to_string(), Value::String(name.to_string()));
    user.insert("email".to_string(), Value::String(email));
    user.insert("role".to_string(), Value::from(Role::Superadmin.as_str()));
    user.insert("passwordHash".to_string(), Value::String(hash_password(password)?));
    user.insert("isActive".to_string(), Value::Bool(true));
    user.insert(CREATED_AT.to_string(), Value::String(now.clone()));
    user.insert(UPDATED_AT.to_string(), Value::String(now));

    store.insert(USERS_COLLECTION, user).await?;
    Ok(true)
}
