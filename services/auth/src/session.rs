//! Session management
//!
//! Sessions are created at login, looked up on every protected request and
//! removed at logout or when their TTL runs out. Resolution fails open: any
//! problem with the credential or the store yields "no session".

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum_extra::{
    extract::CookieJar,
    headers::{Authorization, HeaderMapExt, authorization::Bearer},
};
use chrono::{Duration, Utc};
use common::cache::RedisPool;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    models::{Identity, Session},
    permissions::Role,
    token::{SessionClaims, SessionTokens},
};

/// Storage for active sessions, keyed by session id
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, sid: &str, session: &Session, ttl_seconds: u64) -> Result<()>;
    async fn get(&self, sid: &str) -> Result<Option<Session>>;
    /// Remove a session, returning whether it existed
    async fn remove(&self, sid: &str) -> Result<bool>;
    /// Remove every session of a user, returning how many were removed
    async fn remove_for_user(&self, user_id: &str) -> Result<u64>;
    async fn health_check(&self) -> Result<bool>;
}

/// Sessions kept in Redis with a TTL. Each user also has a set of their
/// session ids under `user_sessions:<user_id>` so they can be revoked together.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis_pool: RedisPool,
}

impl RedisSessionStore {
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }

    fn key(sid: &str) -> String {
        format!("session:{}", sid)
    }

    fn user_key(user_id: &str) -> String {
        format!("user_sessions:{}", user_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, sid: &str, session: &Session, ttl_seconds: u64) -> Result<()> {
        self.redis_pool
            .set_json(&Self::key(sid), session, Some(ttl_seconds))
            .await?;
        self.redis_pool
            .add_to_set(&Self::user_key(&session.user_id), sid, ttl_seconds)
            .await
    }

    async fn get(&self, sid: &str) -> Result<Option<Session>> {
        self.redis_pool.get_json(&Self::key(sid)).await
    }

    async fn remove(&self, sid: &str) -> Result<bool> {
        if let Some(session) = self.get(sid).await? {
            self.redis_pool
                .remove_from_set(&Self::user_key(&session.user_id), sid)
                .await?;
        }
        self.redis_pool.delete(&Self::key(sid)).await
    }

    async fn remove_for_user(&self, user_id: &str) -> Result<u64> {
        let user_key = Self::user_key(user_id);
        let mut removed = 0;
        for sid in self.redis_pool.set_members(&user_key).await? {
            if self.redis_pool.delete(&Self::key(&sid)).await? {
                removed += 1;
            }
        }
        self.redis_pool.delete(&user_key).await?;
        Ok(removed)
    }

    async fn health_check(&self) -> Result<bool> {
        self.redis_pool.health_check().await
    }
}

/// Sessions kept in process memory. Expired entries are dropped when read
/// and whenever a new session is stored.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, sid: &str, session: &Session, _ttl_seconds: u64) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, stored| !stored.is_expired());
        sessions.insert(sid.to_string(), session.clone());
        Ok(())
    }

    async fn get(&self, sid: &str) -> Result<Option<Session>> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(sid) {
                None => return Ok(None),
                Some(session) if !session.is_expired() => return Ok(Some(session.clone())),
                Some(_) => {}
            }
        }

        self.sessions.write().await.remove(sid);
        Ok(None)
    }

    async fn remove(&self, sid: &str) -> Result<bool> {
        Ok(self.sessions.write().await.remove(sid).is_some())
    }

    async fn remove_for_user(&self, user_id: &str) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Secret used to sign session tokens
    pub secret: String,
    /// Session lifetime in seconds
    pub ttl_seconds: u64,
    /// Name of the cookie carrying the session token
    pub cookie_name: String,
}

/// A freshly created session and the token that refers to it
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

/// Creates, resolves and destroys sessions
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    tokens: SessionTokens,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self {
            store,
            tokens: SessionTokens::new(&config.secret),
            config,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.config.ttl_seconds
    }

    /// Create a new session for a user
    pub async fn create(&self, user_id: &str, role: Role) -> Result<IssuedSession> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.ttl_seconds as i64);
        let sid = SessionTokens::new_session_id();

        let session = Session {
            user_id: user_id.to_string(),
            role,
            expires_at,
            created_at: now,
        };
        self.store
            .put(&sid, &session, self.config.ttl_seconds)
            .await?;

        let token = self.tokens.sign(&SessionClaims {
            sid,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        })?;

        info!("Created session for user: {}", user_id);
        Ok(IssuedSession { token, session })
    }

    /// Pull the session token from the cookie, falling back to a bearer
    /// `Authorization` header
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let jar = CookieJar::from_headers(headers);
        if let Some(cookie) = jar.get(&self.config.cookie_name) {
            if !cookie.value().is_empty() {
                return Some(cookie.value().to_string());
            }
        }

        headers
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| auth.token().to_string())
            .filter(|token| !token.is_empty())
    }

    /// Resolve the identity behind a request, if any
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = self.token_from_headers(headers)?;
        self.resolve_token(&token).await
    }

    /// Resolve the identity behind a session token, if any
    pub async fn resolve_token(&self, token: &str) -> Option<Identity> {
        let claims = self.tokens.verify(token).ok()?;

        let session = match self.store.get(&claims.sid).await {
            Ok(Some(session)) => session,
            Ok(None) => return None,
            Err(e) => {
                warn!("Session lookup failed: {}", e);
                return None;
            }
        };

        if session.is_expired() {
            return None;
        }

        Some(session.identity())
    }

    /// Remove the session behind `token`. Invalid tokens are ignored.
    pub async fn destroy(&self, token: &str) -> Result<bool> {
        let Ok(claims) = self.tokens.verify(token) else {
            return Ok(false);
        };

        let removed = self.store.remove(&claims.sid).await?;
        if removed {
            info!("Destroyed session {}", claims.sid);
        }
        Ok(removed)
    }

    /// Remove every session of a user, e.g. after the account is disabled,
    /// demoted or deleted
    pub async fn revoke_user(&self, user_id: &str) -> Result<u64> {
        let removed = self.store.remove_for_user(user_id).await?;
        if removed > 0 {
            info!("Revoked {} sessions of user {}", removed, user_id);
        }
        Ok(removed)
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.store.health_check().await
    }
}
