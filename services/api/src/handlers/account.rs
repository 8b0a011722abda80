//! Login, logout and the current identity

use auth::{
    Identity, Permission,
    models::{LoginCredentials, UserAccount, user::USERS_COLLECTION},
    password::verify_password,
};
use axum::{Extension, extract::State, http::HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use common::store::{Document, Filter};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
    documents::now_timestamp,
    envelope::ApiResponse,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    state::AppState,
};

/// Public view of a user account
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: auth::Role,
}

impl From<UserAccount> for UserSummary {
    fn from(account: UserAccount) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            role: account.role,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserSummary,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub identity: Identity,
    pub permissions: &'static [Permission],
}

/// Look up an active account by email and check its password. Unknown
/// email, inactive account and wrong password are indistinguishable.
async fn authenticate(state: &AppState, email: &str, password: &str) -> ApiResult<UserAccount> {
    let document = state
        .store
        .find_one(USERS_COLLECTION, &Filter::new().eq("email", email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let account: UserAccount = match serde_json::from_value(Value::Object(document)) {
        Ok(account) => account,
        Err(e) => {
            warn!("Unreadable user record for {}: {}", email, e);
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !account.is_active {
        return Err(ApiError::InvalidCredentials);
    }

    match verify_password(&account.password_hash, password) {
        Ok(true) => Ok(account),
        Ok(false) => Err(ApiError::InvalidCredentials),
        Err(e) => {
            warn!("Unreadable password hash for {}: {}", email, e);
            Err(ApiError::InvalidCredentials)
        }
    }
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(credentials): ApiJson<LoginCredentials>,
) -> ApiResult<(CookieJar, ApiResponse<LoginResponse>)> {
    let email = credentials.email.trim().to_lowercase();
    if email.is_empty() || credentials.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let account = match authenticate(&state, &email, &credentials.password).await {
        Ok(account) => account,
        Err(e) => {
            info!("Failed login for {}", email);
            return Err(e);
        }
    };

    let issued = state.sessions.create(&account.id, account.role).await?;

    let mut stamp = Document::new();
    stamp.insert("lastLoginAt".to_string(), Value::String(now_timestamp()));
    if let Err(e) = state.store.update(USERS_COLLECTION, &account.id, stamp).await {
        warn!("Could not record last login for {}: {}", account.id, e);
    }

    let ttl = i64::try_from(state.sessions.ttl_seconds()).unwrap_or(i64::MAX);
    let cookie = Cookie::build((state.sessions.cookie_name().to_string(), issued.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.secure_cookies)
        .max_age(cookie::time::Duration::seconds(ttl));

    info!("User {} logged in", account.id);
    Ok((
        jar.add(cookie),
        ApiResponse::ok(LoginResponse {
            user: account.into(),
            token: issued.token,
            expires_at: issued.session.expires_at,
        }),
    ))
}

/// `POST /api/auth/logout`: always succeeds, with or without a session
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> (CookieJar, ApiResponse<Value>) {
    if let Some(token) = state.sessions.token_from_headers(&headers) {
        if let Err(e) = state.sessions.destroy(&token).await {
            warn!("Failed to destroy session: {}", e);
        }
    }

    let removal = Cookie::build(state.sessions.cookie_name().to_string()).path("/");
    (
        jar.remove(removal),
        ApiResponse::ok(json!({ "loggedOut": true })),
    )
}

/// `GET /api/auth/me`
pub async fn me(Extension(identity): Extension<Identity>) -> ApiResponse<MeResponse> {
    let permissions = identity.role.permissions();
    ApiResponse::ok(MeResponse {
        identity,
        permissions,
    })
}
