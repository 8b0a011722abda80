//! Session guard for the admin and account routes

use auth::{Identity, Permission};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Resolve the caller's session and make its [`Identity`] available to the
/// handler as an extension. Requests without a valid session stop here
/// with 401 and never reach the store.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = state
        .sessions
        .resolve(req.headers())
        .await
        .ok_or(ApiError::Unauthenticated)?;

    debug!(
        "{} {} as {} ({})",
        req.method(),
        req.uri().path(),
        identity.user_id,
        identity.role.as_str()
    );

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Fail with 403 unless the identity's role grants `permission`
pub fn authorize(identity: &Identity, permission: Permission) -> ApiResult<()> {
    if identity.can(permission) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::Role;

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: "u1".to_string(),
            role,
        }
    }

    #[test]
    fn test_authorize() {
        assert!(authorize(&identity(Role::Editor), Permission::ContentEdit).is_ok());
        assert!(matches!(
            authorize(&identity(Role::Viewer), Permission::ContentDelete),
            Err(ApiError::Forbidden(Permission::ContentDelete))
        ));
        assert!(authorize(&identity(Role::Superadmin), Permission::UsersManage).is_ok());
    }
}
