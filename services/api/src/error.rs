//! Error taxonomy for the API service
//!
//! Every handler path ends in either a success envelope or one of these
//! variants, each of which maps to exactly one HTTP status.

use auth::Permission;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::StoreError;
use thiserror::Error;
use tracing::error;

use crate::envelope::ErrorBody;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// No valid session
    #[error("Authentication required")]
    Unauthenticated,

    /// Login attempt with an unknown email or a wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Valid session whose role lacks the permission
    #[error("Insufficient permissions: {0} required")]
    Forbidden(Permission),

    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Target resource or document absent
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation
    #[error("{0}")]
    Conflict(String),

    /// Store or unexpected failure; the detail is logged, never returned
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to show to the client
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { .. } => {
                ApiError::Conflict("A record with the same key already exists".to_string())
            }
            StoreError::InvalidQuery(message) => ApiError::Validation(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!("Request failed: {}", detail);
        }

        let body = ErrorBody {
            success: false,
            error: self.public_message(),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::error::DatabaseError;

    #[test]
    fn test_every_variant_maps_to_its_status() {
        let cases = [
            (ApiError::Unauthenticated, 401),
            (ApiError::InvalidCredentials, 401),
            (ApiError::Forbidden(Permission::ContentDelete), 403),
            (ApiError::Validation("bad".into()), 400),
            (ApiError::NotFound("gone".into()), 404),
            (ApiError::Conflict("taken".into()), 409),
            (ApiError::Internal("boom".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.status().as_u16(), status, "{err:?}");
        }
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = ApiError::Internal("connection refused at 10.0.0.3".into());
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_forbidden_names_the_permission() {
        let err = ApiError::Forbidden(Permission::ContentDelete);
        assert_eq!(
            err.public_message(),
            "Insufficient permissions: content.delete required"
        );
    }

    #[test]
    fn test_store_errors_map_to_conflict_or_internal() {
        let duplicate = StoreError::Duplicate {
            collection: "news".into(),
            key: "abc".into(),
        };
        assert!(matches!(ApiError::from(duplicate), ApiError::Conflict(_)));

        let window = StoreError::InvalidQuery("offset out of range".into());
        assert!(matches!(ApiError::from(window), ApiError::Validation(_)));

        let failed = StoreError::Database(DatabaseError::Migration("down".into()));
        assert!(matches!(ApiError::from(failed), ApiError::Internal(_)));
    }
}
