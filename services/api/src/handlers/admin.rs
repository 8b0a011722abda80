//! Session-gated CRUD over the registered resources

use auth::{Identity, Permission};
use axum::{Extension, extract::State};
use common::store::{Document, Filter};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::{list_documents, resource_or_404};
use crate::{
    documents::{
        UPDATED_AT, create_document, not_found, now_timestamp, publishes, redact, update_document,
    },
    envelope::ApiResponse,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    middleware::authorize,
    query::QueryParams,
    state::AppState,
};

/// Action applied by a bulk request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Feature,
    Unfeature,
    Activate,
    Deactivate,
    Delete,
}

impl BulkAction {
    /// Field update performed by the action; `None` for deletion
    fn patch(self) -> Option<(&'static str, bool)> {
        match self {
            BulkAction::Feature => Some(("featured", true)),
            BulkAction::Unfeature => Some(("featured", false)),
            BulkAction::Activate => Some(("isActive", true)),
            BulkAction::Deactivate => Some(("isActive", false)),
            BulkAction::Delete => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    #[serde(default)]
    pub ids: Vec<String>,
    pub action: BulkAction,
}

/// Result of a bulk request. `affected` may be lower than `requested`
/// when some ids no longer exist.
#[derive(Debug, Serialize)]
pub struct BulkOutcome {
    pub action: BulkAction,
    pub requested: usize,
    pub affected: u64,
}

/// Account fields whose change invalidates the user's existing sessions
const SESSION_FIELDS: [&str; 2] = ["role", "isActive"];

/// `GET /api/admin/:resource`
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(name): ApiPath<String>,
    ApiQuery(params): ApiQuery<QueryParams>,
) -> ApiResult<ApiResponse<Vec<Document>>> {
    let resource = resource_or_404(&name)?;
    authorize(&identity, resource.permissions.view)?;

    list_documents(&state, resource, &params, Filter::new()).await
}

/// `GET /api/admin/:resource/:id`
pub async fn read(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath((name, id)): ApiPath<(String, String)>,
) -> ApiResult<ApiResponse<Document>> {
    let resource = resource_or_404(&name)?;
    authorize(&identity, resource.permissions.view)?;

    let document = state
        .store
        .find_by_id(resource.collection, &id)
        .await?
        .ok_or_else(|| not_found(resource))?;

    Ok(ApiResponse::ok(redact(resource, document)))
}

/// `POST /api/admin/:resource`
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(name): ApiPath<String>,
    ApiJson(body): ApiJson<Document>,
) -> ApiResult<ApiResponse<Document>> {
    let resource = resource_or_404(&name)?;
    authorize(&identity, resource.permissions.create)?;
    if publishes(resource, &body) {
        authorize(&identity, Permission::ContentPublish)?;
    }

    let document = create_document(state.store.as_ref(), resource, body).await?;
    Ok(ApiResponse::created(document))
}

/// `PUT /api/admin/:resource/:id`
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath((name, id)): ApiPath<(String, String)>,
    ApiJson(patch): ApiJson<Document>,
) -> ApiResult<ApiResponse<Document>> {
    let resource = resource_or_404(&name)?;
    authorize(&identity, resource.permissions.edit)?;
    if publishes(resource, &patch) {
        authorize(&identity, Permission::ContentPublish)?;
    }

    let revokes = resource.has_credentials && SESSION_FIELDS.iter().any(|f| patch.contains_key(*f));

    let document = update_document(state.store.as_ref(), resource, &id, patch).await?;
    if revokes {
        state.sessions.revoke_user(&id).await?;
    }
    Ok(ApiResponse::ok(document))
}

/// `DELETE /api/admin/:resource/:id`
pub async fn remove(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath((name, id)): ApiPath<(String, String)>,
) -> ApiResult<ApiResponse<Value>> {
    let resource = resource_or_404(&name)?;
    authorize(&identity, resource.permissions.delete)?;

    if resource.has_credentials && id == identity.user_id {
        return Err(ApiError::Validation(
            "You cannot delete your own account".to_string(),
        ));
    }

    if !state.store.delete(resource.collection, &id).await? {
        return Err(not_found(resource));
    }
    if resource.has_credentials {
        state.sessions.revoke_user(&id).await?;
    }

    info!("{} deleted {} {}", identity.user_id, resource.name, id);
    Ok(ApiResponse::ok(json!({ "id": id })))
}

/// `POST /api/admin/:resource/bulk`
pub async fn bulk(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(name): ApiPath<String>,
    ApiJson(request): ApiJson<BulkRequest>,
) -> ApiResult<ApiResponse<BulkOutcome>> {
    let resource = resource_or_404(&name)?;
    if !resource.bulk {
        return Err(ApiError::NotFound(format!(
            "Bulk operations are not available for {}",
            resource.name
        )));
    }

    let permission = match request.action {
        BulkAction::Delete => resource.permissions.delete,
        _ => resource.permissions.edit,
    };
    authorize(&identity, permission)?;

    let mut ids: Vec<String> = request
        .ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    ids.sort();
    ids.dedup();

    if ids.is_empty() {
        return Err(ApiError::Validation(
            "ids must contain at least one id".to_string(),
        ));
    }

    let affected = match request.action.patch() {
        None => state.store.delete_many(resource.collection, &ids).await?,
        Some((field, value)) => {
            let mut patch = Document::new();
            patch.insert(field.to_string(), Value::Bool(value));
            patch.insert(UPDATED_AT.to_string(), Value::String(now_timestamp()));
            state
                .store
                .update_many(resource.collection, &ids, &patch)
                .await?
        }
    };

    info!(
        "Bulk {:?} on {}: {} of {} affected",
        request.action,
        resource.name,
        affected,
        ids.len()
    );

    Ok(ApiResponse::ok(BulkOutcome {
        action: request.action,
        requested: ids.len(),
        affected,
    }))
}
