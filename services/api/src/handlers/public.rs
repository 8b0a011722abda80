//! Unauthenticated reads and form submissions
//!
//! Every read carries the resource's visibility constraint, which query
//! parameters can narrow but never lift.

use axum::extract::State;
use common::store::{Condition, Document, Filter, document_id};
use serde_json::Value;
use tracing::info;

use super::{list_documents, resource_or_404, settings::load_settings};
use crate::{
    documents::{create_document, not_found, redact},
    envelope::ApiResponse,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    query::QueryParams,
    resources::{BOOKINGS, CONTACTS, ResourceSpec},
    state::AppState,
};

const VIEWS: &str = "views";

/// Visibility filter of a public resource; private resources are 404
fn visibility(name: &str) -> ApiResult<(&'static ResourceSpec, Filter)> {
    let resource = resource_or_404(name)?;
    let (field, literal) = resource
        .visibility
        .ok_or_else(|| ApiError::NotFound(format!("Unknown resource: {}", name)))?;

    Ok((resource, Filter::new().eq(field, literal.to_value())))
}

/// `GET /api/public/:resource`
pub async fn list(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
    ApiQuery(params): ApiQuery<QueryParams>,
) -> ApiResult<ApiResponse<Vec<Document>>> {
    let (resource, base) = visibility(&name)?;
    list_documents(&state, resource, &params, base).await
}

/// `GET /api/public/:resource/:key`, where `key` is a slug or an id.
/// Fetching a resource that counts views bumps its counter by one.
pub async fn read(
    State(state): State<AppState>,
    ApiPath((name, key)): ApiPath<(String, String)>,
) -> ApiResult<ApiResponse<Document>> {
    let (resource, base) = visibility(&name)?;
    if resource.lookup_fields.is_empty() {
        return Err(ApiError::NotFound(format!(
            "{} cannot be fetched individually",
            resource.label
        )));
    }

    let filter = base.and(Condition::AnyEq {
        fields: resource.lookup_fields.iter().map(|f| f.to_string()).collect(),
        value: Value::String(key),
    });

    let document = state
        .store
        .find_one(resource.collection, &filter)
        .await?
        .ok_or_else(|| not_found(resource))?;

    let document = if resource.counts_views {
        let id = document_id(&document)
            .ok_or_else(|| ApiError::Internal(format!("{} without id", resource.name)))?
            .to_string();
        state
            .store
            .increment(resource.collection, &id, &filter, VIEWS, 1)
            .await?
            .ok_or_else(|| not_found(resource))?
    } else {
        document
    };

    Ok(ApiResponse::ok(redact(resource, document)))
}

/// `GET /api/public/settings`
pub async fn settings(State(state): State<AppState>) -> ApiResult<ApiResponse<Document>> {
    let mut settings = load_settings(&state).await?;

    if let Some(analytics_id) = &state.config.analytics_id {
        settings.insert(
            "analyticsId".to_string(),
            Value::String(analytics_id.clone()),
        );
    }

    Ok(ApiResponse::ok(settings))
}

/// Store a visitor submission; the workflow status always starts at the
/// resource default
async fn submit(
    state: &AppState,
    resource: &ResourceSpec,
    mut body: Document,
) -> ApiResult<ApiResponse<Document>> {
    body.remove("status");

    let document = create_document(state.store.as_ref(), resource, body).await?;
    info!("Received {} submission", resource.name);
    Ok(ApiResponse::created(document))
}

/// `POST /api/public/contact`
pub async fn submit_contact(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Document>,
) -> ApiResult<ApiResponse<Document>> {
    submit(&state, &CONTACTS, body).await
}

/// `POST /api/public/bookings`
pub async fn submit_booking(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Document>,
) -> ApiResult<ApiResponse<Document>> {
    submit(&state, &BOOKINGS, body).await
}
