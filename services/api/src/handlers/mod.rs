//! HTTP handlers
//!
//! Admin handlers run behind [`crate::middleware::require_session`] and
//! check one permission each; public handlers apply the resource's
//! visibility filter instead.

use common::store::{Document, Filter};

use crate::{
    documents::redact,
    envelope::{ApiResponse, Pagination},
    error::{ApiError, ApiResult},
    query::{QueryParams, build_list_query},
    resources::{ResourceSpec, find_resource},
    state::AppState,
};

pub mod account;
pub mod admin;
pub mod dashboard;
pub mod health;
pub mod public;
pub mod settings;

fn resource_or_404(name: &str) -> ApiResult<&'static ResourceSpec> {
    find_resource(name).ok_or_else(|| ApiError::NotFound(format!("Unknown resource: {}", name)))
}

/// Run a paginated list query. `base` is ANDed with whatever the query
/// parameters ask for.
async fn list_documents(
    state: &AppState,
    resource: &ResourceSpec,
    params: &QueryParams,
    base: Filter,
) -> ApiResult<ApiResponse<Vec<Document>>> {
    let query = build_list_query(resource, params, base)?;

    let (documents, total) = tokio::try_join!(
        state.store.find(resource.collection, &query.spec),
        state.store.count(resource.collection, &query.spec.filter),
    )?;

    let documents = documents
        .into_iter()
        .map(|document| redact(resource, document))
        .collect();

    Ok(ApiResponse::paginated(
        documents,
        Pagination::new(query.page, query.spec.limit, total),
    ))
}
