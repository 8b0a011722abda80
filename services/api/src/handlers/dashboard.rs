//! Admin dashboard summary

use auth::{Identity, Permission};
use axum::{Extension, extract::State};
use common::store::Filter;
use serde::Serialize;
use serde_json::Map;

use crate::{
    envelope::ApiResponse,
    error::ApiResult,
    middleware::authorize,
    resources::{BOOKINGS, CONTACTS, NEWS, RESOURCES, USERS_RESOURCE},
    state::AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    /// Document count per resource
    pub counts: Map<String, serde_json::Value>,
    pub unread_contacts: u64,
    pub pending_bookings: u64,
    pub published_news: u64,
    pub draft_news: u64,
}

/// `GET /api/admin/dashboard`
pub async fn summary(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<ApiResponse<DashboardSummary>> {
    authorize(&identity, Permission::AnalyticsView)?;

    let store = &state.store;
    let mut counts = Map::new();
    for resource in RESOURCES {
        if resource.name == USERS_RESOURCE.name {
            continue;
        }
        let total = store.count(resource.collection, &Filter::new()).await?;
        counts.insert(resource.name.to_string(), total.into());
    }

    let by_status = |status: &str| Filter::new().eq("status", status);
    let (unread, pending, published, draft) = (
        by_status("unread"),
        by_status("pending"),
        by_status("published"),
        by_status("draft"),
    );
    let (unread_contacts, pending_bookings, published_news, draft_news) = tokio::try_join!(
        store.count(CONTACTS.collection, &unread),
        store.count(BOOKINGS.collection, &pending),
        store.count(NEWS.collection, &published),
        store.count(NEWS.collection, &draft),
    )?;

    Ok(ApiResponse::ok(DashboardSummary {
        counts,
        unread_contacts,
        pending_bookings,
        published_news,
        draft_news,
    }))
}
