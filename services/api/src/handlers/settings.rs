//! Site settings: a single document with a few nested sections

use auth::{Identity, Permission};
use axum::{Extension, extract::State};
use common::store::{Document, ID_FIELD};
use serde_json::Value;
use tracing::info;

use crate::{
    documents::{CREATED_AT, UPDATED_AT, now_timestamp},
    envelope::ApiResponse,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    middleware::authorize,
    state::AppState,
};

pub const SETTINGS_COLLECTION: &str = "settings";
pub const SETTINGS_ID: &str = "site";

/// Expected JSON shape of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    List,
    Object,
}

/// Sections that can be replaced on their own
const SECTIONS: [(&str, Shape); 4] = [
    ("operationRegions", Shape::List),
    ("targetGroups", Shape::List),
    ("leadershipMembers", Shape::List),
    ("footer", Shape::Object),
];

fn section_shape(name: &str) -> Option<Shape> {
    SECTIONS
        .iter()
        .find(|(section, _)| *section == name)
        .map(|(_, shape)| *shape)
}

fn check_shape(name: &str, shape: Shape, value: &Value) -> ApiResult<()> {
    match (shape, value) {
        (Shape::List, Value::Array(_)) | (Shape::Object, Value::Object(_)) => Ok(()),
        (Shape::List, _) => Err(ApiError::Validation(format!("{} must be an array", name))),
        (Shape::Object, _) => Err(ApiError::Validation(format!("{} must be an object", name))),
    }
}

/// The settings document without its id; empty when never saved
pub async fn load_settings(state: &AppState) -> ApiResult<Document> {
    let mut settings = state
        .store
        .find_by_id(SETTINGS_COLLECTION, SETTINGS_ID)
        .await?
        .unwrap_or_default();
    settings.remove(ID_FIELD);
    Ok(settings)
}

async fn save(state: &AppState, mut patch: Document) -> ApiResult<Document> {
    patch.insert(UPDATED_AT.to_string(), Value::String(now_timestamp()));

    let mut settings = state
        .store
        .upsert(SETTINGS_COLLECTION, SETTINGS_ID, patch)
        .await?;
    settings.remove(ID_FIELD);
    Ok(settings)
}

/// `GET /api/admin/settings`
pub async fn get_settings(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<ApiResponse<Document>> {
    authorize(&identity, Permission::SettingsView)?;
    Ok(ApiResponse::ok(load_settings(&state).await?))
}

/// `PUT /api/admin/settings`: merge top-level keys into the document
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(mut patch): ApiJson<Document>,
) -> ApiResult<ApiResponse<Document>> {
    authorize(&identity, Permission::SettingsEdit)?;

    for field in [ID_FIELD, CREATED_AT, UPDATED_AT] {
        patch.remove(field);
    }
    for (name, value) in &patch {
        if let Some(shape) = section_shape(name) {
            check_shape(name, shape, value)?;
        }
    }

    let settings = save(&state, patch).await?;
    info!("{} updated site settings", identity.user_id);
    Ok(ApiResponse::ok(settings))
}

/// `PUT /api/admin/settings/:section`: replace one section wholesale
pub async fn update_section(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(section): ApiPath<String>,
    ApiJson(value): ApiJson<Value>,
) -> ApiResult<ApiResponse<Document>> {
    authorize(&identity, Permission::SettingsEdit)?;

    let shape = section_shape(&section)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown settings section: {}", section)))?;
    check_shape(&section, shape, &value)?;

    let mut patch = Document::new();
    patch.insert(section.clone(), value);

    let settings = save(&state, patch).await?;
    info!("{} replaced settings section {}", identity.user_id, section);
    Ok(ApiResponse::ok(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sections() {
        assert_eq!(section_shape("footer"), Some(Shape::Object));
        assert_eq!(section_shape("targetGroups"), Some(Shape::List));
        assert_eq!(section_shape("theme"), None);
    }

    #[test]
    fn test_shape_check() {
        assert!(check_shape("targetGroups", Shape::List, &json!([{ "name": "Youth" }])).is_ok());
        assert!(check_shape("targetGroups", Shape::List, &json!({})).is_err());
        assert!(check_shape("footer", Shape::Object, &json!({ "phone": "1" })).is_ok());
        assert!(check_shape("footer", Shape::Object, &json!("x")).is_err());
    }
}
