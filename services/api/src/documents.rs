//! Preparation of documents written through the admin and public endpoints
//!
//! Creates run: strip server-owned fields, check required fields, apply
//! field rules, fill defaults, derive the slug, hash credentials, check
//! uniqueness, stamp identity and timestamps, insert. Nothing is written
//! unless every step before the insert succeeds.

use auth::{
    Role,
    password::hash_password,
    validation::{slugify, validate_email, validate_password, validate_phone},
};
use chrono::{SecondsFormat, Utc};
use common::store::{Document, DocumentStore, Filter, ID_FIELD, document_id};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    resources::{ResourceSpec, Rule, SERVER_FIELDS},
};

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";
const SLUG: &str = "slug";
const STATUS: &str = "status";
const PASSWORD: &str = "password";
const PASSWORD_HASH: &str = "passwordHash";

/// Current time as stored in documents: RFC 3339, UTC, millisecond precision
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn not_found(resource: &ResourceSpec) -> ApiError {
    ApiError::NotFound(format!("{} not found", resource.label))
}

/// Remove every field the server owns from a client-supplied body
pub fn strip_server_fields(document: &mut Document) {
    for field in SERVER_FIELDS {
        document.remove(field);
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Every required field must be present and non-blank
pub fn check_required(resource: &ResourceSpec, document: &Document) -> ApiResult<()> {
    let missing: Vec<&str> = resource
        .required
        .iter()
        .copied()
        .filter(|field| document.get(*field).is_none_or(is_blank))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// A patch may omit required fields but may not blank them
pub fn check_not_blanked(resource: &ResourceSpec, patch: &Document) -> ApiResult<()> {
    match resource
        .required
        .iter()
        .find(|field| patch.get(**field).is_some_and(is_blank))
    {
        Some(field) => Err(ApiError::Validation(format!("{} cannot be empty", field))),
        None => Ok(()),
    }
}

/// Check and normalize every ruled field the document carries
pub fn apply_rules(resource: &ResourceSpec, document: &mut Document) -> ApiResult<()> {
    for (field, rule) in resource.rules {
        let Some(value) = document.get_mut(*field) else {
            continue;
        };

        match rule {
            Rule::Email => {
                let email = value
                    .as_str()
                    .ok_or_else(|| ApiError::Validation(format!("{} must be a string", field)))?
                    .trim()
                    .to_lowercase();
                validate_email(&email).map_err(ApiError::Validation)?;
                *value = Value::String(email);
            }
            Rule::Phone => match value {
                Value::Null => {}
                Value::String(phone) if phone.trim().is_empty() => {}
                Value::String(phone) => validate_phone(phone).map_err(ApiError::Validation)?,
                _ => return Err(ApiError::Validation("Invalid phone number".to_string())),
            },
            Rule::Role => {
                let role = value
                    .as_str()
                    .and_then(|s| s.parse::<Role>().ok())
                    .ok_or_else(|| {
                        let names: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
                        ApiError::Validation(format!(
                            "Invalid role: expected one of {}",
                            names.join(", ")
                        ))
                    })?;
                *value = Value::from(role.as_str());
            }
            Rule::OneOf(allowed) => {
                let ok = value
                    .as_str()
                    .is_some_and(|s| allowed.iter().any(|candidate| *candidate == s));
                if !ok {
                    return Err(ApiError::Validation(format!(
                        "Invalid {}: expected one of {}",
                        field,
                        allowed.join(", ")
                    )));
                }
            }
            Rule::Boolean => {
                if !value.is_boolean() {
                    return Err(ApiError::Validation(format!(
                        "{} must be true or false",
                        field
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Fill absent fields from the resource defaults
pub fn apply_defaults(resource: &ResourceSpec, document: &mut Document) {
    for (field, literal) in resource.defaults {
        document
            .entry(*field)
            .or_insert_with(|| literal.to_value());
    }
}

fn slug_from(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(slugify)
}

/// Give sluggable resources a normalized `slug`, derived from the source
/// field when the body has none
pub fn derive_slug(resource: &ResourceSpec, document: &mut Document) -> ApiResult<()> {
    let Some(source) = resource.slug_source else {
        return Ok(());
    };

    let slug = slug_from(document.get(SLUG))
        .or_else(|| slug_from(document.get(source)))
        .unwrap_or_default();
    if slug.is_empty() {
        return Err(ApiError::Validation(format!(
            "Could not derive a slug from {}",
            source
        )));
    }

    document.insert(SLUG.to_string(), Value::String(slug));
    Ok(())
}

/// Normalize a `slug` carried by an update
fn normalize_slug(resource: &ResourceSpec, patch: &mut Document) -> ApiResult<()> {
    if resource.slug_source.is_none() || !patch.contains_key(SLUG) {
        return Ok(());
    }

    match slug_from(patch.get(SLUG)).filter(|slug| !slug.is_empty()) {
        Some(slug) => {
            patch.insert(SLUG.to_string(), Value::String(slug));
            Ok(())
        }
        None => Err(ApiError::Validation("slug cannot be empty".to_string())),
    }
}

/// Replace a plaintext `password` with its argon2 hash
pub fn apply_credentials(resource: &ResourceSpec, document: &mut Document) -> ApiResult<()> {
    if !resource.has_credentials {
        return Ok(());
    }
    let Some(password) = document.remove(PASSWORD) else {
        return Ok(());
    };

    let password = password
        .as_str()
        .ok_or_else(|| ApiError::Validation("password must be a string".to_string()))?;
    validate_password(password).map_err(ApiError::Validation)?;

    let hash = hash_password(password)?;
    document.insert(PASSWORD_HASH.to_string(), Value::String(hash));
    Ok(())
}

/// Whether this write moves the document into the publish-gated status
pub fn publishes(resource: &ResourceSpec, document: &Document) -> bool {
    resource
        .publish_status
        .is_some_and(|status| document.get(STATUS).and_then(Value::as_str) == Some(status))
}

/// Fail with 409 when another document already holds one of the unique
/// values carried by `document`
pub async fn ensure_unique(
    store: &dyn DocumentStore,
    resource: &ResourceSpec,
    document: &Document,
    exclude_id: Option<&str>,
) -> ApiResult<()> {
    for field in resource.unique {
        let Some(value) = document.get(*field).filter(|v| !v.is_null()) else {
            continue;
        };

        let filter = Filter::new().eq(*field, value.clone());
        if let Some(existing) = store.find_one(resource.collection, &filter).await? {
            if exclude_id.is_none_or(|id| document_id(&existing) != Some(id)) {
                return Err(ApiError::Conflict(format!(
                    "A {} with this {} already exists",
                    resource.label.to_lowercase(),
                    field
                )));
            }
        }
    }

    Ok(())
}

/// Drop fields that are never returned to clients
pub fn redact(resource: &ResourceSpec, mut document: Document) -> Document {
    for field in resource.hidden {
        document.remove(*field);
    }
    document
}

/// Run the full create pipeline and insert the result
pub async fn create_document(
    store: &dyn DocumentStore,
    resource: &ResourceSpec,
    mut document: Document,
) -> ApiResult<Document> {
    strip_server_fields(&mut document);
    check_required(resource, &document)?;
    apply_rules(resource, &mut document)?;
    apply_defaults(resource, &mut document);
    derive_slug(resource, &mut document)?;
    apply_credentials(resource, &mut document)?;
    ensure_unique(store, resource, &document, None).await?;

    let id = Uuid::new_v4().to_string();
    let now = now_timestamp();
    document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    document.insert(CREATED_AT.to_string(), Value::String(now.clone()));
    document.insert(UPDATED_AT.to_string(), Value::String(now));

    let stored = store.insert(resource.collection, document).await?;
    info!("Created {} {}", resource.name, id);
    Ok(redact(resource, stored))
}

/// Validate a partial update and merge it into the stored document
pub async fn update_document(
    store: &dyn DocumentStore,
    resource: &ResourceSpec,
    id: &str,
    mut patch: Document,
) -> ApiResult<Document> {
    if store.find_by_id(resource.collection, id).await?.is_none() {
        return Err(not_found(resource));
    }

    strip_server_fields(&mut patch);
    check_not_blanked(resource, &patch)?;
    apply_rules(resource, &mut patch)?;
    normalize_slug(resource, &mut patch)?;
    apply_credentials(resource, &mut patch)?;
    ensure_unique(store, resource, &patch, Some(id)).await?;

    patch.insert(UPDATED_AT.to_string(), Value::String(now_timestamp()));
    let updated = store
        .update(resource.collection, id, patch)
        .await?
        .ok_or_else(|| not_found(resource))?;

    info!("Updated {} {}", resource.name, id);
    Ok(redact(resource, updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{CONTACTS, GALLERY, NEWS, SUPPORTERS, USERS_RESOURCE};
    use common::store::MemoryStore;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test documents are objects"),
        }
    }

    #[test]
    fn test_timestamp_format() {
        let now = now_timestamp();
        assert!(now.ends_with('Z'));
        assert_eq!(now.len(), "2024-01-01T00:00:00.000Z".len());
    }

    #[test]
    fn test_server_fields_are_stripped() {
        let mut body = doc(json!({
            "id": "mine", "createdAt": "x", "views": 900, "passwordHash": "h", "title": "t"
        }));
        strip_server_fields(&mut body);
        assert_eq!(body, doc(json!({ "title": "t" })));
    }

    #[test]
    fn test_required_fields() {
        let body = doc(json!({ "name": "Clinic Friends", "logo": "  " }));
        match check_required(&SUPPORTERS, &body) {
            Err(ApiError::Validation(message)) => assert_eq!(message, "Missing required fields: logo"),
            other => panic!("unexpected {other:?}"),
        }

        let body = doc(json!({ "name": "Clinic Friends", "logo": "/logo.png" }));
        assert!(check_required(&SUPPORTERS, &body).is_ok());
    }

    #[test]
    fn test_patch_may_not_blank_required_fields() {
        assert!(check_not_blanked(&NEWS, &doc(json!({ "featured": true }))).is_ok());
        assert!(matches!(
            check_not_blanked(&NEWS, &doc(json!({ "title": "" }))),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_rules_normalize_and_reject() {
        let mut body = doc(json!({ "email": " Ada@Example.ORG ", "phone": "+237 650 00 00 00" }));
        apply_rules(&CONTACTS, &mut body).unwrap();
        assert_eq!(body["email"], json!("ada@example.org"));

        let mut body = doc(json!({ "email": "not-an-email" }));
        assert!(apply_rules(&CONTACTS, &mut body).is_err());

        let mut body = doc(json!({ "status": "deleted" }));
        assert!(apply_rules(&CONTACTS, &mut body).is_err());

        let mut body = doc(json!({ "featured": "yes" }));
        assert!(apply_rules(&GALLERY, &mut body).is_err());

        let mut body = doc(json!({ "role": "Editor" }));
        apply_rules(&USERS_RESOURCE, &mut body).unwrap();
        assert_eq!(body["role"], json!("editor"));

        let mut body = doc(json!({ "role": "owner" }));
        assert!(apply_rules(&USERS_RESOURCE, &mut body).is_err());
    }

    #[test]
    fn test_slug_derivation() {
        let mut body = doc(json!({ "title": "Free Eye Screening, June!" }));
        derive_slug(&NEWS, &mut body).unwrap();
        assert_eq!(body["slug"], json!("free-eye-screening-june"));

        let mut body = doc(json!({ "title": "Ignored", "slug": "Custom Slug" }));
        derive_slug(&NEWS, &mut body).unwrap();
        assert_eq!(body["slug"], json!("custom-slug"));

        let mut body = doc(json!({ "title": "!!!" }));
        assert!(derive_slug(&NEWS, &mut body).is_err());

        let mut body = doc(json!({ "name": "x" }));
        derive_slug(&SUPPORTERS, &mut body).unwrap();
        assert!(!body.contains_key("slug"));
    }

    #[test]
    fn test_publish_detection() {
        assert!(publishes(&NEWS, &doc(json!({ "status": "published" }))));
        assert!(!publishes(&NEWS, &doc(json!({ "status": "draft" }))));
        assert!(!publishes(&CONTACTS, &doc(json!({ "status": "published" }))));
    }

    #[tokio::test]
    async fn test_missing_required_field_writes_nothing() {
        let store = MemoryStore::new();
        let result = create_document(&store, &SUPPORTERS, doc(json!({ "name": "Acme" }))).await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert_eq!(store.count("supporters", &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_stamps_and_defaults() {
        let store = MemoryStore::new();
        let created = create_document(
            &store,
            &NEWS,
            doc(json!({ "id": "forged", "title": "Open Day", "content": "...", "views": 99 })),
        )
        .await
        .unwrap();

        assert_ne!(created["id"], json!("forged"));
        assert_eq!(created["slug"], json!("open-day"));
        assert_eq!(created["status"], json!("draft"));
        assert_eq!(created["views"], json!(0));
        assert_eq!(created["createdAt"], created["updatedAt"]);
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let store = MemoryStore::new();
        let body = doc(json!({ "title": "Open Day", "content": "..." }));
        create_document(&store, &NEWS, body.clone()).await.unwrap();

        let result = create_document(&store, &NEWS, body).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
        assert_eq!(store.count("news", &Filter::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_user_password_is_hashed_and_hidden() {
        let store = MemoryStore::new();
        let created = create_document(
            &store,
            &USERS_RESOURCE,
            doc(json!({
                "name": "Amina",
                "email": "Amina@Clinic.org",
                "password": "Str0ngPass",
                "role": "editor"
            })),
        )
        .await
        .unwrap();

        assert!(!created.contains_key("password"));
        assert!(!created.contains_key("passwordHash"));
        assert_eq!(created["email"], json!("amina@clinic.org"));

        let id = created["id"].as_str().unwrap();
        let stored = store.find_by_id("users", id).await.unwrap().unwrap();
        let hash = stored["passwordHash"].as_str().unwrap();
        assert!(auth::password::verify_password(hash, "Str0ngPass").unwrap());

        let weak = create_document(
            &store,
            &USERS_RESOURCE,
            doc(json!({ "name": "B", "email": "b@clinic.org", "password": "short", "role": "viewer" })),
        )
        .await;
        assert!(matches!(weak, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_rechecks_uniqueness_against_other_documents() {
        let store = MemoryStore::new();
        let first = create_document(&store, &NEWS, doc(json!({ "title": "First", "content": "." })))
            .await
            .unwrap();
        create_document(&store, &NEWS, doc(json!({ "title": "Second", "content": "." })))
            .await
            .unwrap();
        let id = first["id"].as_str().unwrap();

        let same = update_document(&store, &NEWS, id, doc(json!({ "slug": "first" }))).await;
        assert!(same.is_ok());

        let taken = update_document(&store, &NEWS, id, doc(json!({ "slug": "second" }))).await;
        assert!(matches!(taken, Err(ApiError::Conflict(_))));

        let missing = update_document(&store, &NEWS, "nope", doc(json!({ "featured": true }))).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));
    }
}
