//! In-process document store
//!
//! Keeps every collection in a `Vec` behind a single `RwLock`. Used for tests
//! and for running the service without Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Document, DocumentStore, Filter, ID_FIELD, QuerySpec, document_id};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn merge(target: &mut Document, patch: &Document) {
    for (key, value) in patch {
        if key != ID_FIELD {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, query: &QuerySpec) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matching: Vec<&Document> = documents
            .iter()
            .filter(|d| query.filter.matches(d))
            .collect();
        matching.sort_by(|a, b| query.sort.compare(a, b));

        Ok(matching
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)))
            .cloned())
    }

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<Document> {
        let id = document_id(&document)
            .ok_or_else(|| StoreError::InvalidDocument("document has no id".to_string()))?
            .to_string();

        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();
        if documents.iter().any(|d| document_id(d) == Some(id.as_str())) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
                key: id,
            });
        }

        documents.push(document.clone());
        Ok(document)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> StoreResult<Option<Document>> {
        let mut collections = self.collections.write().await;
        let Some(document) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| document_id(d) == Some(id)))
        else {
            return Ok(None);
        };

        merge(document, &patch);
        Ok(Some(document.clone()))
    }

    async fn upsert(&self, collection: &str, id: &str, patch: Document) -> StoreResult<Document> {
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();

        if let Some(document) = documents.iter_mut().find(|d| document_id(d) == Some(id)) {
            merge(document, &patch);
            return Ok(document.clone());
        }

        let mut document = Document::new();
        document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        merge(&mut document, &patch);
        documents.push(document.clone());
        Ok(document)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(false);
        };

        let before = documents.len();
        documents.retain(|d| document_id(d) != Some(id));
        Ok(documents.len() < before)
    }

    async fn update_many(
        &self,
        collection: &str,
        ids: &[String],
        patch: &Document,
    ) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut affected = 0;
        for document in documents.iter_mut() {
            if document_id(document).is_some_and(|id| ids.iter().any(|i| i == id)) {
                merge(document, patch);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|d| !document_id(d).is_some_and(|id| ids.iter().any(|i| i == id)));
        Ok((before - documents.len()) as u64)
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        filter: &Filter,
        field: &str,
        by: i64,
    ) -> StoreResult<Option<Document>> {
        let mut collections = self.collections.write().await;
        let Some(document) = collections.get_mut(collection).and_then(|docs| {
            docs.iter_mut()
                .find(|d| document_id(d) == Some(id) && filter.matches(d))
        })
        else {
            return Ok(None);
        };

        let current = document.get(field).and_then(Value::as_i64).unwrap_or(0);
        document.insert(field.to_string(), Value::from(current + by));
        Ok(Some(document.clone()))
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Sort;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test documents are objects"),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, title, created) in [
            ("a", "Alpha", "2024-01-01"),
            ("b", "Beta", "2024-01-03"),
            ("c", "Gamma", "2024-01-02"),
        ] {
            store
                .insert("news", doc(json!({ "id": id, "title": title, "createdAt": created })))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_find_sorts_and_windows() {
        let store = seeded().await;
        let query = QuerySpec {
            filter: Filter::new(),
            sort: Sort::descending("createdAt"),
            skip: 1,
            limit: 1,
        };

        let page = store.find("news", &query).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(document_id(&page[0]), Some("c"));
        assert_eq!(store.count("news", &Filter::new()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_and_missing_ids() {
        let store = seeded().await;
        let duplicate = store.insert("news", doc(json!({ "id": "a" }))).await;
        assert!(matches!(duplicate, Err(StoreError::Duplicate { .. })));

        let missing = store.insert("news", doc(json!({ "title": "x" }))).await;
        assert!(matches!(missing, Err(StoreError::InvalidDocument(_))));
    }

    #[tokio::test]
    async fn test_update_merges_but_keeps_id() {
        let store = seeded().await;
        let updated = store
            .update("news", "a", doc(json!({ "id": "z", "title": "Alpha 2" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["title"], "Alpha 2");
        assert_eq!(updated["createdAt"], "2024-01-01");
        assert_eq!(document_id(&updated), Some("a"));

        assert!(store.update("news", "nope", Document::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_creates_then_merges() {
        let store = MemoryStore::new();
        store
            .upsert("settings", "site", doc(json!({ "siteName": "Clinic" })))
            .await
            .unwrap();
        let merged = store
            .upsert("settings", "site", doc(json!({ "footer": { "text": "hi" } })))
            .await
            .unwrap();
        assert_eq!(merged["siteName"], "Clinic");
        assert_eq!(merged["footer"]["text"], "hi");
        assert_eq!(store.count("settings", &Filter::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bulk_operations_skip_missing_ids() {
        let store = seeded().await;
        let ids = vec!["a".to_string(), "missing".to_string(), "c".to_string()];

        let patched = store
            .update_many("news", &ids, &doc(json!({ "featured": true })))
            .await
            .unwrap();
        assert_eq!(patched, 2);

        let removed = store.delete_many("news", &ids).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count("news", &Filter::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_increment_treats_missing_as_zero() {
        let store = seeded().await;
        let any = Filter::new();
        store.increment("news", "a", &any, "views", 1).await.unwrap();
        let doc = store.increment("news", "a", &any, "views", 1).await.unwrap().unwrap();
        assert_eq!(doc["views"], 2);

        assert!(store.increment("news", "nope", &any, "views", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_requires_the_filter_to_match() {
        let store = seeded().await;
        let published = Filter::new().eq("status", "published");

        assert!(
            store
                .increment("news", "a", &published, "views", 1)
                .await
                .unwrap()
                .is_none()
        );
        let stored = store.find_by_id("news", "a").await.unwrap().unwrap();
        assert!(stored.get("views").is_none());
    }
}
