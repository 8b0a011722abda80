//! Document store abstraction
//!
//! Site content lives in named collections of JSON documents. Each document
//! carries its own string `id`; every other field is opaque to the store
//! except where a [`Filter`] or [`Sort`] names it.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreResult;

pub mod filter;
pub mod memory;
pub mod postgres;

pub use filter::{Condition, Filter, QuerySpec, Sort, SortDirection};
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// A stored document
pub type Document = Map<String, Value>;

/// Name of the identifier field present in every document
pub const ID_FIELD: &str = "id";

/// Read the identifier of a document
pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

/// Operations the gateway needs from a document database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return the window of matching documents described by `query`
    async fn find(&self, collection: &str, query: &QuerySpec) -> StoreResult<Vec<Document>>;

    /// Count the documents matching `filter`
    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Return the first document matching `filter`
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.find_one(collection, &Filter::new().eq(ID_FIELD, id))
            .await
    }

    /// Insert a document that already carries an `id`
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<Document>;

    /// Merge `patch` into the top level of an existing document
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> StoreResult<Option<Document>>;

    /// Merge `patch` into the document, creating it when absent
    async fn upsert(&self, collection: &str, id: &str, patch: Document) -> StoreResult<Document>;

    /// Delete a document, returning whether it existed
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Merge `patch` into every listed document that exists
    async fn update_many(&self, collection: &str, ids: &[String], patch: &Document)
    -> StoreResult<u64>;

    /// Delete every listed document that exists
    async fn delete_many(&self, collection: &str, ids: &[String]) -> StoreResult<u64>;

    /// Atomically add `by` to a numeric field (missing counts as zero) of
    /// the document with `id`, provided it still matches `filter`
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        filter: &Filter,
        field: &str,
        by: i64,
    ) -> StoreResult<Option<Document>>;

    async fn health_check(&self) -> StoreResult<bool>;
}
