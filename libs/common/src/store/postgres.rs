//! PostgreSQL-backed document store
//!
//! Every collection shares the `documents` table created by
//! [`crate::database::migrate`]; documents live in a JSONB column. Field
//! names coming from a [`Filter`] or [`Sort`] are always bound as
//! parameters, never interpolated into the SQL text.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};
use tracing::info;

use super::{Condition, Document, DocumentStore, Filter, ID_FIELD, QuerySpec, SortDirection, document_id};
use crate::error::{StoreError, StoreResult};

/// Document store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Create a new store on top of an initialized pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn push_conditions(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    for condition in filter.conditions() {
        builder.push(" AND ");
        match condition {
            Condition::Eq { field, value } => {
                builder.push("doc -> ");
                builder.push_bind(field.clone());
                builder.push(" = ");
                builder.push_bind(Json(value.clone()));
            }
            Condition::AnyEq { fields, value } => {
                if fields.is_empty() {
                    builder.push("FALSE");
                    continue;
                }
                builder.push("(");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        builder.push(" OR ");
                    }
                    builder.push("doc -> ");
                    builder.push_bind(field.clone());
                    builder.push(" = ");
                    builder.push_bind(Json(value.clone()));
                }
                builder.push(")");
            }
            Condition::Search { fields, term } => {
                if fields.is_empty() {
                    builder.push("FALSE");
                    continue;
                }
                let pattern = format!("%{}%", escape_like(term));
                builder.push("(");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        builder.push(" OR ");
                    }
                    builder.push("doc ->> ");
                    builder.push_bind(field.clone());
                    builder.push(" ILIKE ");
                    builder.push_bind(pattern.clone());
                }
                builder.push(")");
            }
        }
    }
}

fn window_bound(name: &str, value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::InvalidQuery(format!("{} out of range", name)))
}

fn duplicate_or(err: sqlx::Error, collection: &str, id: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate {
                collection: collection.to_string(),
                key: id.to_string(),
            };
        }
    }
    err.into()
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(&self, collection: &str, query: &QuerySpec) -> StoreResult<Vec<Document>> {
        let mut builder = QueryBuilder::new("SELECT doc FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());
        push_conditions(&mut builder, &query.filter);

        builder.push(" ORDER BY doc -> ");
        builder.push_bind(query.sort.field.clone());
        builder.push(match query.sort.direction {
            SortDirection::Ascending => " ASC",
            SortDirection::Descending => " DESC",
        });
        builder.push(", id ASC LIMIT ");
        builder.push_bind(window_bound("limit", query.limit)?);
        builder.push(" OFFSET ");
        builder.push_bind(window_bound("offset", query.skip)?);

        let rows = builder
            .build_query_scalar::<Json<Document>>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|Json(doc)| doc).collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());
        push_conditions(&mut builder, filter);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let mut builder = QueryBuilder::new("SELECT doc FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());
        push_conditions(&mut builder, filter);
        builder.push(" ORDER BY created_at ASC LIMIT 1");

        let row = builder
            .build_query_scalar::<Json<Document>>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let row: Option<Json<Document>> =
            sqlx::query_scalar("SELECT doc FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<Document> {
        let id = document_id(&document)
            .ok_or_else(|| StoreError::InvalidDocument("document has no id".to_string()))?
            .to_string();

        let Json(stored): Json<Document> = sqlx::query_scalar(
            r#"
            INSERT INTO documents (collection, id, doc)
            VALUES ($1, $2, $3)
            RETURNING doc
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(&document))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, collection, &id))?;

        Ok(stored)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> StoreResult<Option<Document>> {
        let row: Option<Json<Document>> = sqlx::query_scalar(
            r#"
            UPDATE documents
            SET doc = doc || ($3::jsonb - $4)
            WHERE collection = $1 AND id = $2
            RETURNING doc
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&patch))
        .bind(ID_FIELD)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, collection, id))?;

        Ok(row.map(|Json(doc)| doc))
    }

    async fn upsert(&self, collection: &str, id: &str, patch: Document) -> StoreResult<Document> {
        let mut document = patch;
        document.insert(ID_FIELD.to_string(), id.into());

        let Json(stored): Json<Document> = sqlx::query_scalar(
            r#"
            INSERT INTO documents (collection, id, doc)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET
            doc = documents.doc || EXCLUDED.doc
            RETURNING doc
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&document))
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_many(
        &self,
        collection: &str,
        ids: &[String],
        patch: &Document,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET doc = doc || ($3::jsonb - $4)
            WHERE collection = $1 AND id = ANY($2)
            "#,
        )
        .bind(collection)
        .bind(ids)
        .bind(Json(patch))
        .bind(ID_FIELD)
        .execute(&self.pool)
        .await?;

        info!(
            "Bulk update on {} touched {} of {} documents",
            collection,
            result.rows_affected(),
            ids.len()
        );
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = ANY($2)")
            .bind(collection)
            .bind(ids)
            .execute(&self.pool)
            .await?;

        info!(
            "Bulk delete on {} removed {} of {} documents",
            collection,
            result.rows_affected(),
            ids.len()
        );
        Ok(result.rows_affected())
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        filter: &Filter,
        field: &str,
        by: i64,
    ) -> StoreResult<Option<Document>> {
        let mut builder = QueryBuilder::new("UPDATE documents SET doc = jsonb_set(doc, ARRAY[");
        builder.push_bind(field.to_string());
        builder.push("], to_jsonb(COALESCE((doc ->> ");
        builder.push_bind(field.to_string());
        builder.push(")::bigint, 0) + ");
        builder.push_bind(by);
        builder.push(")) WHERE collection = ");
        builder.push_bind(collection.to_string());
        builder.push(" AND id = ");
        builder.push_bind(id.to_string());
        push_conditions(&mut builder, filter);
        builder.push(" RETURNING doc");

        let row = builder
            .build_query_scalar::<Json<Document>>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|Json(doc)| doc))
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(crate::database::health_check(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("clinic"), "clinic");
    }

    #[test]
    fn test_window_bounds_fit_a_bigint() {
        assert_eq!(window_bound("offset", 40).unwrap(), 40);
        assert_eq!(window_bound("offset", i64::MAX as u64).unwrap(), i64::MAX);
        assert!(matches!(
            window_bound("offset", u64::MAX),
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_conditions_bind_field_names() {
        let filter = Filter::new()
            .eq("status", "published")
            .search(&["title", "content"], "care");
        let mut builder = QueryBuilder::<Postgres>::new("SELECT doc FROM documents WHERE collection = ");
        builder.push_bind("news".to_string());
        push_conditions(&mut builder, &filter);

        assert_eq!(
            builder.sql(),
            "SELECT doc FROM documents WHERE collection = $1 AND doc -> $2 = $3 \
             AND (doc ->> $4 ILIKE $5 OR doc ->> $6 ILIKE $7)"
        );
    }
}
