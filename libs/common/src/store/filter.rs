//! Filter, sort and pagination values understood by every document store

use std::cmp::Ordering;

use serde_json::Value;

use super::Document;

/// A single constraint on a document
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `field` equals `value` exactly
    Eq { field: String, value: Value },
    /// At least one of `fields` equals `value`
    AnyEq { fields: Vec<String>, value: Value },
    /// Case-insensitive substring match of `term` in any of `fields`
    Search { fields: Vec<String>, term: String },
}

impl Condition {
    /// Evaluate the condition against an in-memory document
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Condition::Eq { field, value } => document.get(field) == Some(value),
            Condition::AnyEq { fields, value } => {
                fields.iter().any(|field| document.get(field) == Some(value))
            }
            Condition::Search { fields, term } => {
                let needle = term.to_lowercase();
                fields.iter().any(|field| {
                    document
                        .get(field)
                        .and_then(Value::as_str)
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                })
            }
        }
    }
}

/// Conjunction of conditions. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add an equality constraint
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::Eq {
            field: field.into(),
            value: value.into(),
        })
    }

    /// Add a search constraint over `fields`
    pub fn search(self, fields: &[&str], term: impl Into<String>) -> Self {
        self.and(Condition::Search {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            term: term.into(),
        })
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|c| c.matches(document))
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort on a single document field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parse `field` or `-field` (descending)
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(field) => Self::descending(field),
            None => Self::ascending(raw),
        }
    }

    /// Order two documents. Missing fields sort after present ones in
    /// ascending order, as Postgres does with NULLs.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = match (a.get(&self.field), b.get(&self.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => compare_values(x, y),
        };

        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

// jsonb ordering: null < string < number < boolean < array < object
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Request-scoped query: what to match, how to order it and which window
/// to return
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub filter: Filter,
    pub sort: Sort,
    pub skip: u64,
    pub limit: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test documents are objects"),
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::new().matches(&doc(json!({ "title": "x" }))));
        assert!(Filter::new().is_empty());
    }

    #[test]
    fn test_eq_and_search_are_combined_with_and() {
        let filter = Filter::new()
            .eq("status", "published")
            .search(&["title", "excerpt"], "Clinic");

        assert!(filter.matches(&doc(json!({
            "status": "published",
            "title": "New clinic opens"
        }))));
        assert!(filter.matches(&doc(json!({
            "status": "published",
            "title": "Open day",
            "excerpt": "Visit the CLINIC"
        }))));
        assert!(!filter.matches(&doc(json!({
            "status": "draft",
            "title": "New clinic opens"
        }))));
        assert!(!filter.matches(&doc(json!({
            "status": "published",
            "title": "Fundraiser"
        }))));
    }

    #[test]
    fn test_eq_is_type_sensitive() {
        let filter = Filter::new().eq("featured", true);
        assert!(filter.matches(&doc(json!({ "featured": true }))));
        assert!(!filter.matches(&doc(json!({ "featured": "true" }))));
        assert!(!filter.matches(&doc(json!({}))));
    }

    #[test]
    fn test_any_eq_matches_either_field() {
        let filter = Filter::new().and(Condition::AnyEq {
            fields: vec!["slug".into(), "id".into()],
            value: json!("abc"),
        });
        assert!(filter.matches(&doc(json!({ "slug": "abc", "id": "1" }))));
        assert!(filter.matches(&doc(json!({ "slug": "other", "id": "abc" }))));
        assert!(!filter.matches(&doc(json!({ "slug": "other", "id": "1" }))));
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!(Sort::parse("-createdAt"), Sort::descending("createdAt"));
        assert_eq!(Sort::parse("order"), Sort::ascending("order"));
    }

    #[test]
    fn test_sort_compare_places_missing_last_when_ascending() {
        let sort = Sort::ascending("order");
        let mut docs = vec![
            doc(json!({ "id": "c" })),
            doc(json!({ "id": "b", "order": 2 })),
            doc(json!({ "id": "a", "order": 1 })),
        ];
        docs.sort_by(|a, b| sort.compare(a, b));
        let ids: Vec<_> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["a", "b", "c"]);

        let sort = Sort::descending("order");
        docs.sort_by(|a, b| sort.compare(a, b));
        let ids: Vec<_> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
    }
}
