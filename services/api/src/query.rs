//! Translation of list-request query parameters into a [`QuerySpec`]
//!
//! Numeric parameters are parsed with explicit fallbacks: anything that is
//! not a positive integer falls back to the default, `limit` is clamped
//! to [`MAX_LIMIT`] and `page` to the last page whose offset stays within
//! [`MAX_SKIP`].

use std::collections::HashMap;

use common::store::{Filter, QuerySpec, Sort};

use crate::{
    error::{ApiError, ApiResult},
    resources::{FilterKind, ResourceSpec},
};

/// Upper bound on `limit`
pub const MAX_LIMIT: u64 = 100;

/// Largest offset a store is asked to skip (a signed 64-bit SQL `OFFSET`)
pub const MAX_SKIP: u64 = i64::MAX as u64;

/// Raw query-string parameters
pub type QueryParams = HashMap<String, String>;

/// Parse a positive integer, falling back to `default` and clamping to `max`
pub fn parse_bounded(raw: Option<&str>, default: u64, max: u64) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|v| *v >= 1)
        .map(|v| v.min(max))
        .unwrap_or(default)
}

fn param<'a>(params: &'a QueryParams, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_flag(name: &str, raw: &str) -> ApiResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ApiError::Validation(format!(
            "Invalid value for {}: expected true or false",
            name
        ))),
    }
}

/// A list query ready to run, with the page it was built for
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: u64,
    pub spec: QuerySpec,
}

/// Build the query for a list request on `resource`. `base` holds
/// constraints the caller cannot lift, such as public visibility.
pub fn build_list_query(
    resource: &ResourceSpec,
    params: &QueryParams,
    base: Filter,
) -> ApiResult<ListQuery> {
    let limit = parse_bounded(param(params, "limit"), resource.default_limit, MAX_LIMIT);
    let page = parse_bounded(param(params, "page"), 1, MAX_SKIP / limit + 1);

    let mut filter = base;
    for field in resource.filters {
        let Some(raw) = param(params, field.param) else {
            continue;
        };
        filter = match field.kind {
            FilterKind::Text => filter.eq(field.field, raw),
            FilterKind::Bool => filter.eq(field.field, parse_flag(field.param, raw)?),
        };
    }

    if let Some(term) = param(params, "search") {
        filter = filter.search(resource.search_fields, term);
    }

    let sort = match param(params, "sort") {
        Some(raw) => {
            let sort = Sort::parse(raw);
            if !resource.sortable.contains(&sort.field.as_str()) {
                return Err(ApiError::Validation(format!(
                    "Cannot sort {} by {}",
                    resource.name, sort.field
                )));
            }
            sort
        }
        None => Sort::parse(resource.default_sort),
    };

    Ok(ListQuery {
        page,
        spec: QuerySpec {
            filter,
            sort,
            skip: (page - 1) * limit,
            limit,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{GALLERY, NEWS, SUPPORTERS};
    use common::store::{Condition, SortDirection};
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_bounded() {
        assert_eq!(parse_bounded(None, 10, 100), 10);
        assert_eq!(parse_bounded(Some("3"), 10, 100), 3);
        assert_eq!(parse_bounded(Some(" 7 "), 10, 100), 7);
        assert_eq!(parse_bounded(Some("abc"), 10, 100), 10);
        assert_eq!(parse_bounded(Some("NaN"), 10, 100), 10);
        assert_eq!(parse_bounded(Some("0"), 10, 100), 10);
        assert_eq!(parse_bounded(Some("-4"), 10, 100), 10);
        assert_eq!(parse_bounded(Some("2.5"), 10, 100), 10);
        assert_eq!(parse_bounded(Some("5000"), 10, 100), 100);
    }

    #[test]
    fn test_defaults() {
        let query = build_list_query(&GALLERY, &QueryParams::new(), Filter::new()).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.spec.limit, 12);
        assert_eq!(query.spec.skip, 0);
        assert!(query.spec.filter.is_empty());
        assert_eq!(query.spec.sort, Sort::descending("createdAt"));

        let query = build_list_query(&SUPPORTERS, &QueryParams::new(), Filter::new()).unwrap();
        assert_eq!(query.spec.limit, 20);
        assert_eq!(query.spec.sort.direction, SortDirection::Ascending);
    }

    #[test]
    fn test_skip_is_page_minus_one_times_limit() {
        for (page, limit) in [(1u64, 1u64), (2, 10), (3, 12), (7, 100)] {
            let (page_raw, limit_raw) = (page.to_string(), limit.to_string());
            let query = build_list_query(
                &NEWS,
                &params(&[("page", page_raw.as_str()), ("limit", limit_raw.as_str())]),
                Filter::new(),
            )
            .unwrap();
            assert_eq!(query.spec.skip, (page - 1) * limit);
            assert_eq!(query.spec.limit, limit);
        }
    }

    #[test]
    fn test_huge_pages_keep_the_offset_in_range() {
        let query =
            build_list_query(&NEWS, &params(&[("page", "18446744073709551615")]), Filter::new())
                .unwrap();
        assert_eq!(query.page, MAX_SKIP / 10 + 1);
        assert_eq!(query.spec.skip, (query.page - 1) * 10);
        assert!(query.spec.skip <= MAX_SKIP);

        let query = build_list_query(
            &NEWS,
            &params(&[("page", "100000000000000000"), ("limit", "100")]),
            Filter::new(),
        )
        .unwrap();
        assert_eq!(query.page, MAX_SKIP / 100 + 1);
        assert!(i64::try_from(query.spec.skip).is_ok());
        assert_eq!(query.spec.skip, (query.page - 1) * 100);
    }

    #[test]
    fn test_non_numeric_paging_falls_back() {
        let query = build_list_query(
            &NEWS,
            &params(&[("page", "two"), ("limit", "lots")]),
            Filter::new(),
        )
        .unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.spec.limit, 10);
        assert_eq!(query.spec.skip, 0);
    }

    #[test]
    fn test_present_filters_and_search_are_folded_in() {
        let query = build_list_query(
            &NEWS,
            &params(&[
                ("status", "draft"),
                ("featured", "true"),
                ("category", ""),
                ("search", "  vaccine "),
            ]),
            Filter::new(),
        )
        .unwrap();

        assert_eq!(
            query.spec.filter.conditions(),
            &[
                Condition::Eq {
                    field: "status".into(),
                    value: json!("draft")
                },
                Condition::Eq {
                    field: "featured".into(),
                    value: json!(true)
                },
                Condition::Search {
                    fields: vec!["title".into(), "excerpt".into(), "content".into()],
                    term: "vaccine".into()
                },
            ]
        );
    }

    #[test]
    fn test_base_filter_is_kept() {
        let base = Filter::new().eq("status", "published");
        let query =
            build_list_query(&NEWS, &params(&[("status", "draft")]), base).unwrap();
        assert_eq!(query.spec.filter.conditions().len(), 2);
        assert!(!query.spec.filter.matches(
            json!({ "status": "draft" }).as_object().unwrap()
        ));
    }

    #[test]
    fn test_bad_flag_is_rejected() {
        let result = build_list_query(&GALLERY, &params(&[("featured", "maybe")]), Filter::new());
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_sort_whitelist() {
        let query =
            build_list_query(&NEWS, &params(&[("sort", "-views")]), Filter::new()).unwrap();
        assert_eq!(query.spec.sort, Sort::descending("views"));

        let result = build_list_query(
            &NEWS,
            &params(&[("sort", "doc; DROP TABLE")]),
            Filter::new(),
        );
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }
}
