//! Store Search Tests
//!
//! End-to-end behaviour of the in-memory store:
//! - filtering follows existential semantics over multi-valued fields
//! - aggregations run over every match, not just the page
//! - paging, projection and store operations

use docquery::agg::{Agg, AggKind, AggSort, Stats};
use docquery::config::EngineConfig;
use docquery::model::{DocSort, Field, SearchRequest, SearchResult};
use docquery::query::{Query, RangeQuery};
use docquery::store::{MapBackedStore, Searchable};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn store_of(docs: Vec<Value>) -> MapBackedStore<Value> {
    MapBackedStore::with_items(EngineConfig::default(), docs).unwrap()
}

fn numbered(docs: Vec<Value>) -> Vec<Value> {
    docs.into_iter()
        .enumerate()
        .map(|(i, mut doc)| {
            doc["id"] = json!(format!("doc{:03}", i));
            doc
        })
        .collect()
}

fn counts(result: &SearchResult<Value>, key: &str) -> Vec<(Value, u64)> {
    result.aggs[key]
        .buckets
        .as_ref()
        .unwrap()
        .iter()
        .map(|b| (b.key.clone(), b.count))
        .collect()
}

// =============================================================================
// Filtering
// =============================================================================

/// A multi-valued field matches a range when any value is inside it.
#[test]
fn test_range_matches_any_value() {
    let store = store_of(numbered(vec![json!({"tags": [1, 5, 9]}), json!({"tags": [1, 2]})]));
    let request = SearchRequest::new().with_query(Query::range(RangeQuery::new("tags").gte(4)));
    let result = store.search(&request).unwrap();
    assert_eq!(result.total_items, 1);
    assert_eq!(result.items.unwrap()[0]["tags"], json!([1, 5, 9]));
}

/// Nested paths resolve through arrays of objects.
#[test]
fn test_nested_path_through_arrays() {
    let store = store_of(numbered(vec![
        json!({"lines": [{"sku": "a"}, {"sku": "b"}]}),
        json!({"lines": [{"sku": "c"}]}),
    ]));
    let request = SearchRequest::new().with_query(Query::term("lines.sku", "b"));
    assert_eq!(store.search(&request).unwrap().total_items, 1);
}

// =============================================================================
// Aggregations
// =============================================================================

/// Terms buckets plus the missing bucket account for every document.
#[test]
fn test_terms_with_missing_cover_all_documents() {
    let mut docs: Vec<Value> = (0..9)
        .map(|i| json!({"status": if i < 4 { "open" } else { "closed" }}))
        .collect();
    docs.push(json!({}));
    let store = store_of(numbered(docs));

    let request = SearchRequest::new()
        .with_limit(0)
        .with_aggs(vec![Agg::terms("status", 10).with_missing("Unknown")]);
    let result = store.search(&request).unwrap();

    let buckets = counts(&result, "status");
    assert_eq!(
        buckets,
        vec![(json!("closed"), 5), (json!("open"), 4), (json!("Unknown"), 1)]
    );
    assert_eq!(buckets.iter().map(|(_, c)| c).sum::<u64>(), 10);
    assert_eq!(result.items.unwrap().len(), 0);
}

#[test]
fn test_histogram_buckets() {
    let docs = [0.5, 1.2, 1.9, 2.5].iter().map(|v| json!({"v": v})).collect();
    let store = store_of(numbered(docs));
    let request = SearchRequest::new()
        .with_aggs(vec![Agg::histogram("v", 1.0, 0.0).with_sort(AggSort::lexical_asc())]);
    let result = store.search(&request).unwrap();
    assert_eq!(
        counts(&result, "v"),
        vec![(json!(0.0), 1), (json!(1.0), 2), (json!(2.0), 1)]
    );
}

#[test]
fn test_stats_on_no_matches() {
    let store = store_of(numbered(vec![json!({"price": 3}), json!({"price": 4})]));
    let request = SearchRequest::new()
        .with_query(Query::term("price", 100))
        .with_aggs(vec![Agg::stats("price")]);
    let result = store.search(&request).unwrap();
    let stats = result.aggs["price"].stats.as_ref().unwrap();
    assert_eq!(*stats, Stats::default());
    assert_eq!(stats.sum, 0.0);
    assert!(stats.min.is_none() && stats.max.is_none() && stats.avg.is_none());
}

/// An unimplemented aggregation fails the search with a distinct code.
#[test]
fn test_geo_agg_is_not_implemented() {
    let store = store_of(numbered(vec![json!({"loc": {"lat": 1.0, "lon": 2.0}})]));
    let agg = Agg::new(AggKind::GeoBounds {
        field: "loc".to_string(),
    });
    let err = store
        .search(&SearchRequest::new().with_aggs(vec![agg]))
        .unwrap_err();
    assert_eq!(err.code(), "AGG_NOT_IMPLEMENTED");
}

// =============================================================================
// Paging and projection
// =============================================================================

#[test]
fn test_pages_partition_sorted_matches() {
    let docs = (0..23).map(|i| json!({"n": i % 7})).collect();
    let store = store_of(numbered(docs));
    let sorts = vec![DocSort::asc("n"), DocSort::asc("id")];

    let all = store
        .search(&SearchRequest::new().with_sorts(sorts.clone()).with_limit(100))
        .unwrap()
        .items
        .unwrap();

    let mut paged = Vec::new();
    for offset in (0..23).step_by(5) {
        let request = SearchRequest::new()
            .with_sorts(sorts.clone())
            .with_offset(offset)
            .with_limit(5);
        let result = store.search(&request).unwrap();
        assert_eq!(result.total_items, 23);
        paged.extend(result.items.unwrap());
    }
    assert_eq!(paged, all);
}

#[test]
fn test_rows_follow_field_order() {
    let store = store_of(vec![json!({"id": "1", "a": 1, "b": {"c": "x"}})]);
    let request = SearchRequest::new().with_fields(vec![
        Field::named("b.c"),
        Field::named("a"),
        Field::named("missing"),
    ]);
    let result = store.search(&request).unwrap();
    assert_eq!(result.rows.unwrap(), vec![vec![json!("x"), json!(1), Value::Null]]);
    assert!(result.items.is_none());
}

// =============================================================================
// Store operations
// =============================================================================

#[test]
fn test_create_then_find() {
    let store: MapBackedStore<Value> = MapBackedStore::new(EngineConfig::default());
    let created = store.create(json!({"name": "first"})).unwrap();
    let id = created["id"].as_str().unwrap();

    assert_eq!(store.find_by_id(id), Some(created.clone()));
    assert_eq!(store.count(&Query::MatchAll).unwrap(), 1);
    assert_eq!(store.find_one(&Query::term("name", "first")).unwrap(), Some(created));
}

#[test]
fn test_upsert_batch_reports_existing() {
    let store = store_of(vec![json!({"id": "1", "v": "old"})]);
    let existing = store
        .upsert_batch(vec![json!({"id": "1", "v": "new"}), json!({"id": "2", "v": "new"})])
        .unwrap();
    assert_eq!(existing, vec![json!({"id": "1", "v": "old"})]);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_custom_id_field() {
    let config = EngineConfig {
        id_field: "key".to_string(),
        ..EngineConfig::default()
    };
    let store = MapBackedStore::with_items(config, vec![json!({"key": 7})]).unwrap();
    assert!(store.exists("7"));
    assert!(store.delete_by_id("7").is_ok());
    assert!(store.is_empty());
}
