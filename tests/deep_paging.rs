//! Deep Paging Tests
//!
//! Cursor paging over the in-memory store:
//! - every document is visited exactly once, in sort order
//! - chunk sizes that do not divide the total are handled
//! - documents without a sort value keep their place in the order

use docquery::config::EngineConfig;
use docquery::executor::CompositeComparator;
use docquery::model::{DocSort, Field, SearchRequest, DEEP_PAGE_PARAM, LAST_KEY_PARAM};
use docquery::query::Query;
use docquery::store::{DeepPagingItems, DeepPagingRows, MapBackedStore, Searchable};
use serde_json::{json, Value};
use std::collections::HashSet;

// =============================================================================
// Helper Functions
// =============================================================================

/// 1000 documents with heavily repeated scores; every 97th has none
fn store() -> MapBackedStore<Value> {
    let docs = (0..1000).map(|i| {
        if i % 97 == 0 {
            json!({"id": format!("d{:04}", i)})
        } else {
            json!({"id": format!("d{:04}", i), "score": (i * 37) % 50})
        }
    });
    MapBackedStore::with_items(EngineConfig::default(), docs).unwrap()
}

fn sorts() -> Vec<DocSort> {
    vec![DocSort::desc("score"), DocSort::asc("id")]
}

fn expected_ids(store: &MapBackedStore<Value>) -> Vec<String> {
    let all: Vec<Value> = store
        .stream_items(&Query::MatchAll, &[], Default::default())
        .unwrap()
        .collect();
    CompositeComparator::new(&sorts())
        .sort(all)
        .iter()
        .map(|doc| doc["id"].as_str().unwrap().to_string())
        .collect()
}

fn paged_ids(store: &MapBackedStore<Value>, chunk_size: u64) -> Vec<String> {
    DeepPagingItems::<Value, _>::new(store, "id", Query::MatchAll)
        .with_sorts(sorts())
        .with_chunk_size(chunk_size)
        .map(|item| item.unwrap()["id"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_chunks_of_100_visit_everything_in_order() {
    let store = store();
    let ids = paged_ids(&store, 100);
    assert_eq!(ids.len(), 1000);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 1000);
    assert_eq!(ids, expected_ids(&store));
}

#[test]
fn test_uneven_chunks_visit_everything_in_order() {
    let store = store();
    assert_eq!(paged_ids(&store, 7), expected_ids(&store));
    assert_eq!(paged_ids(&store, 333), expected_ids(&store));
}

#[test]
fn test_filtered_rows() {
    let store = store();
    let rows: Vec<Vec<Value>> = DeepPagingRows::<Value, _>::new(
        &store,
        "id",
        vec![Field::named("score")],
        Query::term("score", 11),
    )
    .with_sorts(vec![DocSort::desc("score")])
    .with_chunk_size(6)
    .collect::<Result<_, _>>()
    .unwrap();

    let expected = store.count(&Query::term("score", 11)).unwrap();
    assert_eq!(rows.len() as u64, expected);
    assert!(rows.iter().all(|row| row == &vec![json!(11)]));
}

/// The cursor protocol driven by hand against the plain store request API.
#[test]
fn test_manual_cursor_protocol() {
    use docquery::transform::{DeepPagingTransformer, Transformer};

    let store = store();
    let paging = DeepPagingTransformer::new("id");
    let mut last_key = Value::Null;
    let mut seen = Vec::new();
    loop {
        let request = SearchRequest::new()
            .with_sorts(sorts())
            .with_limit(250)
            .with_param(DEEP_PAGE_PARAM, json!(true))
            .with_param(LAST_KEY_PARAM, last_key.clone());
        let rewritten = Transformer::<Value>::transform_request(&paging, request.clone()).unwrap();
        let result = store.search(&rewritten).unwrap();
        let result = paging.transform_result(&request, result).unwrap();

        let items = result.items.unwrap();
        if items.is_empty() {
            break;
        }
        seen.extend(items.iter().map(|doc| doc["id"].as_str().unwrap().to_string()));
        last_key = result.headers[LAST_KEY_PARAM].clone();
    }
    assert_eq!(seen, expected_ids(&store));
}
