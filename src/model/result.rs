//! Search result envelope and merging of partial results

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::request::Field;
use crate::agg::AggResult;

/// Answer to a [`SearchRequest`](super::SearchRequest).
///
/// Exactly one of `items` and `rows` is set: `rows` when the request
/// projected fields, `items` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T> {
    #[serde(default)]
    pub aggs: IndexMap<String, AggResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<T>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl<T> Default for SearchResult<T> {
    fn default() -> Self {
        Self {
            aggs: IndexMap::new(),
            items: None,
            rows: None,
            total_items: 0,
            headers: Map::new(),
            fields: Vec::new(),
        }
    }
}

impl<T> SearchResult<T> {
    /// Number of items or rows on this page
    pub fn page_len(&self) -> usize {
        match (&self.items, &self.rows) {
            (Some(items), _) => items.len(),
            (None, Some(rows)) => rows.len(),
            (None, None) => 0,
        }
    }

    /// Applies `f` to every item, keeping everything else
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> SearchResult<U> {
        SearchResult {
            aggs: self.aggs,
            items: self.items.map(|items| items.into_iter().map(f).collect()),
            rows: self.rows,
            total_items: self.total_items,
            headers: self.headers,
            fields: self.fields,
        }
    }
}

impl<T: Serialize> SearchResult<T> {
    /// Merges partial results answering the same logical request.
    ///
    /// Items or rows are concatenated in order with duplicates removed. The
    /// first partial result carrying either decides which kind is kept; the
    /// other kind is skipped.
    /// Aggregations, headers and fields keep the first occurrence.
    /// `total_items` is the size of the merged page set; when no partial
    /// result carries items or rows it is the largest reported total.
    pub fn combine(results: Vec<SearchResult<T>>) -> Result<SearchResult<T>, serde_json::Error> {
        let mut merged = SearchResult::default();
        let mut seen_items = HashSet::new();
        let mut seen_rows = HashSet::new();
        let mut largest_total = 0;

        for result in results {
            largest_total = largest_total.max(result.total_items);

            if let Some(items) = result.items.filter(|_| merged.rows.is_none()) {
                let target = merged.items.get_or_insert_with(Vec::new);
                for item in items {
                    if seen_items.insert(serde_json::to_string(&item)?) {
                        target.push(item);
                    }
                }
            }
            if let Some(rows) = result.rows.filter(|_| merged.items.is_none()) {
                let target = merged.rows.get_or_insert_with(Vec::new);
                for row in rows {
                    if seen_rows.insert(serde_json::to_string(&row)?) {
                        target.push(row);
                    }
                }
            }
            for (key, agg) in result.aggs {
                merged.aggs.entry(key).or_insert(agg);
            }
            for (name, value) in result.headers {
                merged.headers.entry(name).or_insert(value);
            }
            if merged.fields.is_empty() {
                merged.fields = result.fields;
            }
        }

        merged.total_items = if merged.items.is_some() || merged.rows.is_some() {
            (seen_items.len() + seen_rows.len()) as u64
        } else {
            largest_total
        };
        Ok(merged)
    }
}
