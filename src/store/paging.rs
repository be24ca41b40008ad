//! Cursor-driven iteration over every match of a query
//!
//! Each page is fetched with `deepPage` set and the previous page's
//! `lastKey`, so the store never has to skip an offset. Iteration ends on
//! an empty page, once a page holds everything left, or after the first
//! error.

use std::collections::VecDeque;

use serde_json::Value;

use super::Searchable;
use crate::document::Document;
use crate::errors::SearchError;
use crate::model::{DocSort, Field, SearchRequest, SearchResult, DEEP_PAGE_PARAM, LAST_KEY_PARAM};
use crate::query::Query;
use crate::transform::{DeepPagingTransformer, Transformer};

/// Page size used when none is given
pub const DEFAULT_CHUNK_SIZE: u64 = 1000;

struct Pager<'a, S: ?Sized> {
    store: &'a S,
    paging: DeepPagingTransformer,
    template: SearchRequest,
    chunk_size: u64,
    last_key: Option<Value>,
    more: bool,
}

impl<'a, S: ?Sized> Pager<'a, S> {
    fn new(store: &'a S, id_field: &str, query: Query) -> Self {
        Self {
            store,
            paging: DeepPagingTransformer::new(id_field),
            template: SearchRequest::new().with_query(query),
            chunk_size: DEFAULT_CHUNK_SIZE,
            last_key: None,
            more: true,
        }
    }

    fn page_request(&self) -> SearchRequest {
        let mut request = self
            .template
            .clone()
            .with_offset(0)
            .with_limit(self.chunk_size)
            .with_param(DEEP_PAGE_PARAM, Value::Bool(true));
        if let Some(last_key) = &self.last_key {
            request = request.with_param(LAST_KEY_PARAM, last_key.clone());
        }
        request
    }

    fn next_page<T>(&mut self) -> Option<Result<SearchResult<T>, SearchError>>
    where
        T: Document,
        S: Searchable<T>,
    {
        if !self.more {
            return None;
        }
        let page = self.fetch();
        match &page {
            Ok(result) => {
                let page_len = result.page_len() as u64;
                self.last_key = result.headers.get(LAST_KEY_PARAM).cloned();
                self.more =
                    page_len > 0 && page_len < result.total_items && self.last_key.is_some();
            }
            Err(_) => self.more = false,
        }
        Some(page)
    }

    fn fetch<T>(&self) -> Result<SearchResult<T>, SearchError>
    where
        T: Document,
        S: Searchable<T>,
    {
        let request = self.page_request();
        let transformed = Transformer::<T>::transform_request(&self.paging, request.clone())?;
        let result = self.store.search(&transformed)?;
        self.paging.transform_result(&request, result)
    }

    fn count<T>(&self) -> Result<u64, SearchError>
    where
        S: Searchable<T>,
    {
        self.store.count(&self.template.query_or_all())
    }
}

/// Every item matching a query, fetched in cursor-paged chunks
pub struct DeepPagingItems<'a, T, S: ?Sized> {
    pager: Pager<'a, S>,
    buffer: VecDeque<T>,
}

impl<'a, T, S> DeepPagingItems<'a, T, S>
where
    T: Document,
    S: Searchable<T> + ?Sized,
{
    /// Pages through `store`, breaking sort ties on `id_field`
    pub fn new(store: &'a S, id_field: &str, query: Query) -> Self {
        Self {
            pager: Pager::new(store, id_field, query),
            buffer: VecDeque::new(),
        }
    }

    pub fn with_sorts(mut self, sorts: Vec<DocSort>) -> Self {
        self.pager.template.sorts = sorts;
        self
    }

    /// Items fetched per search; at least one
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.pager.chunk_size = chunk_size.max(1);
        self
    }

    /// Number of matching items, without fetching them
    pub fn total(&self) -> Result<u64, SearchError> {
        self.pager.count::<T>()
    }
}

impl<T, S> Iterator for DeepPagingItems<'_, T, S>
where
    T: Document,
    S: Searchable<T> + ?Sized,
{
    type Item = Result<T, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            match self.pager.next_page::<T>()? {
                Ok(page) => self.buffer.extend(page.items.unwrap_or_default()),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Every row of a projection over a query, fetched in cursor-paged chunks.
///
/// Rows hold exactly the requested fields; columns added for the cursor are
/// dropped.
pub struct DeepPagingRows<'a, T, S: ?Sized> {
    pager: Pager<'a, S>,
    buffer: VecDeque<Vec<Value>>,
    width: usize,
    _item: std::marker::PhantomData<fn() -> T>,
}

impl<'a, T, S> DeepPagingRows<'a, T, S>
where
    T: Document,
    S: Searchable<T> + ?Sized,
{
    pub fn new(store: &'a S, id_field: &str, fields: Vec<Field>, query: Query) -> Self {
        let width = fields.len();
        let mut pager = Pager::new(store, id_field, query);
        pager.template.fields = fields;
        Self {
            pager,
            buffer: VecDeque::new(),
            width,
            _item: std::marker::PhantomData,
        }
    }

    pub fn with_sorts(mut self, sorts: Vec<DocSort>) -> Self {
        self.pager.template.sorts = sorts;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.pager.chunk_size = chunk_size.max(1);
        self
    }

    pub fn total(&self) -> Result<u64, SearchError> {
        self.pager.count::<T>()
    }
}

impl<T, S> Iterator for DeepPagingRows<'_, T, S>
where
    T: Document,
    S: Searchable<T> + ?Sized,
{
    type Item = Result<Vec<Value>, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(mut row) = self.buffer.pop_front() {
                row.truncate(self.width);
                return Some(Ok(row));
            }
            match self.pager.next_page::<T>()? {
                Ok(page) => self.buffer.extend(page.rows.unwrap_or_default()),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::store::MapBackedStore;
    use serde_json::json;

    fn store() -> MapBackedStore<Value> {
        let docs = (0..25).map(|i| json!({"id": format!("d{:02}", i), "group": i % 3}));
        MapBackedStore::with_items(EngineConfig::default(), docs).unwrap()
    }

    #[test]
    fn test_items_visit_every_match_once() {
        let store = store();
        let pager = DeepPagingItems::<Value, _>::new(&store, "id", Query::MatchAll)
            .with_sorts(vec![DocSort::desc("group")])
            .with_chunk_size(4);
        assert_eq!(pager.total().unwrap(), 25);
        let items: Vec<Value> = pager.collect::<Result<_, _>>().unwrap();
        assert_eq!(items.len(), 25);

        let keys: Vec<(i64, String)> = items
            .iter()
            .map(|item| {
                (
                    item["group"].as_i64().unwrap(),
                    item["id"].as_str().unwrap().to_string(),
                )
            })
            .collect();
        let mut expected = keys.clone();
        expected.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_rows_drop_cursor_columns() {
        let store = store();
        let pager = DeepPagingRows::<Value, _>::new(
            &store,
            "id",
            vec![Field::named("group")],
            Query::term("group", 1),
        )
        .with_chunk_size(3);
        assert_eq!(pager.total().unwrap(), 8);
        let rows: Vec<Vec<Value>> = pager.collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(|row| row == &vec![json!(1)]));
    }

    #[test]
    fn test_error_ends_iteration() {
        let store = store();
        let mut pager: DeepPagingItems<'_, Value, _> =
            DeepPagingItems::new(&store, "id", Query::named("unknown", None));
        assert!(matches!(pager.next(), Some(Err(_))));
        assert!(pager.next().is_none());
    }
}
