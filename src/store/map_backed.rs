//! In-memory reference store
//!
//! Search pipeline:
//! 1. simplify and compile the query
//! 2. filter a snapshot of the documents
//! 3. sort by the request sorts
//! 4. aggregate over every match
//! 5. page by `[offset, offset + limit)`
//! 6. return whole items, or rows when fields are projected

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::Searchable;
use crate::aggregation::AggregationEngine;
use crate::config::EngineConfig;
use crate::document::{to_text, Document};
use crate::errors::SearchError;
use crate::executor::{CompositeComparator, PredicateFilter};
use crate::expr::ExprEvaluator;
use crate::model::{DocSort, Field, SearchRequest, SearchResult};
use crate::observability::ObservationScope;
use crate::query::Query;

pub struct MapBackedStore<T> {
    items: RwLock<BTreeMap<String, T>>,
    config: EngineConfig,
    engine: AggregationEngine,
    evaluator: Option<Arc<dyn ExprEvaluator>>,
}

impl<T: Document + Clone + Send + Sync> MapBackedStore<T> {
    pub fn new(config: EngineConfig) -> Self {
        let engine = AggregationEngine::new(config.default_time_zone.as_str());
        Self {
            items: RwLock::new(BTreeMap::new()),
            config,
            engine,
            evaluator: None,
        }
    }

    /// Creates a store holding `items`
    pub fn with_items(
        config: EngineConfig,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Self, SearchError> {
        let store = Self::new(config);
        store.save_batch(items)?;
        Ok(store)
    }

    /// Evaluator for computed row columns
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExprEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, T>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Id of `document` from the configured id field
    pub fn id_of(&self, document: &T) -> Result<String, SearchError> {
        document
            .resolve_single(&self.config.id_field)
            .map(|id| to_text(&id))
            .ok_or_else(|| {
                SearchError::InvalidRequest(format!(
                    "document has no '{}' field",
                    self.config.id_field
                ))
            })
    }

    /// Inserts or replaces `document`
    pub fn save(&self, document: T) -> Result<T, SearchError> {
        let id = self.id_of(&document)?;
        self.write().insert(id, document.clone());
        Ok(document)
    }

    pub fn save_batch(
        &self,
        documents: impl IntoIterator<Item = T>,
    ) -> Result<Vec<T>, SearchError> {
        let mut keyed = Vec::new();
        for document in documents {
            keyed.push((self.id_of(&document)?, document));
        }
        let mut items = self.write();
        Ok(keyed
            .into_iter()
            .map(|(id, document)| {
                items.insert(id, document.clone());
                document
            })
            .collect())
    }

    /// Inserts `document` unless its id is taken. Returns the document
    /// already stored under that id, if any, leaving it in place.
    pub fn upsert(&self, document: T) -> Result<Option<T>, SearchError> {
        let id = self.id_of(&document)?;
        let mut items = self.write();
        if let Some(existing) = items.get(&id) {
            return Ok(Some(existing.clone()));
        }
        items.insert(id, document);
        Ok(None)
    }

    /// [`MapBackedStore::upsert`] for each document; returns the documents
    /// that were already present
    pub fn upsert_batch(
        &self,
        documents: impl IntoIterator<Item = T>,
    ) -> Result<Vec<T>, SearchError> {
        let mut existing = Vec::new();
        for document in documents {
            if let Some(found) = self.upsert(document)? {
                existing.push(found);
            }
        }
        Ok(existing)
    }

    pub fn find_by_id(&self, id: &str) -> Option<T> {
        self.read().get(id).cloned()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Removes and returns the document stored under `id`
    pub fn delete_by_id(&self, id: &str) -> Result<T, SearchError> {
        self.write()
            .remove(id)
            .ok_or_else(|| SearchError::NotFound { id: id.to_string() })
    }

    /// Removes every document matching `query`; returns how many were removed
    pub fn delete_by_query(&self, query: &Query) -> Result<usize, SearchError> {
        let filter = self.compile(query, Utc::now())?;
        let mut items = self.write();
        let before = items.len();
        items.retain(|_, document| !filter.matches(&*document));
        Ok(before - items.len())
    }

    /// Every item matching `query`, sorted, up to the configured stream limit
    pub fn stream_items(
        &self,
        query: &Query,
        sorts: &[DocSort],
        params: Map<String, Value>,
    ) -> Result<impl Iterator<Item = T>, SearchError> {
        let request = self.stream_request(query, sorts, params);
        Ok(self.search(&request)?.items.unwrap_or_default().into_iter())
    }

    /// Every row of `fields` matching `query`, sorted, up to the configured
    /// stream limit
    pub fn stream_rows(
        &self,
        fields: Vec<Field>,
        query: &Query,
        sorts: &[DocSort],
        params: Map<String, Value>,
    ) -> Result<impl Iterator<Item = Vec<Value>>, SearchError> {
        let request = self
            .stream_request(query, sorts, params)
            .with_fields(fields);
        Ok(self.search(&request)?.rows.unwrap_or_default().into_iter())
    }

    fn stream_request(
        &self,
        query: &Query,
        sorts: &[DocSort],
        params: Map<String, Value>,
    ) -> SearchRequest {
        SearchRequest {
            query: Some(query.clone()),
            sorts: sorts.to_vec(),
            params,
            limit: self.config.stream_limit,
            ..SearchRequest::default()
        }
    }

    fn compile(&self, query: &Query, now: DateTime<Utc>) -> Result<PredicateFilter, SearchError> {
        Ok(PredicateFilter::compile_with(
            &query.simplify(),
            self.engine.dates(),
            now,
        )?)
    }

    fn execute(&self, request: &SearchRequest) -> Result<SearchResult<T>, SearchError> {
        let now = Utc::now();
        let filter = self.compile(&request.query_or_all(), now)?;

        let matches: Vec<T> = self
            .read()
            .values()
            .filter(|document| filter.matches(*document))
            .cloned()
            .collect();
        let matches = CompositeComparator::new(&request.sorts).sort(matches);

        let candidates: Vec<&T> = matches.iter().collect();
        let aggs = self.engine.evaluate_at(&request.aggs, &candidates, now)?;

        let offset = usize::try_from(request.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(request.limit).unwrap_or(usize::MAX);
        let total_items = matches.len() as u64;
        let page = matches.into_iter().skip(offset).take(limit);

        let mut result = SearchResult {
            aggs,
            total_items,
            fields: request.fields.clone(),
            ..SearchResult::default()
        };
        if request.fields.is_empty() {
            result.items = Some(page.collect());
        } else {
            let page: Vec<T> = page.collect();
            result.rows = Some(self.build_rows(request, &page)?);
        }
        Ok(result)
    }

    fn build_rows(
        &self,
        request: &SearchRequest,
        page: &[T],
    ) -> Result<Vec<Vec<Value>>, SearchError> {
        let has_computed = request.fields.iter().any(|field| field.expr().is_some());
        let encoded_request = match (&self.evaluator, has_computed) {
            (Some(_), true) => serde_json::to_value(request)?,
            _ => Value::Null,
        };

        let mut rows = Vec::with_capacity(page.len());
        for document in page {
            let mut row = Vec::with_capacity(request.fields.len());
            let mut field_values = Map::new();
            for field in &request.fields {
                let value = match field.name() {
                    Some(name) => {
                        let value = column_value(document, name);
                        field_values.insert(name.to_string(), value.clone());
                        value
                    }
                    None => Value::Null,
                };
                row.push(value);
            }

            if has_computed {
                for (index, field) in request.fields.iter().enumerate() {
                    let (Some(expr), Some(evaluator)) = (field.expr(), &self.evaluator) else {
                        continue;
                    };
                    let context = json!({
                        "request": encoded_request,
                        "fieldValues": field_values,
                        "scope": field.settings,
                    });
                    row[index] = evaluator.evaluate(&Value::String(expr.to_string()), &context)?;
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

/// A column holds the single value of a path, or all of them as an array
fn column_value<T: Document>(document: &T, path: &str) -> Value {
    let mut values = document.resolve(path);
    match values.len() {
        0 => Value::Null,
        1 => values.remove(0),
        _ => Value::Array(values),
    }
}

impl<T> MapBackedStore<T>
where
    T: Document + Clone + Send + Sync + Serialize + DeserializeOwned,
{
    /// Stores a new document, assigning a random id when it has none
    pub fn create(&self, document: T) -> Result<T, SearchError> {
        if self.id_of(&document).is_ok() {
            return self.save(document);
        }
        let mut encoded = serde_json::to_value(&document)?;
        let Value::Object(fields) = &mut encoded else {
            return Err(SearchError::InvalidRequest(
                "only object documents can be assigned an id".to_string(),
            ));
        };
        fields.insert(
            self.config.id_field.clone(),
            Value::String(Uuid::new_v4().to_string()),
        );
        self.save(serde_json::from_value(encoded)?)
    }
}

impl<T: Document + Clone + Send + Sync> Searchable<T> for MapBackedStore<T> {
    fn search(&self, request: &SearchRequest) -> Result<SearchResult<T>, SearchError> {
        let limit = request.limit.to_string();
        let scope = ObservationScope::with_fields("SEARCH", &[("limit", limit.as_str())]);
        match self.execute(request) {
            Ok(result) => {
                let total = result.total_items.to_string();
                scope.complete_with_fields(&[("total_items", total.as_str())]);
                Ok(result)
            }
            Err(err) => {
                scope.fail(err.code());
                Err(err)
            }
        }
    }
}
