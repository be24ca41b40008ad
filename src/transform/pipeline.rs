//! Request/result transformers and their composition

use crate::errors::SearchError;
use crate::model::{SearchRequest, SearchResult};
use crate::query::Query;

/// A rewrite around one search.
///
/// `transform_request` runs before the search, `transform_result` after it
/// with the request this stage received (not the one it produced).
pub trait Transformer<T>: Send + Sync {
    fn transform_request(&self, request: SearchRequest) -> Result<SearchRequest, SearchError> {
        let query = request.query.as_ref().map(|query| self.transform_query(query));
        Ok(SearchRequest { query, ..request })
    }

    fn transform_result(
        &self,
        _request: &SearchRequest,
        result: SearchResult<T>,
    ) -> Result<SearchResult<T>, SearchError> {
        Ok(result.map_items(|item| self.transform_item(item)))
    }

    fn transform_query(&self, query: &Query) -> Query {
        query.clone()
    }

    fn transform_item(&self, item: T) -> T {
        item
    }
}

/// Ordered stages: requests flow first to last, results last to first
pub struct TransformerChain<T> {
    stages: Vec<Box<dyn Transformer<T>>>,
}

impl<T> Default for TransformerChain<T> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<T> TransformerChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage
    pub fn with(mut self, stage: impl Transformer<T> + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn push(&mut self, stage: Box<dyn Transformer<T>>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Rewrites `request` through every stage, runs `execute` on the final
    /// request and rewrites its result back through the stages in reverse.
    pub fn apply<F>(&self, request: &SearchRequest, execute: F) -> Result<SearchResult<T>, SearchError>
    where
        F: FnOnce(&SearchRequest) -> Result<SearchResult<T>, SearchError>,
    {
        let mut inputs = Vec::with_capacity(self.stages.len());
        let mut current = request.clone();
        for stage in &self.stages {
            let next = stage.transform_request(current.clone())?;
            inputs.push(current);
            current = next;
        }

        let mut result = execute(&current)?;
        for (stage, input) in self.stages.iter().zip(inputs).rev() {
            result = stage.transform_result(&input, result)?;
        }
        Ok(result)
    }

    /// Rewrites a bare query through every stage
    pub fn transform_query(&self, query: &Query) -> Query {
        self.stages
            .iter()
            .fold(query.clone(), |query, stage| stage.transform_query(&query))
    }

    /// Rewrites one item back through every stage
    pub fn transform_item(&self, item: T) -> T {
        self.stages
            .iter()
            .rev()
            .fold(item, |item, stage| stage.transform_item(item))
    }
}
