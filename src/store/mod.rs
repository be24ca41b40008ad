//! Document stores
//!
//! [`Searchable`] is the seam every store answers searches through.
//! [`MapBackedStore`] is the in-memory reference implementation,
//! [`TransformingStore`] runs a [`TransformerChain`](crate::transform::TransformerChain)
//! around another store, and [`DeepPagingItems`] / [`DeepPagingRows`] walk
//! any store page by page with a cursor.

mod map_backed;
mod paging;
mod transforming;

use crate::errors::SearchError;
use crate::model::{SearchRequest, SearchResult};
use crate::query::Query;

pub use map_backed::MapBackedStore;
pub use paging::{DeepPagingItems, DeepPagingRows};
pub use transforming::TransformingStore;

/// Answers search requests
pub trait Searchable<T>: Send + Sync {
    fn search(&self, request: &SearchRequest) -> Result<SearchResult<T>, SearchError>;

    /// Number of documents matching `query`
    fn count(&self, query: &Query) -> Result<u64, SearchError> {
        let request = SearchRequest::new().with_query(query.clone()).with_limit(0);
        Ok(self.search(&request)?.total_items)
    }

    /// First document matching `query`
    fn find_one(&self, query: &Query) -> Result<Option<T>, SearchError> {
        let request = SearchRequest::new().with_query(query.clone()).with_limit(1);
        Ok(self
            .search(&request)?
            .items
            .and_then(|items| items.into_iter().next()))
    }
}
