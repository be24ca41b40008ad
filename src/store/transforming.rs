use std::marker::PhantomData;

use super::Searchable;
use crate::errors::SearchError;
use crate::model::{SearchRequest, SearchResult};
use crate::query::Query;
use crate::transform::TransformerChain;

/// A store whose requests and results pass through a [`TransformerChain`]
pub struct TransformingStore<T, S> {
    chain: TransformerChain<T>,
    inner: S,
    _item: PhantomData<fn() -> T>,
}

impl<T, S: Searchable<T>> TransformingStore<T, S> {
    pub fn new(chain: TransformerChain<T>, inner: S) -> Self {
        Self {
            chain,
            inner,
            _item: PhantomData,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn chain(&self) -> &TransformerChain<T> {
        &self.chain
    }
}

impl<T, S: Searchable<T>> Searchable<T> for TransformingStore<T, S> {
    fn search(&self, request: &SearchRequest) -> Result<SearchResult<T>, SearchError> {
        self.chain
            .apply(request, |request| self.inner.search(request))
    }

    fn count(&self, query: &Query) -> Result<u64, SearchError> {
        self.inner.count(&self.chain.transform_query(query))
    }

    fn find_one(&self, query: &Query) -> Result<Option<T>, SearchError> {
        Ok(self
            .inner
            .find_one(&self.chain.transform_query(query))?
            .map(|item| self.chain.transform_item(item)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::store::MapBackedStore;
    use crate::transform::{FieldAliasTransformer, NamedTransformer, Transformer};
    use serde_json::{json, Value};

    /// Tags every item it passes back
    struct Stamp;

    impl Transformer<Value> for Stamp {
        fn transform_item(&self, mut item: Value) -> Value {
            item["stamped"] = json!(true);
            item
        }
    }

    fn store() -> TransformingStore<Value, MapBackedStore<Value>> {
        let inner = MapBackedStore::with_items(
            EngineConfig::default(),
            vec![
                json!({"id": "1", "meta": {"status": "open"}}),
                json!({"id": "2", "meta": {"status": "closed"}}),
                json!({"id": "3", "meta": {"status": "open"}}),
            ],
        )
        .unwrap();
        let chain = TransformerChain::new()
            .with(NamedTransformer::new().with_query("open", Query::term("status", "open")))
            .with(FieldAliasTransformer::new().with_alias("status", ["meta.status"]))
            .with(Stamp);
        TransformingStore::new(chain, inner)
    }

    #[test]
    fn test_search_runs_chain() {
        let request = SearchRequest::new().with_query(Query::named("open", None));
        let result = store().search(&request).unwrap();
        assert_eq!(result.total_items, 2);
        assert!(result
            .items
            .unwrap()
            .iter()
            .all(|item| item["stamped"] == json!(true)));
    }

    #[test]
    fn test_count_and_find_one_use_chain() {
        let store = store();
        assert_eq!(store.count(&Query::named("open", None)).unwrap(), 2);
        let found = store
            .find_one(&Query::term("status", "closed"))
            .unwrap()
            .unwrap();
        assert_eq!(found["id"], "2");
        assert_eq!(found["stamped"], json!(true));
    }
}
