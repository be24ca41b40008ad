use super::pipeline::Transformer;
use super::query::QueryTransformer;
use crate::query::Query;

/// Applies [`Query::simplify`] to the request query
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplifyTransformer;

impl QueryTransformer for SimplifyTransformer {
    fn transform(&self, query: &Query) -> Query {
        query.simplify()
    }
}

impl<T> Transformer<T> for SimplifyTransformer {
    fn transform_query(&self, query: &Query) -> Query {
        QueryTransformer::transform(self, query)
    }
}
