//! Query rewriting by variant

use crate::query::Query;

/// Rewrites a query tree.
///
/// [`QueryTransformer::transform`] dispatches on every variant. Boolean groups
/// recurse into their children by default and leaves pass through
/// [`QueryTransformer::transform_leaf`] unchanged, so an implementation only
/// overrides the cases it rewrites.
pub trait QueryTransformer: Send + Sync {
    fn transform(&self, query: &Query) -> Query {
        match query {
            Query::And { of } => self.transform_and(of),
            Query::Or { of } => self.transform_or(of),
            Query::Not { of } => self.transform_not(of),
            Query::MatchAll
            | Query::Term { .. }
            | Query::Terms { .. }
            | Query::Match { .. }
            | Query::Phrase { .. }
            | Query::Prefix { .. }
            | Query::Wildcard { .. }
            | Query::Regex { .. }
            | Query::Range(_)
            | Query::DateRange(_)
            | Query::Bbox { .. }
            | Query::Exists { .. }
            | Query::Lucene { .. }
            | Query::Native { .. }
            | Query::Named { .. } => self.transform_leaf(query),
        }
    }

    fn transform_and(&self, of: &[Query]) -> Query {
        Query::and(self.transform_all(of))
    }

    fn transform_or(&self, of: &[Query]) -> Query {
        Query::or(self.transform_all(of))
    }

    fn transform_not(&self, of: &[Query]) -> Query {
        Query::not(self.transform_all(of))
    }

    fn transform_leaf(&self, query: &Query) -> Query {
        query.clone()
    }

    fn transform_all(&self, of: &[Query]) -> Vec<Query> {
        of.iter().map(|child| self.transform(child)).collect()
    }
}
