//! Lucene query resolution
//!
//! Replaces every `Lucene` node of the request query with the algebra its
//! query string parses to. A node without its own default field uses the
//! transformer's.

use super::pipeline::Transformer;
use crate::errors::SearchError;
use crate::model::SearchRequest;
use crate::query::{parse_lucene, LuceneError, Query};

/// Field that unqualified terms apply to when nothing else names one
pub const DEFAULT_LUCENE_FIELD: &str = "_all";

#[derive(Debug, Clone)]
pub struct LuceneTransformer {
    default_field: String,
}

impl Default for LuceneTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_LUCENE_FIELD)
    }
}

impl LuceneTransformer {
    pub fn new(default_field: impl Into<String>) -> Self {
        Self {
            default_field: default_field.into(),
        }
    }

    pub fn resolve(&self, query: &Query) -> Result<Query, LuceneError> {
        match query {
            Query::And { of } => Ok(Query::and(self.resolve_all(of)?)),
            Query::Or { of } => Ok(Query::or(self.resolve_all(of)?)),
            Query::Not { of } => Ok(Query::not(self.resolve_all(of)?)),
            Query::Lucene {
                query,
                default_field,
            } => parse_lucene(
                query,
                default_field.as_deref().unwrap_or(&self.default_field),
            ),
            other => Ok(other.clone()),
        }
    }

    fn resolve_all(&self, of: &[Query]) -> Result<Vec<Query>, LuceneError> {
        of.iter().map(|child| self.resolve(child)).collect()
    }
}

impl<T> Transformer<T> for LuceneTransformer {
    fn transform_request(&self, request: SearchRequest) -> Result<SearchRequest, SearchError> {
        let query = request
            .query
            .as_ref()
            .map(|query| self.resolve(query))
            .transpose()?;
        Ok(SearchRequest { query, ..request })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn lucene(text: &str, default_field: Option<&str>) -> Query {
        Query::Lucene {
            query: text.into(),
            default_field: default_field.map(str::to_string),
        }
    }

    #[test]
    fn test_nested_lucene_is_parsed() {
        let query = Query::and(vec![
            Query::term("kind", "a"),
            Query::not(vec![lucene("status:closed OR title:draft*", None)]),
        ]);
        let out = LuceneTransformer::default().resolve(&query).unwrap();
        assert_eq!(
            out,
            Query::and(vec![
                Query::term("kind", "a"),
                Query::not(vec![Query::or(vec![
                    Query::term("status", "closed"),
                    Query::prefix("title", "draft"),
                ])]),
            ])
        );
    }

    #[test]
    fn test_default_field_precedence() {
        let transformer = LuceneTransformer::new("body");
        assert_eq!(
            transformer.resolve(&lucene("rust", None)).unwrap(),
            Query::term("body", "rust")
        );
        assert_eq!(
            transformer.resolve(&lucene("rust", Some("title"))).unwrap(),
            Query::term("title", "rust")
        );
    }

    #[test]
    fn test_syntax_error_fails_request() {
        let request = SearchRequest::new().with_query(lucene("(open", None));
        let err = Transformer::<Value>::transform_request(&LuceneTransformer::default(), request)
            .unwrap_err();
        assert_eq!(err.code(), "QUERY_INVALID_LUCENE");
    }
}
