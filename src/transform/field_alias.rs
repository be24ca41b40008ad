//! Logical to physical field names
//!
//! Each alias maps a logical field to one or more delegate fields. Queries
//! on an aliased field match when any delegate matches (`Exists` with
//! `value: false` requires every delegate to be absent). Aggregations,
//! sorts and projected columns read only the first delegate.

use std::collections::HashMap;

use super::agg::AggTransformer;
use super::pipeline::Transformer;
use super::query::QueryTransformer;
use crate::agg::{Agg, AggKind};
use crate::errors::SearchError;
use crate::model::{DocSort, Field, SearchRequest, SearchResult};
use crate::query::Query;

#[derive(Debug, Clone, Default)]
pub struct FieldAliasTransformer {
    aliases: HashMap<String, Vec<String>>,
}

impl FieldAliasTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `field` to `delegates`. An empty delegate list is ignored.
    pub fn with_alias<I, S>(mut self, field: impl Into<String>, delegates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let delegates: Vec<String> = delegates.into_iter().map(Into::into).collect();
        if !delegates.is_empty() {
            self.aliases.insert(field.into(), delegates);
        }
        self
    }

    fn first_delegate<'a>(&'a self, field: &'a str) -> &'a str {
        self.aliases
            .get(field)
            .and_then(|delegates| delegates.first())
            .map(String::as_str)
            .unwrap_or(field)
    }

    fn transform_sorts(&self, sorts: &[DocSort]) -> Vec<DocSort> {
        sorts
            .iter()
            .map(|sort| DocSort::new(self.first_delegate(&sort.field), sort.direction))
            .collect()
    }

    fn transform_fields(&self, fields: &[Field]) -> Vec<Field> {
        fields
            .iter()
            .map(|field| match field.name() {
                Some(name) => field.renamed(self.first_delegate(name)),
                None => field.clone(),
            })
            .collect()
    }
}

impl QueryTransformer for FieldAliasTransformer {
    fn transform_leaf(&self, query: &Query) -> Query {
        let Some(delegates) = query
            .field()
            .and_then(|field| self.aliases.get(field))
            .filter(|delegates| !delegates.is_empty())
        else {
            return query.clone();
        };
        if let [only] = delegates.as_slice() {
            return query.with_field(only);
        }
        let queries = delegates.iter().map(|field| query.with_field(field)).collect();
        match query {
            Query::Exists { value: false, .. } => Query::and(queries),
            _ => Query::or(queries),
        }
    }
}

impl AggTransformer for FieldAliasTransformer {
    fn transform_kind(&self, agg: &Agg) -> Agg {
        if let AggKind::Filters { filters } = &agg.kind {
            let filters = filters
                .iter()
                .map(|(key, query)| (key.clone(), QueryTransformer::transform(self, query)))
                .collect();
            let mut out = agg.clone();
            out.kind = AggKind::Filters { filters };
            return out;
        }

        let Some(field) = agg.field() else {
            return agg.clone();
        };
        // TODO: aggregate over every delegate once multi-field buckets exist
        let delegate = self.first_delegate(field).to_string();
        if delegate == field {
            return agg.clone();
        }
        let mut out = agg.clone().pin_key();
        if let Some(target) = out.field_mut() {
            *target = delegate;
        }
        out
    }
}

impl<T> Transformer<T> for FieldAliasTransformer {
    fn transform_request(&self, request: SearchRequest) -> Result<SearchRequest, SearchError> {
        Ok(SearchRequest {
            query: request.query.as_ref().map(|query| QueryTransformer::transform(self, query)),
            sorts: self.transform_sorts(&request.sorts),
            fields: self.transform_fields(&request.fields),
            aggs: self.transform_aggs(&request.aggs),
            ..request
        })
    }

    fn transform_result(
        &self,
        request: &SearchRequest,
        mut result: SearchResult<T>,
    ) -> Result<SearchResult<T>, SearchError> {
        if !result.fields.is_empty() {
            result.fields = request.fields.clone();
        }
        Ok(result)
    }

    fn transform_query(&self, query: &Query) -> Query {
        QueryTransformer::transform(self, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::RangeQuery;
    use indexmap::IndexMap;
    use serde_json::Value;

    fn aliases() -> FieldAliasTransformer {
        FieldAliasTransformer::new()
            .with_alias("name", ["profile.name"])
            .with_alias("text", ["title", "body"])
    }

    #[test]
    fn test_single_delegate_renames() {
        let query = Query::range(RangeQuery::new("name").gte("m"));
        let out = QueryTransformer::transform(&aliases(), &query);
        assert_eq!(out, Query::range(RangeQuery::new("profile.name").gte("m")));
    }

    #[test]
    fn test_multiple_delegates_expand_to_or() {
        let out = QueryTransformer::transform(&aliases(), &Query::matches("text", "rust"));
        assert_eq!(
            out,
            Query::or(vec![Query::matches("title", "rust"), Query::matches("body", "rust")])
        );

        let out = QueryTransformer::transform(&aliases(), &Query::exists("text", false));
        assert_eq!(
            out,
            Query::and(vec![Query::exists("title", false), Query::exists("body", false)])
        );
    }

    #[test]
    fn test_unaliased_and_non_fielded_pass_through() {
        let query = Query::and(vec![Query::term("other", 1), Query::named("recent", None)]);
        assert_eq!(QueryTransformer::transform(&aliases(), &query), query);
    }

    #[test]
    fn test_agg_uses_first_delegate_and_keeps_key() {
        let out = aliases().transform_agg(&Agg::terms("text", 5));
        assert_eq!(out.field(), Some("title"));
        assert_eq!(out.key(), "text");

        let mut filters = IndexMap::new();
        filters.insert("named".to_string(), Query::term("name", "ada"));
        let out = aliases().transform_agg(&Agg::filters("f", filters));
        let AggKind::Filters { filters } = &out.kind else {
            panic!("expected filters");
        };
        assert_eq!(filters["named"], Query::term("profile.name", "ada"));
    }

    #[test]
    fn test_request_sorts_fields_and_result_fields() {
        let request = SearchRequest::new()
            .with_sorts(vec![DocSort::desc("name")])
            .with_fields(vec![Field::named("name"), Field::computed("${fieldValues.x}")]);
        let out = Transformer::<Value>::transform_request(&aliases(), request.clone()).unwrap();
        assert_eq!(out.sorts, vec![DocSort::desc("profile.name")]);
        assert_eq!(out.fields[0].name(), Some("profile.name"));
        assert_eq!(out.fields[1], request.fields[1]);

        let result = SearchResult::<Value> {
            rows: Some(vec![]),
            fields: out.fields.clone(),
            ..SearchResult::default()
        };
        let result = aliases().transform_result(&request, result).unwrap();
        assert_eq!(result.fields, request.fields);
    }
}
