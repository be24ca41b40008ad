//! Cursor-based paging
//!
//! With `params.deepPage == true` the request is sorted by its own sorts
//! plus the id field, and `params.lastKey` (the sort values of the previous
//! page's last row) becomes a query selecting only rows strictly after that
//! row. The result republishes the new last row's sort values as
//! `headers.lastKey`.
//!
//! Ordering matches the comparator: nulls sort after every value when
//! ascending and before every value when descending.

use serde_json::{Map, Value};

use super::pipeline::Transformer;
use crate::document::Document;
use crate::errors::SearchError;
use crate::model::{Direction, DocSort, Field, SearchRequest, SearchResult, LAST_KEY_PARAM};
use crate::observability::{Logger, Severity};
use crate::query::{Query, RangeQuery};

#[derive(Debug, Clone)]
pub struct DeepPagingTransformer {
    id_field: String,
}

impl DeepPagingTransformer {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    fn sorts_with_id(&self, sorts: &[DocSort]) -> Vec<DocSort> {
        let mut sorts = sorts.to_vec();
        if !sorts.iter().any(|sort| sort.field == self.id_field) {
            sorts.push(DocSort::asc(self.id_field.as_str()));
        }
        sorts
    }

    /// Projected fields plus every sort field the cursor is read from
    fn fields_with_sorts(fields: &[Field], sorts: &[DocSort]) -> Vec<Field> {
        let mut fields = fields.to_vec();
        if fields.is_empty() {
            return fields;
        }
        for sort in sorts {
            let projected = fields
                .iter()
                .any(|field| field.name() == Some(sort.field.as_str()));
            if !projected {
                fields.push(Field::named(sort.field.as_str()));
            }
        }
        fields
    }

    /// Query matching rows ordered strictly after `last` under `sorts`.
    ///
    /// For sorts `(f1..fn)` this is the disjunction over `i` of
    /// `f1 == last[f1] AND .. AND f(i-1) == last[f(i-1)] AND fi after last[fi]`.
    pub fn cursor_query(sorts: &[DocSort], last: &Map<String, Value>) -> Query {
        let mut disjuncts = Vec::with_capacity(sorts.len());
        for (i, sort) in sorts.iter().enumerate() {
            let value = last.get(&sort.field).filter(|v| !v.is_null());
            let Some(after) = after(sort, value) else {
                continue;
            };
            let mut conjuncts: Vec<Query> = sorts[..i]
                .iter()
                .map(|prev| equal(&prev.field, last.get(&prev.field).filter(|v| !v.is_null())))
                .collect();
            conjuncts.push(after);
            disjuncts.push(Query::and(conjuncts));
        }
        if disjuncts.is_empty() {
            return Query::match_none();
        }
        Query::or(disjuncts)
    }
}

fn equal(field: &str, value: Option<&Value>) -> Query {
    match value {
        Some(value) => Query::term(field, value.clone()),
        None => Query::exists(field, false),
    }
}

fn after(sort: &DocSort, value: Option<&Value>) -> Option<Query> {
    match (sort.direction, value) {
        (Direction::Ascending, Some(value)) => Some(Query::or(vec![
            Query::range(RangeQuery::new(sort.field.as_str()).gt(value.clone())),
            Query::exists(sort.field.as_str(), false),
        ])),
        (Direction::Ascending, None) => None,
        (Direction::Descending, Some(value)) => Some(Query::range(
            RangeQuery::new(sort.field.as_str()).lt(value.clone()),
        )),
        (Direction::Descending, None) => Some(Query::exists(sort.field.as_str(), true)),
    }
}

impl<T: Document> Transformer<T> for DeepPagingTransformer {
    fn transform_request(&self, request: SearchRequest) -> Result<SearchRequest, SearchError> {
        if !request.deep_page() {
            return Ok(request);
        }
        let sorts = self.sorts_with_id(&request.sorts);
        let fields = Self::fields_with_sorts(&request.fields, &sorts);

        let (query, offset) = match request.params.get(LAST_KEY_PARAM) {
            Some(Value::Object(last)) => {
                let cursor = Self::cursor_query(&sorts, last);
                let query = Query::and(vec![request.query_or_all(), cursor]).simplify();
                if Logger::enabled(Severity::Trace) {
                    let encoded = serde_json::to_string(&query)?;
                    Logger::trace("DEEP_PAGE_CURSOR", &[("query", encoded.as_str())]);
                }
                (Some(query), 0)
            }
            Some(Value::Null) | None => (request.query.clone(), request.offset),
            Some(other) => {
                return Err(SearchError::InvalidRequest(format!(
                    "{} must be an object, got {}",
                    LAST_KEY_PARAM, other
                )))
            }
        };

        Ok(SearchRequest {
            query,
            offset,
            sorts,
            fields,
            ..request
        })
    }

    fn transform_result(
        &self,
        request: &SearchRequest,
        mut result: SearchResult<T>,
    ) -> Result<SearchResult<T>, SearchError> {
        if !request.deep_page() {
            return Ok(result);
        }
        let sorts = self.sorts_with_id(&request.sorts);

        let mut last_key = Map::new();
        if let Some(row) = result.rows.as_ref().and_then(|rows| rows.last()) {
            let fields = Self::fields_with_sorts(&request.fields, &sorts);
            for sort in &sorts {
                let index = fields
                    .iter()
                    .position(|field| field.name() == Some(sort.field.as_str()));
                if let Some(value) = index.and_then(|index| row.get(index)) {
                    last_key.insert(sort.field.clone(), value.clone());
                }
            }
        } else if let Some(item) = result.items.as_ref().and_then(|items| items.last()) {
            for sort in &sorts {
                let value = item.resolve_single(&sort.field).unwrap_or(Value::Null);
                last_key.insert(sort.field.clone(), value);
            }
        } else {
            return Ok(result);
        }

        result
            .headers
            .insert(LAST_KEY_PARAM.to_string(), Value::Object(last_key));
        Ok(result)
    }
}
