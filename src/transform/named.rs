//! Named queries and aggregations
//!
//! A registry maps names to queries and aggregations. `Named { name }`
//! queries and aggs are replaced by their registered definition.
//! `Named { name, value }` queries select the documents of one bucket of
//! the named agg, which is what every bucket of a named agg result carries
//! as its `query`.

use std::collections::HashMap;

use serde_json::Value;

use super::agg::AggTransformer;
use super::extensions::{ExtensionsTransformer, KeyAggTransformer};
use super::pipeline::Transformer;
use super::query::QueryTransformer;
use crate::agg::{Agg, AggKind, RangeSpec};
use crate::aggregation::DateUnit;
use crate::document::{as_number, from_f64, term_equals, to_text};
use crate::errors::SearchError;
use crate::model::{SearchRequest, SearchResult};
use crate::query::{Query, RangeQuery};

/// Request parameter naming the time zone of date bucket queries
pub const TIME_ZONE_PARAM: &str = "timeZone";

#[derive(Debug, Clone, Default)]
pub struct NamedTransformer {
    queries: HashMap<String, Query>,
    aggs: HashMap<String, Agg>,
}

impl NamedTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, name: impl Into<String>, query: Query) -> Self {
        self.queries.insert(name.into(), query);
        self
    }

    pub fn with_agg(mut self, name: impl Into<String>, agg: Agg) -> Self {
        self.aggs.insert(name.into(), agg);
        self
    }

    /// Query selecting the documents in bucket `value` of `agg`
    fn bucket_query(&self, agg: &Agg, value: &Value, zone: Option<&str>) -> Option<Query> {
        match &agg.kind {
            AggKind::Terms { field, missing, .. } => match missing {
                Some(label) if term_equals(label, value) || label == value => {
                    Some(Query::exists(field.as_str(), false))
                }
                _ => Some(Query::term(field.as_str(), value.clone())),
            },
            AggKind::Histogram {
                field, interval, ..
            } => {
                let from = as_number(value)?;
                Some(Query::range(
                    RangeQuery::new(field.as_str())
                        .gte(from_f64(from))
                        .lt(from_f64(from + interval)),
                ))
            }
            AggKind::DateHistogram {
                field,
                interval,
                time_zone,
                ..
            } => {
                let unit = DateUnit::from_interval(interval)?;
                let from = to_text(value);
                let mut range = RangeQuery::new(field.as_str())
                    .gte(from.as_str())
                    .lt(format!("{}||+1{}", from, unit.math_char()));
                range.time_zone = time_zone.clone().or_else(|| zone.map(str::to_string));
                Some(Query::date_range(range))
            }
            AggKind::Range { field, ranges } => {
                let spec = find_range(ranges, value)?;
                Some(Query::range(range_query(field, spec)))
            }
            AggKind::DateRange {
                field,
                ranges,
                time_zone,
                ..
            } => {
                let spec = find_range(ranges, value)?;
                let mut range = range_query(field, spec);
                range.time_zone = time_zone.clone().or_else(|| zone.map(str::to_string));
                Some(Query::date_range(range))
            }
            AggKind::Filters { filters } => filters.get(&to_text(value)).cloned(),
            AggKind::Missing { field } => Some(Query::exists(field.as_str(), false)),
            AggKind::Stats { field }
            | AggKind::GeoHash { field, .. }
            | AggKind::GeoBounds { field }
            | AggKind::GeoCentroid { field }
            | AggKind::GeoDistance { field, .. } => Some(Query::term(field.as_str(), value.clone())),
            AggKind::Named { .. } | AggKind::Native { .. } | AggKind::Xform { .. } => None,
        }
    }

    fn resolve_agg(&self, agg: &Agg) -> Option<Agg> {
        let AggKind::Named { name } = &agg.kind else {
            return None;
        };
        let registered = self.aggs.get(name)?;
        let keyed = KeyAggTransformer::new(agg.key()).transform_agg(registered);
        Some(ExtensionsTransformer::new(agg.ext.clone()).transform_agg(&keyed))
    }

    /// Field reported on a named agg result: only date aggs expose theirs
    fn result_field(&self, name: &str) -> Option<&str> {
        match self.aggs.get(name).map(|agg| &agg.kind) {
            Some(AggKind::DateHistogram { field, .. }) | Some(AggKind::DateRange { field, .. }) => {
                Some(field.as_str())
            }
            _ => None,
        }
    }
}

fn find_range<'a>(ranges: &'a [RangeSpec], value: &Value) -> Option<&'a RangeSpec> {
    let key = to_text(value);
    ranges.iter().find(|spec| spec.bucket_key() == key)
}

fn range_query(field: &str, spec: &RangeSpec) -> RangeQuery {
    RangeQuery {
        gte: spec.from.clone(),
        lt: spec.to.clone(),
        ..RangeQuery::new(field)
    }
}

/// Resolves named queries with date buckets in a request's time zone
struct Resolver<'a> {
    named: &'a NamedTransformer,
    time_zone: Option<&'a str>,
}

impl QueryTransformer for Resolver<'_> {
    fn transform_leaf(&self, query: &Query) -> Query {
        let Query::Named { name, value } = query else {
            return query.clone();
        };
        let resolved = match value {
            None => self.named.queries.get(name).cloned(),
            Some(value) => self
                .named
                .aggs
                .get(name)
                .and_then(|agg| self.named.bucket_query(agg, value, self.time_zone)),
        };
        resolved.unwrap_or_else(|| query.clone())
    }
}

impl QueryTransformer for NamedTransformer {
    fn transform(&self, query: &Query) -> Query {
        Resolver {
            named: self,
            time_zone: None,
        }
        .transform(query)
    }
}

impl AggTransformer for NamedTransformer {
    fn transform_kind(&self, agg: &Agg) -> Agg {
        self.resolve_agg(agg).unwrap_or_else(|| agg.clone())
    }
}

impl<T> Transformer<T> for NamedTransformer {
    fn transform_request(&self, request: SearchRequest) -> Result<SearchRequest, SearchError> {
        let resolver = Resolver {
            named: self,
            time_zone: request.params.get(TIME_ZONE_PARAM).and_then(Value::as_str),
        };
        let query = request.query.as_ref().map(|query| resolver.transform(query));
        Ok(SearchRequest {
            query,
            aggs: self.transform_aggs(&request.aggs),
            ..request
        })
    }

    fn transform_result(
        &self,
        request: &SearchRequest,
        mut result: SearchResult<T>,
    ) -> Result<SearchResult<T>, SearchError> {
        for agg in &request.aggs {
            let AggKind::Named { name } = &agg.kind else {
                continue;
            };
            if !self.aggs.contains_key(name) {
                continue;
            }
            let Some(agg_result) = result.aggs.get_mut(agg.key()) else {
                continue;
            };
            agg_result.op = "filters".to_string();
            agg_result.field = self.result_field(name).map(str::to_string);
            for bucket in agg_result.buckets.iter_mut().flatten() {
                bucket.query = Some(Query::named(name.as_str(), Some(bucket.key.clone())));
            }
        }
        Ok(result)
    }

    fn transform_query(&self, query: &Query) -> Query {
        QueryTransformer::transform(self, query)
    }
}
