//! In-memory aggregation engine
//!
//! Evaluates a list of [`Agg`] against a candidate set, recursing into
//! nested aggregations with each bucket's own members.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;

use super::buckets::{Partition, Partitions};
use super::dates::{parse_offset, DateParsers, DateUnit};
use super::errors::AggError;
use crate::agg::{Agg, AggKind, AggResult, AggSort, Bucket, RangeSpec, Stats};
use crate::document::{as_number, canonical_key, from_f64, to_text, Document};
use crate::executor::PredicateFilter;
use crate::observability::Logger;
use crate::query::Query;

/// Computes aggregation results over in-memory documents.
///
/// The engine is shared between threads; its only state is the per-time-zone
/// date parser cache.
#[derive(Debug, Default)]
pub struct AggregationEngine {
    dates: DateParsers,
}

impl AggregationEngine {
    /// Creates an engine whose date handling defaults to `time_zone`
    pub fn new(time_zone: impl Into<String>) -> Self {
        Self {
            dates: DateParsers::new(time_zone),
        }
    }

    pub fn dates(&self) -> &DateParsers {
        &self.dates
    }

    /// Evaluates `aggs` against `candidates`, resolving date math against now
    pub fn evaluate<D: Document + ?Sized>(
        &self,
        aggs: &[Agg],
        candidates: &[&D],
    ) -> Result<IndexMap<String, AggResult>, AggError> {
        self.evaluate_at(aggs, candidates, Utc::now())
    }

    /// Evaluates `aggs` against `candidates` with a fixed "now"
    pub fn evaluate_at<D: Document + ?Sized>(
        &self,
        aggs: &[Agg],
        candidates: &[&D],
        now: DateTime<Utc>,
    ) -> Result<IndexMap<String, AggResult>, AggError> {
        let mut results = IndexMap::with_capacity(aggs.len());
        for agg in aggs {
            let result = self.evaluate_one(agg, candidates, now)?;
            results.insert(agg.key().to_string(), result);
        }
        Ok(results)
    }

    fn evaluate_one<D: Document + ?Sized>(
        &self,
        agg: &Agg,
        candidates: &[&D],
        now: DateTime<Utc>,
    ) -> Result<AggResult, AggError> {
        let result = match &agg.kind {
            AggKind::Terms {
                field,
                size,
                missing,
                ..
            } => self.terms(agg, field, *size, missing.as_ref(), candidates, now)?,
            AggKind::Histogram {
                field,
                interval,
                offset,
                missing,
                ..
            } => self.histogram(agg, field, *interval, *offset, missing.as_ref(), candidates, now)?,
            AggKind::DateHistogram {
                field,
                interval,
                offset,
                time_zone,
                missing,
                format,
            } => {
                let settings = DateHistogramSettings {
                    interval,
                    offset: offset.as_deref(),
                    time_zone: time_zone.as_deref(),
                    missing: missing.as_ref(),
                    format: format.as_deref(),
                };
                self.date_histogram(agg, field, settings, candidates, now)?
            }
            AggKind::Range { field, ranges } => self.range(agg, field, ranges, candidates, now)?,
            AggKind::DateRange {
                field,
                ranges,
                time_zone,
                ..
            } => self.date_range(agg, field, ranges, time_zone.as_deref(), candidates, now)?,
            AggKind::Filters { filters } => self.filters(agg, filters, candidates, now)?,
            AggKind::Stats { field } => stats(agg, field, candidates),
            AggKind::Missing { field } => self.missing(agg, field, candidates, now)?,
            AggKind::GeoHash { .. }
            | AggKind::GeoBounds { .. }
            | AggKind::GeoCentroid { .. }
            | AggKind::GeoDistance { .. }
            | AggKind::Native { .. } => {
                Logger::warn(
                    "AGG_NOT_IMPLEMENTED",
                    &[("key", agg.key()), ("op", agg.op())],
                );
                return Err(AggError::NotImplemented {
                    key: agg.key().to_string(),
                    op: agg.op(),
                });
            }
            AggKind::Named { name } => {
                return Err(AggError::UnresolvedNamed { name: name.clone() });
            }
            AggKind::Xform { .. } => {
                return Err(AggError::UnresolvedXform {
                    key: agg.key().to_string(),
                });
            }
        };
        Ok(result)
    }

    fn nested<D: Document + ?Sized>(
        &self,
        agg: &Agg,
        members: &[&D],
        now: DateTime<Utc>,
    ) -> Result<Option<IndexMap<String, AggResult>>, AggError> {
        if agg.aggs.is_empty() {
            return Ok(None);
        }
        self.evaluate_at(&agg.aggs, members, now).map(Some)
    }

    /// Converts finished partitions into buckets, evaluating nested aggs
    fn buckets<D: Document + ?Sized>(
        &self,
        agg: &Agg,
        parts: Vec<Partition<'_, D>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Bucket>, AggError> {
        parts
            .into_iter()
            .map(|part| {
                let count = part.count();
                let mut bucket = Bucket::new(part.key, count);
                bucket.label = Some(to_text(&bucket.key));
                bucket.aggs = self.nested(agg, &part.members, now)?;
                Ok(bucket)
            })
            .collect()
    }

    fn terms<D: Document + ?Sized>(
        &self,
        agg: &Agg,
        field: &str,
        size: usize,
        missing: Option<&Value>,
        candidates: &[&D],
        now: DateTime<Utc>,
    ) -> Result<AggResult, AggError> {
        let mut parts = Partitions::new();
        let mut absent = Vec::new();
        for &doc in candidates {
            let values = doc.resolve(field);
            if values.is_empty() {
                absent.push(doc);
                continue;
            }
            let mut seen = HashSet::new();
            for value in values {
                if seen.insert(canonical_key(&value)) {
                    parts.add(value, doc);
                }
            }
        }
        if let Some(label) = missing {
            if !absent.is_empty() {
                parts.extend(label.clone(), absent);
            }
        }

        let sort = agg.sort.unwrap_or_else(AggSort::count_desc);
        let parts = parts.finish(agg.min_doc_count, sort, Some(size));
        Ok(AggResult::new(agg.key(), agg.op())
            .with_field(Some(field))
            .with_buckets(self.buckets(agg, parts, now)?))
    }

    #[allow(clippy::too_many_arguments)]
    fn histogram<D: Document + ?Sized>(
        &self,
        agg: &Agg,
        field: &str,
        interval: f64,
        offset: f64,
        missing: Option<&Value>,
        candidates: &[&D],
        now: DateTime<Utc>,
    ) -> Result<AggResult, AggError> {
        if !(interval.is_finite() && interval > 0.0) {
            return Err(AggError::InvalidSetting {
                key: agg.key().to_string(),
                reason: format!("histogram interval must be positive, got {}", interval),
            });
        }

        let mut parts = Partitions::new();
        let mut absent = Vec::new();
        for &doc in candidates {
            let numbers: Vec<f64> = doc
                .resolve(field)
                .iter()
                .filter_map(|v| if v.is_number() { v.as_f64() } else { None })
                .collect();
            if numbers.is_empty() {
                absent.push(doc);
                continue;
            }
            let mut seen = HashSet::new();
            for number in numbers {
                let key = from_f64(((number - offset) / interval).floor() * interval + offset);
                if seen.insert(canonical_key(&key)) {
                    parts.add(key, doc);
                }
            }
        }
        if let Some(label) = missing {
            if !absent.is_empty() {
                parts.extend(label.clone(), absent);
            }
        }

        let sort = agg.sort.unwrap_or_else(AggSort::count_desc);
        let parts = parts.finish(agg.min_doc_count, sort, None);
        Ok(AggResult::new(agg.key(), agg.op())
            .with_field(Some(field))
            .with_buckets(self.buckets(agg, parts, now)?))
    }

    fn date_histogram<D: Document + ?Sized>(
        &self,
        agg: &Agg,
        field: &str,
        settings: DateHistogramSettings<'_>,
        candidates: &[&D],
        now: DateTime<Utc>,
    ) -> Result<AggResult, AggError> {
        let key = agg.key();
        let unit = DateUnit::from_interval(settings.interval).ok_or_else(|| {
            AggError::UnknownInterval {
                key: key.to_string(),
                interval: settings.interval.to_string(),
            }
        })?;
        let shift = match settings.offset {
            Some(text) => parse_offset(text).ok_or_else(|| AggError::InvalidSetting {
                key: key.to_string(),
                reason: format!("invalid date histogram offset '{}'", text),
            })?,
            None => chrono::Duration::zero(),
        };
        let parser = self
            .dates
            .get(settings.time_zone)
            .map_err(|e| AggError::InvalidSetting {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        let format = settings.format.unwrap_or(unit.label_format());

        let mut parts = Partitions::new();
        let mut millis_by_label: HashMap<String, i64> = HashMap::new();
        let mut absent = Vec::new();
        for &doc in candidates {
            let instants: Vec<DateTime<Utc>> = doc
                .resolve(field)
                .iter()
                .filter_map(|v| parser.coerce(v, now))
                .collect();
            if instants.is_empty() {
                absent.push(doc);
                continue;
            }
            let mut seen = HashSet::new();
            for instant in instants {
                let Some(start) = parser.truncate(instant - shift, unit) else {
                    continue;
                };
                let start = start + shift;
                let label = start.format(format).to_string();
                millis_by_label
                    .entry(label.clone())
                    .or_insert_with(|| start.timestamp_millis());
                if seen.insert(label.clone()) {
                    parts.add(Value::String(label), doc);
                }
            }
        }
        if let Some(label) = settings.missing {
            if !absent.is_empty() {
                parts.extend(label.clone(), absent);
            }
        }

        let sort = agg.sort.unwrap_or_else(AggSort::lexical_asc);
        let parts = parts.finish(agg.min_doc_count, sort, None);
        let mut buckets = self.buckets(agg, parts, now)?;
        for bucket in &mut buckets {
            if let Some(millis) = bucket.key.as_str().and_then(|l| millis_by_label.get(l)) {
                bucket.key = Value::from(*millis);
            }
        }
        Ok(AggResult::new(key, agg.op())
            .with_field(Some(field))
            .with_buckets(buckets))
    }

    fn range<D: Document + ?Sized>(
        &self,
        agg: &Agg,
        field: &str,
        ranges: &[RangeSpec],
        candidates: &[&D],
        now: DateTime<Utc>,
    ) -> Result<AggResult, AggError> {
        let numeric_bound = |bound: &Option<Value>| -> Result<Option<f64>, AggError> {
            match bound {
                None | Some(Value::Null) => Ok(None),
                Some(value) => as_number(value).map(Some).ok_or_else(|| AggError::InvalidSetting {
                    key: agg.key().to_string(),
                    reason: format!("range bound {} is not numeric", value),
                }),
            }
        };

        let mut buckets = Vec::with_capacity(ranges.len());
        for spec in ranges {
            let from = numeric_bound(&spec.from)?;
            let to = numeric_bound(&spec.to)?;
            let members: Vec<&D> = candidates
                .iter()
                .copied()
                .filter(|doc| {
                    doc.resolve(field)
                        .iter()
                        .filter_map(as_number)
                        .any(|v| in_range(v, from, to))
                })
                .collect();
            buckets.push(self.range_bucket(agg, spec, &members, now)?);
        }
        Ok(AggResult::new(agg.key(), agg.op())
            .with_field(Some(field))
            .with_buckets(buckets))
    }

    fn date_range<D: Document + ?Sized>(
        &self,
        agg: &Agg,
        field: &str,
        ranges: &[RangeSpec],
        time_zone: Option<&str>,
        candidates: &[&D],
        now: DateTime<Utc>,
    ) -> Result<AggResult, AggError> {
        let parser = self.dates.get(time_zone).map_err(|e| AggError::InvalidSetting {
            key: agg.key().to_string(),
            reason: e.to_string(),
        })?;
        let date_bound = |bound: &Option<Value>, round_up: bool| -> Result<Option<f64>, AggError> {
            match bound {
                None | Some(Value::Null) => Ok(None),
                Some(value) => parser
                    .resolve_bound(value, now, round_up)
                    .map(|instant| Some(instant.timestamp_millis() as f64))
                    .map_err(|e| AggError::InvalidSetting {
                        key: agg.key().to_string(),
                        reason: e.to_string(),
                    }),
            }
        };

        let mut buckets = Vec::with_capacity(ranges.len());
        for spec in ranges {
            let from = date_bound(&spec.from, false)?;
            let to = date_bound(&spec.to, true)?;
            let members: Vec<&D> = candidates
                .iter()
                .copied()
                .filter(|doc| {
                    doc.resolve(field)
                        .iter()
                        .filter_map(|v| parser.coerce(v, now))
                        .any(|instant| in_range(instant.timestamp_millis() as f64, from, to))
                })
                .collect();
            buckets.push(self.range_bucket(agg, spec, &members, now)?);
        }
        Ok(AggResult::new(agg.key(), agg.op())
            .with_field(Some(field))
            .with_buckets(buckets))
    }

    fn range_bucket<D: Document + ?Sized>(
        &self,
        agg: &Agg,
        spec: &RangeSpec,
        members: &[&D],
        now: DateTime<Utc>,
    ) -> Result<Bucket, AggError> {
        let mut bucket = Bucket::new(spec.bucket_key(), members.len() as u64);
        bucket.from = spec.from.clone();
        bucket.to = spec.to.clone();
        bucket.aggs = self.nested(agg, members, now)?;
        Ok(bucket)
    }

    fn filters<D: Document + ?Sized>(
        &self,
        agg: &Agg,
        filters: &IndexMap<String, Query>,
        candidates: &[&D],
        now: DateTime<Utc>,
    ) -> Result<AggResult, AggError> {
        let mut buckets = Vec::with_capacity(filters.len());
        for (name, query) in filters {
            let filter = PredicateFilter::compile_with(query, &self.dates, now).map_err(|source| {
                AggError::InvalidFilter {
                    key: agg.key().to_string(),
                    filter: name.clone(),
                    source,
                }
            })?;
            let members: Vec<&D> = candidates
                .iter()
                .copied()
                .filter(|doc| filter.matches(*doc))
                .collect();
            let mut bucket = Bucket::new(name.as_str(), members.len() as u64);
            bucket.query = Some(query.clone());
            bucket.aggs = self.nested(agg, &members, now)?;
            buckets.push(bucket);
        }
        Ok(AggResult::new(agg.key(), agg.op()).with_buckets(buckets))
    }

    fn missing<D: Document + ?Sized>(
        &self,
        agg: &Agg,
        field: &str,
        candidates: &[&D],
        now: DateTime<Utc>,
    ) -> Result<AggResult, AggError> {
        let members: Vec<&D> = candidates
            .iter()
            .copied()
            .filter(|doc| doc.resolve(field).is_empty())
            .collect();
        let mut bucket = Bucket::new("missing", members.len() as u64);
        bucket.aggs = self.nested(agg, &members, now)?;
        Ok(AggResult::new(agg.key(), agg.op())
            .with_field(Some(field))
            .with_buckets(vec![bucket]))
    }
}

struct DateHistogramSettings<'a> {
    interval: &'a str,
    offset: Option<&'a str>,
    time_zone: Option<&'a str>,
    missing: Option<&'a Value>,
    format: Option<&'a str>,
}

fn stats<D: Document + ?Sized>(agg: &Agg, field: &str, candidates: &[&D]) -> AggResult {
    let stats = Stats::from_values(candidates.iter().flat_map(|doc| {
        doc.resolve(field)
            .into_iter()
            .filter_map(|v| if v.is_number() { v.as_f64() } else { None })
    }));
    let mut bucket = Bucket::new(Value::Null, stats.count);
    bucket.stats = Some(stats.clone());

    let mut result = AggResult::new(agg.key(), agg.op())
        .with_field(Some(field))
        .with_buckets(vec![bucket]);
    result.stats = Some(stats);
    result
}

fn in_range(value: f64, from: Option<f64>, to: Option<f64>) -> bool {
    from.map_or(true, |f| value >= f) && to.map_or(true, |t| value < t)
}
