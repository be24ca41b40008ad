//! Aggregation specifications
//!
//! An [`Agg`] carries the fields every aggregation shares (result key, bucket
//! sort, minimum bucket count, nested aggregations, passthrough extensions)
//! and an [`AggKind`] naming what is computed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::Direction;
use crate::query::Query;

/// Default `size` of a terms aggregation
pub const DEFAULT_TERMS_SIZE: usize = 10;

/// One aggregation request, possibly with nested sub-aggregations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agg {
    #[serde(flatten)]
    pub kind: AggKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<AggSort>,
    #[serde(default = "default_min_doc_count")]
    pub min_doc_count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggs: Vec<Agg>,
    /// Backend-specific passthrough settings
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub ext: Map<String, Value>,
}

fn default_min_doc_count() -> u64 {
    1
}

fn default_terms_size() -> usize {
    DEFAULT_TERMS_SIZE
}

/// What an aggregation computes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AggKind {
    Terms {
        field: String,
        #[serde(default = "default_terms_size")]
        size: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        missing: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Histogram {
        field: String,
        interval: f64,
        #[serde(default)]
        offset: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        missing: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DateHistogram {
        field: String,
        interval: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_zone: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        missing: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Range {
        field: String,
        ranges: Vec<RangeSpec>,
    },
    #[serde(rename_all = "camelCase")]
    DateRange {
        field: String,
        ranges: Vec<RangeSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_zone: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Filters {
        filters: IndexMap<String, Query>,
    },
    Stats {
        field: String,
    },
    Missing {
        field: String,
    },
    GeoHash {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        precision: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<usize>,
    },
    GeoBounds {
        field: String,
    },
    GeoCentroid {
        field: String,
    },
    GeoDistance {
        field: String,
        origin: GeoPoint,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        ranges: Vec<RangeSpec>,
    },
    Named {
        name: String,
    },
    Native {
        value: Value,
    },
    /// Wraps `agg` and reshapes each of its buckets with the `bucket` template
    Xform {
        agg: Box<Agg>,
        bucket: Value,
    },
}

/// One configured bucket of a range aggregation: `[from, to)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl RangeSpec {
    pub fn new(from: Option<Value>, to: Option<Value>) -> Self {
        Self {
            from,
            to,
            key: None,
        }
    }

    pub fn keyed(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Explicit key, or `"<from>-<to>"` with `*` for an open end
    pub fn bucket_key(&self) -> String {
        if let Some(key) = &self.key {
            return key.clone();
        }
        let end = |bound: &Option<Value>| match bound {
            None | Some(Value::Null) => "*".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        format!("{}-{}", end(&self.from), end(&self.to))
    }
}

/// A latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// What buckets are ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortType {
    Count,
    Lexical,
    None,
}

/// Bucket ordering of an aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggSort {
    #[serde(rename = "type", default = "default_sort_type")]
    pub sort_type: SortType,
    #[serde(default = "default_sort_direction")]
    pub direction: Direction,
}

fn default_sort_type() -> SortType {
    SortType::Count
}

fn default_sort_direction() -> Direction {
    Direction::Descending
}

impl AggSort {
    pub fn new(sort_type: SortType, direction: Direction) -> Self {
        Self {
            sort_type,
            direction,
        }
    }

    pub fn count_desc() -> Self {
        Self::new(SortType::Count, Direction::Descending)
    }

    pub fn count_asc() -> Self {
        Self::new(SortType::Count, Direction::Ascending)
    }

    pub fn lexical_asc() -> Self {
        Self::new(SortType::Lexical, Direction::Ascending)
    }

    pub fn lexical_desc() -> Self {
        Self::new(SortType::Lexical, Direction::Descending)
    }
}

impl Agg {
    /// Creates an aggregation with default shared settings
    pub fn new(kind: AggKind) -> Self {
        Self {
            kind,
            key: None,
            sort: None,
            min_doc_count: default_min_doc_count(),
            aggs: Vec::new(),
            ext: Map::new(),
        }
    }

    pub fn terms(field: impl Into<String>, size: usize) -> Self {
        Self::new(AggKind::Terms {
            field: field.into(),
            size,
            missing: None,
            format: None,
        })
    }

    pub fn histogram(field: impl Into<String>, interval: f64, offset: f64) -> Self {
        Self::new(AggKind::Histogram {
            field: field.into(),
            interval,
            offset,
            missing: None,
            format: None,
        })
    }

    pub fn date_histogram(field: impl Into<String>, interval: impl Into<String>) -> Self {
        Self::new(AggKind::DateHistogram {
            field: field.into(),
            interval: interval.into(),
            offset: None,
            time_zone: None,
            missing: None,
            format: None,
        })
    }

    pub fn range(field: impl Into<String>, ranges: Vec<RangeSpec>) -> Self {
        Self::new(AggKind::Range {
            field: field.into(),
            ranges,
        })
    }

    pub fn date_range(field: impl Into<String>, ranges: Vec<RangeSpec>) -> Self {
        Self::new(AggKind::DateRange {
            field: field.into(),
            ranges,
            time_zone: None,
            format: None,
        })
    }

    pub fn filters(key: impl Into<String>, filters: IndexMap<String, Query>) -> Self {
        Self::new(AggKind::Filters { filters }).with_key(key)
    }

    pub fn stats(field: impl Into<String>) -> Self {
        Self::new(AggKind::Stats {
            field: field.into(),
        })
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(AggKind::Missing {
            field: field.into(),
        })
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(AggKind::Named { name: name.into() })
    }

    pub fn xform(key: impl Into<String>, agg: Agg, bucket: Value) -> Self {
        Self::new(AggKind::Xform {
            agg: Box::new(agg),
            bucket,
        })
        .with_key(key)
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_sort(mut self, sort: AggSort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_min_doc_count(mut self, min_doc_count: u64) -> Self {
        self.min_doc_count = min_doc_count;
        self
    }

    pub fn with_aggs(mut self, aggs: Vec<Agg>) -> Self {
        self.aggs = aggs;
        self
    }

    pub fn with_ext(mut self, name: impl Into<String>, value: Value) -> Self {
        self.ext.insert(name.into(), value);
        self
    }

    /// Sets the `missing` label of a terms, histogram or date histogram agg
    pub fn with_missing(mut self, label: impl Into<Value>) -> Self {
        match &mut self.kind {
            AggKind::Terms { missing, .. }
            | AggKind::Histogram { missing, .. }
            | AggKind::DateHistogram { missing, .. } => *missing = Some(label.into()),
            _ => {}
        }
        self
    }

    /// Result key: the explicit key, else the field, else the name
    pub fn key(&self) -> &str {
        if let Some(key) = &self.key {
            return key;
        }
        match &self.kind {
            AggKind::Named { name } => name,
            AggKind::Xform { agg, .. } => agg.key(),
            _ => self.field().unwrap_or(""),
        }
    }

    /// Returns the wire name of the kind
    pub fn op(&self) -> &'static str {
        match &self.kind {
            AggKind::Terms { .. } => "terms",
            AggKind::Histogram { .. } => "histogram",
            AggKind::DateHistogram { .. } => "date_histogram",
            AggKind::Range { .. } => "range",
            AggKind::DateRange { .. } => "date_range",
            AggKind::Filters { .. } => "filters",
            AggKind::Stats { .. } => "stats",
            AggKind::Missing { .. } => "missing",
            AggKind::GeoHash { .. } => "geo_hash",
            AggKind::GeoBounds { .. } => "geo_bounds",
            AggKind::GeoCentroid { .. } => "geo_centroid",
            AggKind::GeoDistance { .. } => "geo_distance",
            AggKind::Named { .. } => "named",
            AggKind::Native { .. } => "native",
            AggKind::Xform { .. } => "xform",
        }
    }

    /// Returns the field a fielded aggregation reads
    pub fn field(&self) -> Option<&str> {
        match &self.kind {
            AggKind::Terms { field, .. }
            | AggKind::Histogram { field, .. }
            | AggKind::DateHistogram { field, .. }
            | AggKind::Range { field, .. }
            | AggKind::DateRange { field, .. }
            | AggKind::Stats { field }
            | AggKind::Missing { field }
            | AggKind::GeoHash { field, .. }
            | AggKind::GeoBounds { field }
            | AggKind::GeoCentroid { field }
            | AggKind::GeoDistance { field, .. } => Some(field),
            AggKind::Filters { .. }
            | AggKind::Named { .. }
            | AggKind::Native { .. }
            | AggKind::Xform { .. } => None,
        }
    }

    /// Mutable access to the field of a fielded aggregation
    pub fn field_mut(&mut self) -> Option<&mut String> {
        match &mut self.kind {
            AggKind::Terms { field, .. }
            | AggKind::Histogram { field, .. }
            | AggKind::DateHistogram { field, .. }
            | AggKind::Range { field, .. }
            | AggKind::DateRange { field, .. }
            | AggKind::Stats { field }
            | AggKind::Missing { field }
            | AggKind::GeoHash { field, .. }
            | AggKind::GeoBounds { field }
            | AggKind::GeoCentroid { field }
            | AggKind::GeoDistance { field, .. } => Some(field),
            AggKind::Filters { .. }
            | AggKind::Named { .. }
            | AggKind::Native { .. }
            | AggKind::Xform { .. } => None,
        }
    }

    /// Pins the current result key so later field rewrites do not change it
    pub fn pin_key(mut self) -> Self {
        if self.key.is_none() {
            self.key = Some(self.key().to_string());
        }
        self
    }
}
