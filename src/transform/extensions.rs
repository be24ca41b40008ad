//! Aggregation setting overrides: result key, extension settings and
//! source formats.

use serde_json::{Map, Value};

use super::agg::AggTransformer;
use super::pipeline::Transformer;
use crate::agg::{Agg, AggKind};
use crate::errors::SearchError;
use crate::model::SearchRequest;

/// Extension key carrying a format passed through to the source
pub const SOURCE_FORMAT_EXT: &str = "sourceFormat";

/// Sets the result key of the top-level aggregation
#[derive(Debug, Clone)]
pub struct KeyAggTransformer {
    key: String,
}

impl KeyAggTransformer {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl AggTransformer for KeyAggTransformer {
    fn transform_agg(&self, agg: &Agg) -> Agg {
        agg.clone().with_key(self.key.as_str())
    }
}

/// Overrides settings of the top-level aggregation from an extension map.
///
/// - `size` (number): terms size
/// - `interval`: histogram interval (number) or date histogram interval (string)
/// - `timeZone` (string): date histogram and date range time zone
#[derive(Debug, Clone, Default)]
pub struct ExtensionsTransformer {
    ext: Map<String, Value>,
}

impl ExtensionsTransformer {
    pub fn new(ext: Map<String, Value>) -> Self {
        Self { ext }
    }

    fn string(&self, name: &str) -> Option<String> {
        self.ext.get(name).and_then(Value::as_str).map(str::to_string)
    }
}

impl AggTransformer for ExtensionsTransformer {
    fn transform_agg(&self, agg: &Agg) -> Agg {
        self.transform_kind(agg)
    }

    fn transform_kind(&self, agg: &Agg) -> Agg {
        let mut out = agg.clone();
        match &mut out.kind {
            AggKind::Terms { size, .. } => {
                if let Some(value) = self.ext.get("size").and_then(Value::as_u64) {
                    *size = usize::try_from(value).unwrap_or(usize::MAX);
                }
            }
            AggKind::Histogram { interval, .. } => {
                if let Some(value) = self.ext.get("interval").and_then(Value::as_f64) {
                    *interval = value;
                }
            }
            AggKind::DateHistogram {
                interval,
                time_zone,
                ..
            } => {
                if let Some(value) = self.string("interval") {
                    *interval = value;
                }
                if let Some(value) = self.string("timeZone") {
                    *time_zone = Some(value);
                }
            }
            AggKind::DateRange { time_zone, .. } => {
                if let Some(value) = self.string("timeZone") {
                    *time_zone = Some(value);
                }
            }
            AggKind::Range { .. }
            | AggKind::Filters { .. }
            | AggKind::Stats { .. }
            | AggKind::Missing { .. }
            | AggKind::GeoHash { .. }
            | AggKind::GeoBounds { .. }
            | AggKind::GeoCentroid { .. }
            | AggKind::GeoDistance { .. }
            | AggKind::Named { .. }
            | AggKind::Native { .. }
            | AggKind::Xform { .. } => {}
        }
        out
    }
}

/// Moves a string `sourceFormat` extension into the `format` of terms, date
/// histogram and date range aggregations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceFormatAggTransformer;

impl AggTransformer for SourceFormatAggTransformer {
    fn transform_kind(&self, agg: &Agg) -> Agg {
        let Some(Value::String(source_format)) = agg.ext.get(SOURCE_FORMAT_EXT) else {
            return agg.clone();
        };
        let source_format = source_format.clone();
        let mut out = agg.clone();
        match &mut out.kind {
            AggKind::Terms { format, .. }
            | AggKind::DateHistogram { format, .. }
            | AggKind::DateRange { format, .. } => {
                *format = Some(source_format);
                out.ext.remove(SOURCE_FORMAT_EXT);
            }
            _ => {}
        }
        out
    }
}

impl<T> Transformer<T> for SourceFormatAggTransformer {
    fn transform_request(&self, request: SearchRequest) -> Result<SearchRequest, SearchError> {
        Ok(SearchRequest {
            aggs: self.transform_aggs(&request.aggs),
            ..request
        })
    }
}
