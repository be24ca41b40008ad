//! Aggregation results

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::Query;

/// Streaming numeric summary. `min`, `max` and `avg` are `None` iff `count == 0`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

impl Stats {
    /// Accumulates `values` in one pass
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut stats = Stats::default();
        for value in values {
            stats.add(value);
        }
        stats
    }

    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.avg = Some(self.sum / self.count as f64);
    }
}

/// One partition of the matched set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: Value,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
    /// Query selecting exactly the documents of this bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggs: Option<IndexMap<String, AggResult>>,
}

impl Bucket {
    pub fn new(key: impl Into<Value>, count: u64) -> Self {
        Self {
            key: key.into(),
            count,
            label: None,
            stats: None,
            from: None,
            to: None,
            query: None,
            aggs: None,
        }
    }
}

/// Result of one aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggResult {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buckets: Option<Vec<Bucket>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AggResult {
    pub fn new(key: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            buckets: None,
            stats: None,
            value: None,
            op: op.into(),
            field: None,
        }
    }

    pub fn with_buckets(mut self, buckets: Vec<Bucket>) -> Self {
        self.buckets = Some(buckets);
        self
    }

    pub fn with_field(mut self, field: Option<&str>) -> Self {
        self.field = field.map(str::to_string);
        self
    }

    /// Finds a bucket by key
    pub fn bucket(&self, key: &Value) -> Option<&Bucket> {
        self.buckets.as_ref()?.iter().find(|b| &b.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_stats() {
        let stats = Stats::from_values(Vec::new());
        assert_eq!(stats.count, 0);
        assert_eq!(stats.sum, 0.0);
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, None);
        assert_eq!(stats.avg, None);

        let encoded = serde_json::to_value(&stats).unwrap();
        assert_eq!(
            encoded,
            json!({"count": 0, "sum": 0.0, "min": null, "max": null, "avg": null})
        );
    }

    #[test]
    fn test_stats_accumulate() {
        let stats = Stats::from_values(vec![2.0, 8.0, 5.0]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum, 15.0);
        assert_eq!(stats.min, Some(2.0));
        assert_eq!(stats.max, Some(8.0));
        assert_eq!(stats.avg, Some(5.0));
    }

    #[test]
    fn test_find_bucket() {
        let result = AggResult::new("status", "terms")
            .with_buckets(vec![Bucket::new("open", 3), Bucket::new("closed", 1)]);
        assert_eq!(result.bucket(&json!("closed")).map(|b| b.count), Some(1));
        assert!(result.bucket(&json!("other")).is_none());
    }
}
