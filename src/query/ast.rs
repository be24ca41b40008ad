//! Query AST
//!
//! A closed set of filter nodes: boolean combinators plus field-level
//! predicates. Every node is an immutable value; rewrites build new trees.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node in the filter algebra
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Query {
    /// Matches every document
    #[serde(rename = "all")]
    MatchAll,
    /// All children match
    And {
        #[serde(default)]
        of: Vec<Query>,
    },
    /// At least one child matches
    Or {
        #[serde(default)]
        of: Vec<Query>,
    },
    /// No child matches
    Not {
        #[serde(default)]
        of: Vec<Query>,
    },
    /// Some value of `field` equals `value`
    Term { field: String, value: Value },
    /// Some value of `field` equals one of `value`
    Terms { field: String, value: Vec<Value> },
    /// Token match against the text of `field`
    Match {
        field: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<String>,
    },
    /// Tokens joined by spaces occur literally in `field`
    Phrase { field: String, value: Vec<String> },
    /// Some value of `field` starts with `value`
    Prefix { field: String, value: String },
    /// Glob match (`*`, `?`) against `field`
    Wildcard { field: String, value: String },
    /// Regular expression match against `field`
    Regex { field: String, value: String },
    /// Bounded comparison on `field`
    Range(RangeQuery),
    /// Bounded comparison on `field` after date coercion
    DateRange(RangeQuery),
    /// Geo point of `field` lies inside `value`
    Bbox { field: String, value: Envelope },
    /// `field` has (or lacks, when `value` is false) at least one value
    Exists {
        field: String,
        #[serde(default = "default_true")]
        value: bool,
    },
    /// Lucene query string, rewritten by a backend or transformer
    Lucene {
        query: String,
        #[serde(
            default,
            rename = "defaultField",
            skip_serializing_if = "Option::is_none"
        )]
        default_field: Option<String>,
    },
    /// Opaque backend-specific query
    Native {
        #[serde(default)]
        value: Value,
    },
    /// Reference to a named facet bucket, resolved by a transformer
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
}

fn default_true() -> bool {
    true
}

/// Bounds of a `Range` or `DateRange` query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl RangeQuery {
    /// Creates an unbounded range on `field`
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Self::default()
        }
    }

    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }

    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = Some(value.into());
        self
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    pub fn time_zone(mut self, zone: impl Into<String>) -> Self {
        self.time_zone = Some(zone.into());
        self
    }
}

/// Geographic bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Returns true if the point (`x` = longitude, `y` = latitude) lies inside
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

impl Default for Query {
    fn default() -> Self {
        Query::MatchAll
    }
}

impl Query {
    /// A query no document matches
    pub fn match_none() -> Self {
        Query::Not {
            of: vec![Query::MatchAll],
        }
    }

    pub fn and(of: Vec<Query>) -> Self {
        Query::And { of }
    }

    pub fn or(of: Vec<Query>) -> Self {
        Query::Or { of }
    }

    pub fn not(of: Vec<Query>) -> Self {
        Query::Not { of }
    }

    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Self {
        Query::Terms {
            field: field.into(),
            value: values,
        }
    }

    pub fn matches(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Match {
            field: field.into(),
            value: value.into(),
            operator: None,
        }
    }

    pub fn phrase(field: impl Into<String>, tokens: Vec<String>) -> Self {
        Query::Phrase {
            field: field.into(),
            value: tokens,
        }
    }

    pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Prefix {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn wildcard(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Wildcard {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn regex(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Regex {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn range(range: RangeQuery) -> Self {
        Query::Range(range)
    }

    pub fn date_range(range: RangeQuery) -> Self {
        Query::DateRange(range)
    }

    pub fn exists(field: impl Into<String>, value: bool) -> Self {
        Query::Exists {
            field: field.into(),
            value,
        }
    }

    pub fn named(name: impl Into<String>, value: Option<Value>) -> Self {
        Query::Named {
            name: name.into(),
            value,
        }
    }

    /// Returns the wire name of this variant
    pub fn op(&self) -> &'static str {
        match self {
            Query::MatchAll => "all",
            Query::And { .. } => "and",
            Query::Or { .. } => "or",
            Query::Not { .. } => "not",
            Query::Term { .. } => "term",
            Query::Terms { .. } => "terms",
            Query::Match { .. } => "match",
            Query::Phrase { .. } => "phrase",
            Query::Prefix { .. } => "prefix",
            Query::Wildcard { .. } => "wildcard",
            Query::Regex { .. } => "regex",
            Query::Range(_) => "range",
            Query::DateRange(_) => "date_range",
            Query::Bbox { .. } => "bbox",
            Query::Exists { .. } => "exists",
            Query::Lucene { .. } => "lucene",
            Query::Native { .. } => "native",
            Query::Named { .. } => "named",
        }
    }

    /// Returns the field a fielded query targets
    pub fn field(&self) -> Option<&str> {
        match self {
            Query::Term { field, .. }
            | Query::Terms { field, .. }
            | Query::Match { field, .. }
            | Query::Phrase { field, .. }
            | Query::Prefix { field, .. }
            | Query::Wildcard { field, .. }
            | Query::Regex { field, .. }
            | Query::Bbox { field, .. }
            | Query::Exists { field, .. } => Some(field),
            Query::Range(range) | Query::DateRange(range) => Some(&range.field),
            Query::MatchAll
            | Query::And { .. }
            | Query::Or { .. }
            | Query::Not { .. }
            | Query::Lucene { .. }
            | Query::Native { .. }
            | Query::Named { .. } => None,
        }
    }

    /// Returns a copy of a fielded query retargeted at `new_field`.
    ///
    /// Non-fielded queries are returned unchanged.
    pub fn with_field(&self, new_field: &str) -> Query {
        let mut query = self.clone();
        match &mut query {
            Query::Term { field, .. }
            | Query::Terms { field, .. }
            | Query::Match { field, .. }
            | Query::Phrase { field, .. }
            | Query::Prefix { field, .. }
            | Query::Wildcard { field, .. }
            | Query::Regex { field, .. }
            | Query::Bbox { field, .. }
            | Query::Exists { field, .. } => *field = new_field.to_string(),
            Query::Range(range) | Query::DateRange(range) => range.field = new_field.to_string(),
            Query::MatchAll
            | Query::And { .. }
            | Query::Or { .. }
            | Query::Not { .. }
            | Query::Lucene { .. }
            | Query::Native { .. }
            | Query::Named { .. } => {}
        }
        query
    }

    /// Returns true for `And`, `Or` and `Not`
    pub fn is_bool(&self) -> bool {
        matches!(self, Query::And { .. } | Query::Or { .. } | Query::Not { .. })
    }
}
