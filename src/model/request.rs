//! Search request envelope

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agg::Agg;
use crate::query::Query;

/// Default page size of a request
pub const DEFAULT_LIMIT: u64 = 10;

/// Request parameter that switches on cursor-based paging
pub const DEEP_PAGE_PARAM: &str = "deepPage";

/// Request parameter carrying the previous page's cursor
pub const LAST_KEY_PARAM: &str = "lastKey";

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// One sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocSort {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl DocSort {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Ascending)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Descending)
    }
}

/// A projected column: either a document path or a computed expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawField")]
pub struct Field {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub settings: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawField {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    expr: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    settings: Map<String, Value>,
}

impl TryFrom<RawField> for Field {
    type Error = String;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        match (&raw.name, &raw.expr) {
            (Some(_), Some(_)) => Err("field must set only one of 'name' and 'expr'".to_string()),
            (None, None) => Err("field must set one of 'name' and 'expr'".to_string()),
            _ => Ok(Field {
                name: raw.name,
                expr: raw.expr,
                label: raw.label,
                settings: raw.settings,
            }),
        }
    }
}

impl Field {
    /// A column reading a document path
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            expr: None,
            label: None,
            settings: Map::new(),
        }
    }

    /// A column computed by the expression evaluator
    pub fn computed(expr: impl Into<String>) -> Self {
        Self {
            name: None,
            expr: Some(expr.into()),
            label: None,
            settings: Map::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn expr(&self) -> Option<&str> {
        self.expr.as_deref()
    }

    /// Copy of a named column reading `name` instead. Computed columns are
    /// returned unchanged.
    pub fn renamed(&self, name: &str) -> Field {
        let mut field = self.clone();
        if field.name.is_some() {
            field.name = Some(name.to_string());
        }
        field
    }
}

/// A search: filter, ordering, page, projection and aggregations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub sorts: Vec<DocSort>,
    #[serde(default)]
    pub aggs: Vec<Agg>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default = "default_count_total")]
    pub count_total: bool,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

fn default_count_total() -> bool {
    true
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
            query: None,
            fields: Vec::new(),
            sorts: Vec::new(),
            aggs: Vec::new(),
            params: Map::new(),
            count_total: true,
        }
    }
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_sorts(mut self, sorts: Vec<DocSort>) -> Self {
        self.sorts = sorts;
        self
    }

    pub fn with_aggs(mut self, aggs: Vec<Agg>) -> Self {
        self.aggs = aggs;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// True when `params.deepPage` is `true`
    pub fn deep_page(&self) -> bool {
        self.params.get(DEEP_PAGE_PARAM) == Some(&Value::Bool(true))
    }

    /// The query, or `MatchAll` when none is set
    pub fn query_or_all(&self) -> Query {
        self.query.clone().unwrap_or_default()
    }
}
