//! Predicate compilation
//!
//! A [`Query`] compiles once into a [`PredicateFilter`], which is then
//! evaluated against any number of documents. Field predicates are
//! existential: a multi-valued field matches if any one of its values does.
//! Text predicates (prefix, phrase, regex, wildcard, match) are
//! case-insensitive. Boolean groups without children match every document.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use super::errors::CompileError;
use crate::aggregation::{DateMathParser, DateParsers};
use crate::document::{as_number, compare_values, term_equals, to_text, Document};
use crate::query::{Envelope, Query, RangeQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl BoundOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            BoundOp::Gt => ordering == Ordering::Greater,
            BoundOp::Gte => ordering != Ordering::Less,
            BoundOp::Lt => ordering == Ordering::Less,
            BoundOp::Lte => ordering != Ordering::Greater,
        }
    }

    /// Upper-inclusive and lower-exclusive date bounds round up
    fn rounds_up(self) -> bool {
        matches!(self, BoundOp::Gt | BoundOp::Lte)
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Always,
    All(Vec<Matcher>),
    Any(Vec<Matcher>),
    NoneOf(Vec<Matcher>),
    Term {
        field: String,
        expected: Value,
    },
    Terms {
        field: String,
        expected: Vec<Value>,
    },
    Tokens {
        field: String,
        tokens: Vec<String>,
        require_all: bool,
    },
    Pattern {
        field: String,
        regex: Regex,
    },
    Bound {
        field: String,
        op: BoundOp,
        bound: Value,
    },
    DateBound {
        field: String,
        op: BoundOp,
        bound: i64,
        parser: Arc<DateMathParser>,
        now: DateTime<Utc>,
    },
    Within {
        field: String,
        envelope: Envelope,
    },
    Exists {
        field: String,
        expected: bool,
    },
}

/// A compiled, executable single-document matcher
#[derive(Debug, Clone)]
pub struct PredicateFilter {
    root: Matcher,
}

impl PredicateFilter {
    /// Compiles `query` with UTC date handling and the current time
    pub fn compile(query: &Query) -> Result<Self, CompileError> {
        Self::compile_with(query, &DateParsers::default(), Utc::now())
    }

    /// Compiles `query`, resolving date bounds relative to `now`
    pub fn compile_with(
        query: &Query,
        dates: &DateParsers,
        now: DateTime<Utc>,
    ) -> Result<Self, CompileError> {
        let compiler = Compiler { dates, now };
        Ok(Self {
            root: compiler.compile(query)?,
        })
    }

    /// Checks if a document matches
    pub fn matches<D: Document + ?Sized>(&self, document: &D) -> bool {
        evaluate(&self.root, document)
    }
}

struct Compiler<'a> {
    dates: &'a DateParsers,
    now: DateTime<Utc>,
}

impl Compiler<'_> {
    fn compile(&self, query: &Query) -> Result<Matcher, CompileError> {
        let matcher = match query {
            Query::MatchAll => Matcher::Always,
            Query::And { of } => Matcher::All(self.compile_all(of)?),
            Query::Or { of } => Matcher::Any(self.compile_all(of)?),
            Query::Not { of } => Matcher::NoneOf(self.compile_all(of)?),
            Query::Term { field, value } => Matcher::Term {
                field: field.clone(),
                expected: value.clone(),
            },
            Query::Terms { field, value } => Matcher::Terms {
                field: field.clone(),
                expected: value.clone(),
            },
            Query::Match {
                field,
                value,
                operator,
            } => {
                let tokens = tokenize(value);
                if tokens.is_empty() {
                    Matcher::Always
                } else {
                    Matcher::Tokens {
                        field: field.clone(),
                        tokens,
                        require_all: operator
                            .as_deref()
                            .is_some_and(|op| op.eq_ignore_ascii_case("and")),
                    }
                }
            }
            Query::Phrase { field, value } => {
                pattern(field, &regex::escape(&value.join(" ")))?
            }
            Query::Prefix { field, value } => {
                pattern(field, &format!("^{}", regex::escape(value)))?
            }
            Query::Wildcard { field, value } => {
                pattern(field, &format!("^{}$", glob_to_regex(value)))?
            }
            Query::Regex { field, value } => pattern(field, &format!("^(?:{})$", value))?,
            Query::Range(range) => Matcher::All(
                range_bounds(range)
                    .into_iter()
                    .map(|(op, bound)| Matcher::Bound {
                        field: range.field.clone(),
                        op,
                        bound: bound.clone(),
                    })
                    .collect(),
            ),
            Query::DateRange(range) => self.compile_date_range(range)?,
            Query::Bbox { field, value } => Matcher::Within {
                field: field.clone(),
                envelope: *value,
            },
            Query::Exists { field, value } => Matcher::Exists {
                field: field.clone(),
                expected: *value,
            },
            Query::Lucene { .. } | Query::Native { .. } | Query::Named { .. } => {
                return Err(CompileError::Unsupported { op: query.op() });
            }
        };
        Ok(matcher)
    }

    fn compile_all(&self, queries: &[Query]) -> Result<Vec<Matcher>, CompileError> {
        queries.iter().map(|q| self.compile(q)).collect()
    }

    fn compile_date_range(&self, range: &RangeQuery) -> Result<Matcher, CompileError> {
        let parser = self
            .dates
            .get(range.time_zone.as_deref())
            .map_err(|source| CompileError::InvalidDate {
                field: range.field.clone(),
                source,
            })?;
        let mut bounds = Vec::new();
        for (op, bound) in range_bounds(range) {
            let instant = parser
                .resolve_bound(bound, self.now, op.rounds_up())
                .map_err(|source| CompileError::InvalidDate {
                    field: range.field.clone(),
                    source,
                })?;
            bounds.push(Matcher::DateBound {
                field: range.field.clone(),
                op,
                bound: instant.timestamp_millis(),
                parser: Arc::clone(&parser),
                now: self.now,
            });
        }
        Ok(Matcher::All(bounds))
    }
}

fn range_bounds(range: &RangeQuery) -> Vec<(BoundOp, &Value)> {
    [
        (BoundOp::Gt, &range.gt),
        (BoundOp::Gte, &range.gte),
        (BoundOp::Lt, &range.lt),
        (BoundOp::Lte, &range.lte),
    ]
    .into_iter()
    .filter_map(|(op, bound)| match bound {
        Some(value) if !value.is_null() => Some((op, value)),
        _ => None,
    })
    .collect()
}

fn pattern(field: &str, source: &str) -> Result<Matcher, CompileError> {
    let regex = RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|e| CompileError::InvalidPattern {
            field: field.to_string(),
            pattern: source.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Matcher::Pattern {
        field: field.to_string(),
        regex,
    })
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn point_of(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::Object(map) => {
            let lat = map.get("lat").and_then(as_number)?;
            let lon = map.get("lon").and_then(as_number)?;
            Some((lon, lat))
        }
        Value::String(text) => {
            let (lat, lon) = text.split_once(',')?;
            let lat = lat.trim().parse().ok()?;
            let lon = lon.trim().parse().ok()?;
            Some((lon, lat))
        }
        _ => None,
    }
}

fn evaluate<D: Document + ?Sized>(matcher: &Matcher, document: &D) -> bool {
    match matcher {
        Matcher::Always => true,
        Matcher::All(children) => children.iter().all(|c| evaluate(c, document)),
        Matcher::Any(children) => {
            children.is_empty() || children.iter().any(|c| evaluate(c, document))
        }
        Matcher::NoneOf(children) => !children.iter().any(|c| evaluate(c, document)),
        Matcher::Term { field, expected } => {
            let values = document.resolve(field);
            if expected.is_null() {
                values.is_empty()
            } else {
                values.iter().any(|v| term_equals(v, expected))
            }
        }
        Matcher::Terms { field, expected } => {
            let values = document.resolve(field);
            expected.iter().any(|e| {
                if e.is_null() {
                    values.is_empty()
                } else {
                    values.iter().any(|v| term_equals(v, e))
                }
            })
        }
        Matcher::Tokens {
            field,
            tokens,
            require_all,
        } => {
            let present: Vec<String> = document
                .resolve(field)
                .iter()
                .flat_map(|v| tokenize(&to_text(v)))
                .collect();
            let found = |token: &String| present.contains(token);
            if *require_all {
                tokens.iter().all(found)
            } else {
                tokens.iter().any(found)
            }
        }
        Matcher::Pattern { field, regex } => document
            .resolve(field)
            .iter()
            .any(|v| regex.is_match(&to_text(v))),
        Matcher::Bound { field, op, bound } => document
            .resolve(field)
            .iter()
            .any(|v| op.accepts(compare_values(v, bound))),
        Matcher::DateBound {
            field,
            op,
            bound,
            parser,
            now,
        } => document.resolve(field).iter().any(|v| {
            parser
                .coerce(v, *now)
                .is_some_and(|instant| op.accepts(instant.timestamp_millis().cmp(bound)))
        }),
        Matcher::Within { field, envelope } => document
            .resolve(field)
            .iter()
            .filter_map(point_of)
            .any(|(x, y)| envelope.contains(x, y)),
        Matcher::Exists { field, expected } => !document.resolve(field).is_empty() == *expected,
    }
}
