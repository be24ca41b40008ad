//! Aggregation and date math errors
//!
//! Error codes:
//! - AGG_UNKNOWN_INTERVAL
//! - AGG_INVALID_SETTING
//! - AGG_INVALID_FILTER
//! - AGG_UNRESOLVED_NAMED
//! - AGG_UNRESOLVED_XFORM
//! - AGG_NOT_IMPLEMENTED
//! - DATE_UNPARSEABLE
//! - DATE_INVALID_MATH
//! - DATE_UNKNOWN_TIME_ZONE

use thiserror::Error;

use crate::executor::CompileError;

/// Failure to parse a date or a date math expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateMathError {
    #[error("unparseable date '{0}'")]
    Unparseable(String),

    #[error("invalid date math expression '{expr}': {reason}")]
    InvalidMath { expr: String, reason: String },

    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),
}

impl DateMathError {
    pub fn code(&self) -> &'static str {
        match self {
            DateMathError::Unparseable(_) => "DATE_UNPARSEABLE",
            DateMathError::InvalidMath { .. } => "DATE_INVALID_MATH",
            DateMathError::UnknownTimeZone(_) => "DATE_UNKNOWN_TIME_ZONE",
        }
    }
}

/// Failure to evaluate an aggregation, identifying the offending agg by key
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggError {
    #[error("aggregation '{key}': unknown date histogram interval '{interval}'")]
    UnknownInterval { key: String, interval: String },

    #[error("aggregation '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("aggregation '{key}': filter '{filter}' cannot be compiled: {source}")]
    InvalidFilter {
        key: String,
        filter: String,
        #[source]
        source: CompileError,
    },

    #[error("named aggregation '{name}' was not resolved before evaluation")]
    UnresolvedNamed { name: String },

    #[error("xform aggregation '{key}' was not unwrapped before evaluation")]
    UnresolvedXform { key: String },

    #[error("aggregation '{key}' of type '{op}' is not implemented by the in-memory engine")]
    NotImplemented { key: String, op: &'static str },
}

impl AggError {
    pub fn code(&self) -> &'static str {
        match self {
            AggError::UnknownInterval { .. } => "AGG_UNKNOWN_INTERVAL",
            AggError::InvalidSetting { .. } => "AGG_INVALID_SETTING",
            AggError::InvalidFilter { .. } => "AGG_INVALID_FILTER",
            AggError::UnresolvedNamed { .. } => "AGG_UNRESOLVED_NAMED",
            AggError::UnresolvedXform { .. } => "AGG_UNRESOLVED_XFORM",
            AggError::NotImplemented { .. } => "AGG_NOT_IMPLEMENTED",
        }
    }

    /// True for aggregation kinds the in-memory engine does not evaluate
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, AggError::NotImplemented { .. })
    }
}
