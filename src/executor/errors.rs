//! Predicate compiler errors
//!
//! Error codes:
//! - QUERY_UNSUPPORTED
//! - QUERY_INVALID_PATTERN
//! - QUERY_INVALID_DATE
//!
//! Compilation fails before any document is evaluated. Per-document
//! failures never surface; they evaluate to "no match".

use thiserror::Error;

use crate::aggregation::DateMathError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A variant that must be rewritten by a transformer before compiling
    #[error("unsupported query type '{op}'")]
    Unsupported { op: &'static str },

    #[error("invalid pattern '{pattern}' for field '{field}': {reason}")]
    InvalidPattern {
        field: String,
        pattern: String,
        reason: String,
    },

    #[error("invalid date bound for field '{field}': {source}")]
    InvalidDate {
        field: String,
        #[source]
        source: DateMathError,
    },
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::Unsupported { .. } => "QUERY_UNSUPPORTED",
            CompileError::InvalidPattern { .. } => "QUERY_INVALID_PATTERN",
            CompileError::InvalidDate { .. } => "QUERY_INVALID_DATE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = CompileError::Unsupported { op: "lucene" };
        assert_eq!(err.code(), "QUERY_UNSUPPORTED");
        assert_eq!(err.to_string(), "unsupported query type 'lucene'");

        let err = CompileError::InvalidDate {
            field: "created".into(),
            source: DateMathError::Unparseable("soon".into()),
        };
        assert_eq!(err.code(), "QUERY_INVALID_DATE");
        assert!(err.to_string().contains("soon"));
    }
}
