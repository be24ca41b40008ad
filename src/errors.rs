//! Crate-level error type
//!
//! `search()` either returns a complete result or fails with one of these,
//! naming the offending query or aggregation.

use thiserror::Error;

use crate::aggregation::{AggError, DateMathError};
use crate::executor::CompileError;
use crate::expr::ExprError;
use crate::query::LuceneError;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Lucene(#[from] LuceneError),

    #[error(transparent)]
    Agg(#[from] AggError),

    #[error(transparent)]
    DateMath(#[from] DateMathError),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SearchError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::Compile(e) => e.code(),
            SearchError::Lucene(e) => e.code(),
            SearchError::Agg(e) => e.code(),
            SearchError::DateMath(e) => e.code(),
            SearchError::Expr(e) => e.code(),
            SearchError::NotFound { .. } => "DOCUMENT_NOT_FOUND",
            SearchError::InvalidRequest(_) => "REQUEST_INVALID",
            SearchError::Serialization(_) => "SERIALIZATION_FAILED",
        }
    }
}

pub type SearchResultOf<T> = Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_pass_through() {
        let err: SearchError = CompileError::Unsupported { op: "native" }.into();
        assert_eq!(err.code(), "QUERY_UNSUPPORTED");
        assert_eq!(err.to_string(), "unsupported query type 'native'");

        let err: SearchError = AggError::NotImplemented {
            key: "g".into(),
            op: "geo_hash",
        }
        .into();
        assert_eq!(err.code(), "AGG_NOT_IMPLEMENTED");

        let err = SearchError::NotFound { id: "42".into() };
        assert_eq!(err.code(), "DOCUMENT_NOT_FOUND");
    }
}
