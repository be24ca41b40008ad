//! Observability subsystem for docquery
//!
//! Structured JSON event logging. Observability is read-only: it never
//! changes what a query or aggregation returns.
//!
//! ```ignore
//! use docquery::observability::{Logger, ObservationScope};
//!
//! Logger::warn("DATE_PARSE_FALLBACK", &[("value", "yesterday")]);
//!
//! let scope = ObservationScope::new("SEARCH");
//! // ... do work ...
//! scope.complete();
//! ```

mod logger;
mod scope;

pub use logger::{Logger, Severity};
pub use scope::ObservationScope;
