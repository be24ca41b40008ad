//! Query execution over in-memory documents
//!
//! - [`PredicateFilter`] compiles a query into a single-document matcher
//! - [`CompositeComparator`] orders documents by sort specifications
//!
//! Compilation is where unsupported queries fail; evaluation never fails.

mod errors;
mod filters;
mod sorter;

pub use errors::CompileError;
pub use filters::PredicateFilter;
pub use sorter::CompositeComparator;
