//! Query algebra for docquery
//!
//! Filters are trees of [`Query`] nodes. The tree is a plain value type:
//! `simplify()` and `negate()` return new trees, transformers rewrite trees,
//! and compilers (the in-memory predicate compiler, backend translators)
//! consume them. Compilers must match every variant exhaustively.

mod algebra;
mod ast;
mod lucene;

pub use ast::{Envelope, Query, RangeQuery};
pub use lucene::{parse_lucene, LuceneError};
