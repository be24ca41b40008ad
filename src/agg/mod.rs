//! Aggregation algebra
//!
//! [`Agg`] describes a facet computation; [`AggResult`] and [`Bucket`] carry
//! what was computed. Both sides serialize with an `"op"` tag like queries.

mod result;
mod spec;

pub use result::{AggResult, Bucket, Stats};
pub use spec::{Agg, AggKind, AggSort, GeoPoint, RangeSpec, SortType, DEFAULT_TERMS_SIZE};
