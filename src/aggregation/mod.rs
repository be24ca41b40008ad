//! Aggregation engine and date handling
//!
//! [`AggregationEngine`] computes bucketed facet results over in-memory
//! documents. Date values go through [`DateMathParser`], cached per time
//! zone in [`DateParsers`].

mod buckets;
mod dates;
mod engine;
mod errors;

pub use dates::{parse_offset, parse_time_zone, DateMathParser, DateParsers, DateUnit, Zone};
pub use engine::AggregationEngine;
pub use errors::{AggError, DateMathError};
