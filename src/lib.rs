//! docquery - A backend-agnostic document query and aggregation engine
//!
//! Queries and aggregations are plain data ([`query::Query`], [`agg::Agg`]).
//! Stores answer [`model::SearchRequest`]s through [`store::Searchable`];
//! [`transform`] rewrites requests and results on the way, and the
//! in-memory [`store::MapBackedStore`] evaluates them directly over any
//! [`document::Document`].

pub mod agg;
pub mod aggregation;
pub mod cli;
pub mod config;
pub mod document;
pub mod errors;
pub mod executor;
pub mod expr;
pub mod model;
pub mod observability;
pub mod query;
pub mod store;
pub mod transform;
