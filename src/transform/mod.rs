//! Query, aggregation and request rewriting
//!
//! - [`QueryTransformer`] and [`AggTransformer`] rewrite the algebras by variant
//! - [`Transformer`] wraps one search: request on the way in, result on the way out
//! - [`TransformerChain`] composes transformers in order
//!
//! Stages:
//!
//! | Stage                        | Rewrites                                  |
//! |------------------------------|-------------------------------------------|
//! | [`LuceneTransformer`]        | query, `Lucene` strings into the algebra  |
//! | [`SimplifyTransformer`]      | query, by [`Query::simplify`](crate::query::Query::simplify) |
//! | [`PushDownNotTransformer`]   | query, `Not` over boolean groups          |
//! | [`FieldAliasTransformer`]    | query, aggs, sorts and fields             |
//! | [`DeepPagingTransformer`]    | sorts, fields, query; publishes `lastKey` |
//! | [`NamedTransformer`]         | named queries and aggs                    |
//! | [`SourceFormatAggTransformer`] | agg formats                             |
//! | [`XformTransformer`]         | xform aggs and their result buckets       |

mod agg;
mod deep_paging;
mod extensions;
mod field_alias;
mod lucene;
mod named;
mod pipeline;
mod push_down_not;
mod query;
mod simplify;
mod xform;

pub use agg::AggTransformer;
pub use deep_paging::DeepPagingTransformer;
pub use extensions::{
    ExtensionsTransformer, KeyAggTransformer, SourceFormatAggTransformer, SOURCE_FORMAT_EXT,
};
pub use field_alias::FieldAliasTransformer;
pub use lucene::{LuceneTransformer, DEFAULT_LUCENE_FIELD};
pub use named::{NamedTransformer, TIME_ZONE_PARAM};
pub use pipeline::{Transformer, TransformerChain};
pub use push_down_not::PushDownNotTransformer;
pub use query::QueryTransformer;
pub use simplify::SimplifyTransformer;
pub use xform::XformTransformer;
