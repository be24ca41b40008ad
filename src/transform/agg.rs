//! Aggregation rewriting by variant

use crate::agg::{Agg, AggKind};

/// Rewrites an aggregation and its nested aggregations.
///
/// [`AggTransformer::transform_agg`] rewrites the node itself through
/// [`AggTransformer::transform_kind`], then recurses into the nested `aggs`
/// and into the wrapped agg of an `Xform`.
pub trait AggTransformer: Send + Sync {
    fn transform_agg(&self, agg: &Agg) -> Agg {
        let mut out = self.transform_kind(agg);
        out.aggs = out.aggs.iter().map(|nested| self.transform_agg(nested)).collect();
        if let AggKind::Xform { agg: inner, .. } = &mut out.kind {
            **inner = self.transform_agg(inner);
        }
        out
    }

    fn transform_kind(&self, agg: &Agg) -> Agg {
        agg.clone()
    }

    fn transform_aggs(&self, aggs: &[Agg]) -> Vec<Agg> {
        aggs.iter().map(|agg| self.transform_agg(agg)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Prefix;

    impl AggTransformer for Prefix {
        fn transform_kind(&self, agg: &Agg) -> Agg {
            let mut out = agg.clone().pin_key();
            if let Some(field) = out.field_mut() {
                *field = format!("doc.{}", field);
            }
            out
        }
    }

    #[test]
    fn test_recurses_into_nested_and_xform() {
        let agg = Agg::terms("status", 5).with_aggs(vec![Agg::stats("price")]);
        let wrapped = Agg::xform("wrapped", agg, json!({}));

        let out = Prefix.transform_agg(&wrapped);
        let AggKind::Xform { agg: inner, .. } = &out.kind else {
            panic!("expected xform");
        };
        assert_eq!(inner.field(), Some("doc.status"));
        assert_eq!(inner.key(), "status");
        assert_eq!(inner.aggs[0].field(), Some("doc.price"));
    }
}
