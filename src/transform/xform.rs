//! Xform aggregations
//!
//! An `Xform { agg, bucket }` runs its wrapped agg (with the xform's
//! extensions applied) and rebuilds every result bucket from the `bucket`
//! template through the expression evaluator. A template that evaluates to
//! `null` drops the bucket.

use std::cmp::Ordering;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Value};

use super::agg::AggTransformer;
use super::extensions::ExtensionsTransformer;
use super::pipeline::Transformer;
use crate::agg::{Agg, AggKind, AggResult, Bucket, SortType};
use crate::document::compare_values;
use crate::errors::SearchError;
use crate::expr::ExprEvaluator;
use crate::model::{Direction, SearchRequest, SearchResult};

pub struct XformTransformer {
    evaluator: Arc<dyn ExprEvaluator>,
}

impl XformTransformer {
    pub fn new(evaluator: Arc<dyn ExprEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Reshapes the results of `aggs`, looked up by the keys their unwrapped
    /// form produced. Results with no requesting agg are kept at the end.
    fn reshape_all(
        &self,
        request: &Value,
        aggs: &[Agg],
        mut results: IndexMap<String, AggResult>,
    ) -> Result<IndexMap<String, AggResult>, SearchError> {
        let mut out = IndexMap::with_capacity(results.len());
        for agg in aggs {
            if let Some(result) = results.shift_remove(source_key(agg)) {
                let result = self.reshape_agg(request, agg, result)?;
                out.insert(result.key.clone(), result);
            }
        }
        out.extend(results);
        Ok(out)
    }

    fn reshape_agg(
        &self,
        request: &Value,
        agg: &Agg,
        mut result: AggResult,
    ) -> Result<AggResult, SearchError> {
        if let AggKind::Xform { agg: inner, bucket } = &agg.kind {
            let result = self.reshape_agg(request, inner, result)?;
            return self.reshape(request, agg, bucket, result);
        }
        if !agg.aggs.is_empty() {
            for bucket in result.buckets.iter_mut().flatten() {
                if let Some(nested) = bucket.aggs.take() {
                    bucket.aggs = Some(self.reshape_all(request, &agg.aggs, nested)?);
                }
            }
        }
        Ok(result)
    }

    fn reshape(
        &self,
        request: &Value,
        xform: &Agg,
        template: &Value,
        mut result: AggResult,
    ) -> Result<AggResult, SearchError> {
        if let Some(buckets) = result.buckets.take() {
            let scope = Value::Object(xform.ext.clone());
            let mut reshaped = Vec::with_capacity(buckets.len());
            for bucket in buckets {
                let bucket_value = serde_json::to_value(&bucket)?;
                let context = json!({
                    "request": request,
                    "scope": scope,
                    "bucket": bucket_value,
                    "fieldValues": {"bucket": bucket_value},
                });
                let value = self.evaluator.evaluate(template, &context)?;
                if !value.is_null() {
                    reshaped.push(serde_json::from_value::<Bucket>(value)?);
                }
            }
            sort_buckets(&mut reshaped, xform);
            result.buckets = Some(reshaped);
        }
        result.key = xform.key().to_string();
        Ok(result)
    }
}

/// Key of the result an agg produces once every `Xform` in it is unwrapped
fn source_key(agg: &Agg) -> &str {
    match &agg.kind {
        AggKind::Xform { agg: inner, .. } => source_key(inner),
        _ => agg.key(),
    }
}

fn contains_xform(aggs: &[Agg]) -> bool {
    aggs.iter().any(|agg| {
        matches!(agg.kind, AggKind::Xform { .. }) || contains_xform(&agg.aggs)
    })
}

fn sort_buckets(buckets: &mut [Bucket], xform: &Agg) {
    let Some(sort) = xform.sort else {
        return;
    };
    let ordering = |a: &Bucket, b: &Bucket| match sort.sort_type {
        SortType::Count => a.count.cmp(&b.count),
        SortType::Lexical => compare_values(&a.key, &b.key),
        SortType::None => Ordering::Equal,
    };
    buckets.sort_by(|a, b| match sort.direction {
        Direction::Ascending => ordering(a, b),
        Direction::Descending => ordering(b, a),
    });
}

/// Replaces every `Xform`, at any depth, with its wrapped agg
struct Unwrap;

impl AggTransformer for Unwrap {
    fn transform_kind(&self, agg: &Agg) -> Agg {
        match &agg.kind {
            AggKind::Xform { agg: inner, .. } => {
                let inner = ExtensionsTransformer::new(agg.ext.clone()).transform_agg(inner);
                self.transform_kind(&inner)
            }
            _ => agg.clone(),
        }
    }
}

impl<T> Transformer<T> for XformTransformer {
    fn transform_request(&self, request: SearchRequest) -> Result<SearchRequest, SearchError> {
        Ok(SearchRequest {
            aggs: Unwrap.transform_aggs(&request.aggs),
            ..request
        })
    }

    fn transform_result(
        &self,
        request: &SearchRequest,
        mut result: SearchResult<T>,
    ) -> Result<SearchResult<T>, SearchError> {
        if !contains_xform(&request.aggs) {
            return Ok(result);
        }
        let encoded = serde_json::to_value(request)?;
        let aggs = std::mem::take(&mut result.aggs);
        result.aggs = self.reshape_all(&encoded, &request.aggs, aggs)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agg::AggSort;
    use crate::expr::PathTemplate;

    fn transformer() -> XformTransformer {
        XformTransformer::new(Arc::new(PathTemplate))
    }

    fn template() -> Value {
        json!({"key": "${bucket.label}", "count": "${bucket.count}"})
    }

    #[test]
    fn test_request_unwraps_with_extensions() {
        let agg = Agg::xform("by_label", Agg::terms("status", 10), template())
            .with_ext("size", json!(3));
        let request = SearchRequest::new().with_aggs(vec![agg, Agg::stats("price")]);
        let out = Transformer::<Value>::transform_request(&transformer(), request).unwrap();
        assert!(matches!(out.aggs[0].kind, AggKind::Terms { size: 3, .. }));
        assert_eq!(out.aggs[0].key(), "status");
        assert_eq!(out.aggs[1], Agg::stats("price"));
    }

    #[test]
    fn test_result_buckets_are_rebuilt_and_sorted() {
        let xform = Agg::xform("by_label", Agg::terms("status", 10), template())
            .with_sort(AggSort::count_asc());
        let request = SearchRequest::new().with_aggs(vec![xform, Agg::stats("price")]);

        let mut open = Bucket::new(json!("o"), 5);
        open.label = Some("Open".to_string());
        let mut closed = Bucket::new(json!("c"), 2);
        closed.label = Some("Closed".to_string());

        let mut result: SearchResult<Value> = SearchResult::default();
        result
            .aggs
            .insert("price".into(), AggResult::new("price", "stats"));
        result.aggs.insert(
            "status".into(),
            AggResult::new("status", "terms").with_buckets(vec![open, closed]),
        );

        let out = transformer().transform_result(&request, result).unwrap();
        let keys: Vec<&String> = out.aggs.keys().collect();
        assert_eq!(keys, vec!["by_label", "price"]);

        let reshaped = &out.aggs["by_label"];
        assert_eq!(reshaped.key, "by_label");
        let buckets = reshaped.buckets.as_ref().unwrap();
        assert_eq!(buckets[0].key, json!("Closed"));
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[1].key, json!("Open"));
    }

    #[test]
    fn test_null_template_drops_bucket() {
        let xform = Agg::xform("x", Agg::terms("status", 10), json!("${bucket.nothing}"));
        let request = SearchRequest::new().with_aggs(vec![xform]);
        let mut result: SearchResult<Value> = SearchResult::default();
        result.aggs.insert(
            "status".into(),
            AggResult::new("status", "terms").with_buckets(vec![Bucket::new(json!("a"), 1)]),
        );
        let out = transformer().transform_result(&request, result).unwrap();
        assert!(out.aggs["x"].buckets.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_nested_xform_is_unwrapped_and_reshaped() {
        let nested = Agg::xform(
            "renamed",
            Agg::terms("s", 10),
            json!({"key": "X", "count": 99}),
        );
        let request =
            SearchRequest::new().with_aggs(vec![Agg::terms("k", 10).with_aggs(vec![nested])]);

        let out = Transformer::<Value>::transform_request(&transformer(), request.clone()).unwrap();
        assert!(matches!(out.aggs[0].aggs[0].kind, AggKind::Terms { .. }));
        assert_eq!(out.aggs[0].aggs[0].key(), "s");

        let mut outer = Bucket::new(json!("x"), 1);
        let mut inner = IndexMap::new();
        inner.insert(
            "s".to_string(),
            AggResult::new("s", "terms").with_buckets(vec![Bucket::new(json!("x"), 1)]),
        );
        outer.aggs = Some(inner);
        let mut result: SearchResult<Value> = SearchResult::default();
        result.aggs.insert(
            "k".into(),
            AggResult::new("k", "terms").with_buckets(vec![outer]),
        );

        let out = transformer().transform_result(&request, result).unwrap();
        let nested = &out.aggs["k"].buckets.as_ref().unwrap()[0]
            .aggs
            .as_ref()
            .unwrap()["renamed"];
        let buckets = nested.buckets.as_ref().unwrap();
        assert_eq!(buckets[0].key, json!("X"));
        assert_eq!(buckets[0].count, 99);
    }

    #[test]
    fn test_lexical_sort_orders_numeric_keys_by_value() {
        let xform = Agg::xform(
            "sizes",
            Agg::terms("size", 10),
            json!({"key": "${bucket.key}", "count": "${bucket.count}"}),
        )
        .with_sort(AggSort::lexical_asc());
        let request = SearchRequest::new().with_aggs(vec![xform]);
        let mut result: SearchResult<Value> = SearchResult::default();
        result.aggs.insert(
            "size".into(),
            AggResult::new("size", "terms").with_buckets(vec![
                Bucket::new(json!(10), 1),
                Bucket::new(json!(9), 1),
            ]),
        );
        let out = transformer().transform_result(&request, result).unwrap();
        let keys: Vec<&Value> = out.aggs["sizes"]
            .buckets
            .as_ref()
            .unwrap()
            .iter()
            .map(|bucket| &bucket.key)
            .collect();
        assert_eq!(keys, vec![&json!(9), &json!(10)]);
    }
}
