//! Query Algebra Laws
//!
//! Property tests over random queries and documents:
//! - simplify is idempotent and preserves matching
//! - negate is the complement, so double negation is the identity
//! - pushing negation down preserves matching and leaves no group under Not

use docquery::executor::PredicateFilter;
use docquery::query::{Envelope, Query, RangeQuery};
use docquery::transform::{PushDownNotTransformer, QueryTransformer};
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

// =============================================================================
// Strategies
// =============================================================================

fn field() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("a"), Just("b"), Just("tags")]
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![(0..3i64).prop_map(|v| json!(v)), Just(Value::Null)]
}

fn word() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("red"), Just("green"), Just("blue")]
}

fn leaf() -> impl Strategy<Value = Query> {
    let fields = prop_oneof![
        Just(Query::MatchAll),
        (field(), 0..3i64).prop_map(|(f, v)| Query::term(f, v)),
        (field(), vec(scalar(), 0..3)).prop_map(|(f, v)| Query::terms(f, v)),
        (field(), any::<bool>()).prop_map(|(f, e)| Query::exists(f, e)),
        (field(), 0..3i64).prop_map(|(f, v)| Query::range(RangeQuery::new(f).gte(v))),
        (field(), 0..3i64).prop_map(|(f, v)| Query::range(RangeQuery::new(f).lt(v))),
    ];
    let text = prop_oneof![
        word().prop_map(|w| Query::prefix("title", &w[..2])),
        word().prop_map(|w| Query::regex("title", format!("{}.*", w))),
        word().prop_map(|w| Query::wildcard("title", format!("*{}?", &w[..w.len() - 1]))),
        (word(), word()).prop_map(|(x, y)| Query::phrase("title", vec![x.into(), y.into()])),
        (word(), word()).prop_map(|(x, y)| Query::matches("title", format!("{} {}", x, y))),
    ];
    let other = prop_oneof![
        (1..28u32).prop_map(|day| Query::date_range(
            RangeQuery::new("when").gte(format!("2024-02-{:02}", day))
        )),
        (-2..2i32, -2..2i32).prop_map(|(x, y)| Query::Bbox {
            field: "loc".into(),
            value: Envelope {
                min_x: f64::from(x),
                min_y: f64::from(y),
                max_x: f64::from(x) + 1.5,
                max_y: f64::from(y) + 1.5,
            },
        }),
    ];
    prop_oneof![fields, text, other]
}

/// Boolean groups may be empty
fn query() -> impl Strategy<Value = Query> {
    leaf().prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Query::and),
            vec(inner.clone(), 0..4).prop_map(Query::or),
            vec(inner, 0..4).prop_map(Query::not),
        ]
    })
}

fn document() -> impl Strategy<Value = Value> {
    (
        option::of(0..3i64),
        option::of(0..3i64),
        option::of(vec(0..3i64, 0..3)),
        option::of(vec(word(), 0..4)),
        option::of(1..28u32),
        option::of((-2..2i32, -2..2i32)),
    )
        .prop_map(|(a, b, tags, title, when, loc)| {
            let mut doc = Map::new();
            if let Some(a) = a {
                doc.insert("a".into(), json!(a));
            }
            if let Some(b) = b {
                doc.insert("b".into(), json!(b));
            }
            if let Some(tags) = tags {
                doc.insert("tags".into(), json!(tags));
            }
            if let Some(title) = title {
                doc.insert("title".into(), json!(title.join(" ")));
            }
            if let Some(day) = when {
                doc.insert("when".into(), json!(format!("2024-02-{:02}T12:00:00Z", day)));
            }
            if let Some((lon, lat)) = loc {
                doc.insert("loc".into(), json!({"lat": lat, "lon": lon}));
            }
            Value::Object(doc)
        })
}

// =============================================================================
// Helper Functions
// =============================================================================

fn matches(query: &Query, doc: &Value) -> bool {
    PredicateFilter::compile(query).unwrap().matches(doc)
}

fn has_group_under_not(query: &Query) -> bool {
    match query {
        Query::Not { of } => of.iter().any(|child| {
            matches!(
                child,
                Query::And { .. } | Query::Or { .. } | Query::Not { .. } | Query::Exists { .. }
            ) || has_group_under_not(child)
        }),
        Query::And { of } | Query::Or { of } => of.iter().any(has_group_under_not),
        _ => false,
    }
}

// =============================================================================
// Laws
// =============================================================================

proptest! {
    #[test]
    fn simplify_is_idempotent(q in query()) {
        let once = q.simplify();
        prop_assert_eq!(once.simplify(), once);
    }

    #[test]
    fn simplify_preserves_matching(q in query(), doc in document()) {
        prop_assert_eq!(matches(&q.simplify(), &doc), matches(&q, &doc));
    }

    #[test]
    fn negate_is_complement(q in query(), doc in document()) {
        prop_assert_eq!(matches(&q.negate(), &doc), !matches(&q, &doc));
    }

    #[test]
    fn double_negation_is_identity(q in query(), doc in document()) {
        prop_assert_eq!(matches(&q.negate().negate(), &doc), matches(&q, &doc));
    }

    #[test]
    fn push_down_not_preserves_matching(q in query(), doc in document()) {
        let pushed = PushDownNotTransformer.transform(&q);
        prop_assert_eq!(matches(&pushed, &doc), matches(&q, &doc));
        prop_assert!(!has_group_under_not(&pushed));
    }
}
