//! Negation push-down
//!
//! `Not(c1..cn)` matches when no child matches, i.e. `And(¬c1..¬cn)`. Each
//! negated boolean child is rewritten by De Morgan's laws until only leaves
//! remain under `Not`; `Exists` absorbs the negation by flipping.

use super::pipeline::Transformer;
use super::query::QueryTransformer;
use crate::query::Query;

#[derive(Debug, Clone, Copy, Default)]
pub struct PushDownNotTransformer;

impl QueryTransformer for PushDownNotTransformer {
    fn transform_not(&self, of: &[Query]) -> Query {
        let children = of
            .iter()
            .map(|child| match child {
                Query::And { .. } | Query::Or { .. } | Query::Not { .. } | Query::Exists { .. } => {
                    self.transform(&child.negate())
                }
                leaf => Query::not(vec![self.transform(leaf)]),
            })
            .collect();
        Query::and(children).simplify()
    }
}

impl<T> Transformer<T> for PushDownNotTransformer {
    fn transform_query(&self, query: &Query) -> Query {
        self.transform(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a() -> Query {
        Query::term("a", 1)
    }

    fn b() -> Query {
        Query::term("b", 2)
    }

    fn has_bool_under_not(query: &Query) -> bool {
        match query {
            Query::Not { of } => of.iter().any(|child| child.is_bool() || has_bool_under_not(child)),
            Query::And { of } | Query::Or { of } => of.iter().any(has_bool_under_not),
            _ => false,
        }
    }

    #[test]
    fn test_de_morgan_over_and() {
        let query = Query::not(vec![Query::and(vec![a(), b()])]);
        let out = PushDownNotTransformer.transform(&query);
        assert_eq!(
            out,
            Query::or(vec![Query::not(vec![a()]), Query::not(vec![b()])])
        );
    }

    #[test]
    fn test_de_morgan_over_or() {
        let query = Query::not(vec![Query::or(vec![a(), b()])]);
        let out = PushDownNotTransformer.transform(&query);
        assert_eq!(
            out,
            Query::and(vec![Query::not(vec![a()]), Query::not(vec![b()])])
        );
    }

    #[test]
    fn test_double_not_and_exists() {
        let query = Query::not(vec![Query::not(vec![a()])]);
        assert_eq!(PushDownNotTransformer.transform(&query), a());

        let query = Query::not(vec![Query::exists("a", true)]);
        assert_eq!(PushDownNotTransformer.transform(&query), Query::exists("a", false));
    }

    #[test]
    fn test_no_boolean_left_under_not() {
        let query = Query::and(vec![
            Query::not(vec![
                Query::or(vec![a(), Query::not(vec![Query::and(vec![a(), b()])])]),
                b(),
            ]),
            Query::or(vec![Query::not(vec![Query::not(vec![b()])])]),
        ]);
        let out = PushDownNotTransformer.transform(&query);
        assert!(!has_bool_under_not(&out), "{:?}", out);
    }
}
