//! Boolean algebra over queries: structural simplification and negation.

use super::ast::Query;

impl Query {
    /// Returns a semantically equivalent, structurally reduced query.
    ///
    /// - `And`: nested `And` children are flattened, `MatchAll` children are
    ///   dropped, no children left means `MatchAll`, one child collapses.
    /// - `Or`: nested `Or` children are flattened, any `MatchAll` child makes
    ///   the whole group `MatchAll`, no children means `MatchAll`, one child
    ///   collapses.
    /// - `Not`: children are simplified, no children means `MatchAll`.
    /// - `Terms` with a single non-null value degenerates to `Term`.
    ///
    /// The result is a fixed point: `q.simplify().simplify() == q.simplify()`.
    pub fn simplify(&self) -> Query {
        match self {
            Query::And { of } => {
                let mut children = Vec::with_capacity(of.len());
                for child in of {
                    match child.simplify() {
                        Query::MatchAll => {}
                        Query::And { of: nested } => children.extend(nested),
                        other => children.push(other),
                    }
                }
                collapse(children, Query::and)
            }
            Query::Or { of } => {
                let mut children = Vec::with_capacity(of.len());
                for child in of {
                    match child.simplify() {
                        Query::MatchAll => return Query::MatchAll,
                        Query::Or { of: nested } => children.extend(nested),
                        other => children.push(other),
                    }
                }
                collapse(children, Query::or)
            }
            Query::Not { of } => {
                if of.is_empty() {
                    Query::MatchAll
                } else {
                    Query::not(of.iter().map(Query::simplify).collect())
                }
            }
            Query::Terms { field, value } if value.len() == 1 && !value[0].is_null() => Query::Term {
                field: field.clone(),
                value: value[0].clone(),
            },
            Query::MatchAll
            | Query::Term { .. }
            | Query::Terms { .. }
            | Query::Match { .. }
            | Query::Phrase { .. }
            | Query::Prefix { .. }
            | Query::Wildcard { .. }
            | Query::Regex { .. }
            | Query::Range(_)
            | Query::DateRange(_)
            | Query::Bbox { .. }
            | Query::Exists { .. }
            | Query::Lucene { .. }
            | Query::Native { .. }
            | Query::Named { .. } => self.clone(),
        }
    }

    /// Returns the logical negation of this query.
    ///
    /// Boolean groups are negated directly by De Morgan's laws:
    /// `And(c).negate() = Or(c.negate())`, `Or(c).negate() = And(c.negate())`.
    /// `Not(c).negate()` is `And(c)` for a single child and `Or(c)` when there
    /// are several, since `Not` matches when none of its children match.
    /// `Exists` flips its expectation. Every other leaf is wrapped in `Not`.
    ///
    /// Empty groups match everything, so their negation is
    /// [`Query::match_none`].
    pub fn negate(&self) -> Query {
        match self {
            Query::And { of } | Query::Or { of } | Query::Not { of } if of.is_empty() => {
                Query::match_none()
            }
            Query::And { of } => Query::or(of.iter().map(Query::negate).collect()),
            Query::Or { of } => Query::and(of.iter().map(Query::negate).collect()),
            Query::Not { of } if of.len() <= 1 => Query::and(of.clone()),
            Query::Not { of } => Query::or(of.clone()),
            Query::Exists { field, value } => Query::Exists {
                field: field.clone(),
                value: !*value,
            },
            Query::MatchAll
            | Query::Term { .. }
            | Query::Terms { .. }
            | Query::Match { .. }
            | Query::Phrase { .. }
            | Query::Prefix { .. }
            | Query::Wildcard { .. }
            | Query::Regex { .. }
            | Query::Range(_)
            | Query::DateRange(_)
            | Query::Bbox { .. }
            | Query::Lucene { .. }
            | Query::Native { .. }
            | Query::Named { .. } => Query::not(vec![self.clone()]),
        }
    }
}

fn collapse(mut children: Vec<Query>, group: fn(Vec<Query>) -> Query) -> Query {
    match children.len() {
        0 => Query::MatchAll,
        1 => children.remove(0),
        _ => group(children),
    }
}
