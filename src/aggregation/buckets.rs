//! Bucket accumulation and the shared filter/sort/truncate routine

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde_json::Value;

use crate::agg::{AggSort, SortType};
use crate::document::{canonical_key, compare_values};
use crate::model::Direction;

/// A bucket under construction: its key and the documents that fall in it
pub(crate) struct Partition<'d, D: ?Sized> {
    pub key: Value,
    pub members: Vec<&'d D>,
}

impl<D: ?Sized> Partition<'_, D> {
    pub fn count(&self) -> u64 {
        self.members.len() as u64
    }
}

/// Partitions keyed by value identity, in first-seen order
pub(crate) struct Partitions<'d, D: ?Sized> {
    parts: IndexMap<String, Partition<'d, D>>,
}

impl<'d, D: ?Sized> Partitions<'d, D> {
    pub fn new() -> Self {
        Self {
            parts: IndexMap::new(),
        }
    }

    /// Adds `member` to the bucket keyed by `key`, creating it if needed
    pub fn add(&mut self, key: Value, member: &'d D) {
        self.extend(key, std::iter::once(member));
    }

    pub fn extend(&mut self, key: Value, members: impl IntoIterator<Item = &'d D>) {
        let id = canonical_key(&key);
        self.parts
            .entry(id)
            .or_insert_with(|| Partition {
                key,
                members: Vec::new(),
            })
            .members
            .extend(members);
    }

    /// Filters by `min_doc_count`, orders by `sort`, then keeps at most `size`
    pub fn finish(self, min_doc_count: u64, sort: AggSort, size: Option<usize>) -> Vec<Partition<'d, D>> {
        let mut parts: Vec<Partition<'d, D>> = self
            .parts
            .into_values()
            .filter(|p| p.count() >= min_doc_count)
            .collect();

        let directed = |ordering: Ordering| match sort.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        };
        match sort.sort_type {
            SortType::Count => parts.sort_by(|a, b| directed(a.count().cmp(&b.count()))),
            SortType::Lexical => parts.sort_by(|a, b| directed(compare_values(&a.key, &b.key))),
            SortType::None => {}
        }

        if let Some(size) = size {
            parts.truncate(size);
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build<'d>(entries: &[(&str, &'d [u8])]) -> Partitions<'d, u8> {
        let mut parts = Partitions::new();
        for (key, members) in entries {
            parts.extend(json!(key), members.iter());
        }
        parts
    }

    fn keys(parts: &[Partition<'_, u8>]) -> Vec<Value> {
        parts.iter().map(|p| p.key.clone()).collect()
    }

    #[test]
    fn test_count_desc_keeps_insertion_order_for_ties() {
        let parts = build(&[("a", &[1]), ("b", &[1, 2]), ("c", &[3])]);
        let done = parts.finish(1, AggSort::count_desc(), None);
        assert_eq!(keys(&done), vec![json!("b"), json!("a"), json!("c")]);
    }

    #[test]
    fn test_min_doc_count_and_size() {
        let parts = build(&[("a", &[1]), ("b", &[1, 2]), ("c", &[3, 4, 5])]);
        let done = parts.finish(2, AggSort::count_desc(), Some(1));
        assert_eq!(keys(&done), vec![json!("c")]);
    }

    #[test]
    fn test_lexical_and_none() {
        let parts = build(&[("b", &[1]), ("c", &[1]), ("a", &[1])]);
        assert_eq!(
            keys(&parts.finish(1, AggSort::lexical_desc(), None)),
            vec![json!("c"), json!("b"), json!("a")]
        );

        let parts = build(&[("b", &[1]), ("a", &[1])]);
        let none = AggSort::new(SortType::None, Direction::Ascending);
        assert_eq!(keys(&parts.finish(1, none, None)), vec![json!("b"), json!("a")]);
    }

    #[test]
    fn test_same_key_merges() {
        let mut parts: Partitions<'_, u8> = Partitions::new();
        parts.add(json!(1.0), &1);
        parts.add(json!(1.0), &2);
        let done = parts.finish(1, AggSort::count_desc(), None);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].count(), 2);
    }
}
