//! Composite document ordering
//!
//! One comparator per sort entry, chained left to right: the first
//! non-equal result wins. Values compare numerically when numeric, by string
//! form otherwise. A missing value sorts after every present value, so it
//! comes last ascending and first descending.

use std::cmp::Ordering;

use serde_json::Value;

use crate::document::{compare_nullable, Document};
use crate::model::{Direction, DocSort};

/// Orders documents by a list of sort specifications
#[derive(Debug, Clone, Default)]
pub struct CompositeComparator {
    sorts: Vec<DocSort>,
}

impl CompositeComparator {
    pub fn new(sorts: &[DocSort]) -> Self {
        Self {
            sorts: sorts.to_vec(),
        }
    }

    /// Compares two documents
    pub fn compare<D: Document + ?Sized>(&self, a: &D, b: &D) -> Ordering {
        self.compare_keys(&self.sort_keys(a), &self.sort_keys(b))
    }

    /// Resolves the sort key of each sort entry
    pub fn sort_keys<D: Document + ?Sized>(&self, document: &D) -> Vec<Option<Value>> {
        self.sorts
            .iter()
            .map(|sort| document.resolve_single(&sort.field))
            .collect()
    }

    fn compare_keys(&self, a: &[Option<Value>], b: &[Option<Value>]) -> Ordering {
        for (sort, (x, y)) in self.sorts.iter().zip(a.iter().zip(b)) {
            let ordering = compare_nullable(x.as_ref(), y.as_ref());
            let ordering = match sort.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Stable sort. Keys are resolved once per document.
    pub fn sort<D: Document>(&self, documents: Vec<D>) -> Vec<D> {
        if self.sorts.is_empty() {
            return documents;
        }
        let mut keyed: Vec<(Vec<Option<Value>>, D)> = documents
            .into_iter()
            .map(|doc| (self.sort_keys(&doc), doc))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
        keyed.into_iter().map(|(_, doc)| doc).collect()
    }
}
