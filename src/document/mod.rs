//! Documents and field path resolution
//!
//! Anything the engine filters, sorts or aggregates implements [`Document`].
//! Resolution never fails: a missing field, a `null`, and a type mismatch
//! all resolve to no values.

mod path;
mod value;

use serde_json::{Map, Value};

pub use path::resolve_refs;
pub use value::{
    as_number, canonical_key, compare_nullable, compare_values, from_f64, term_equals, to_text,
};

/// Field access used by the predicate compiler, comparator and aggregations
pub trait Document {
    /// Resolves a dotted path into zero or more non-null values
    fn resolve(&self, path: &str) -> Vec<Value>;

    /// First value of `path`, if any
    fn resolve_single(&self, path: &str) -> Option<Value> {
        self.resolve(path).into_iter().next()
    }
}

impl Document for Value {
    fn resolve(&self, path: &str) -> Vec<Value> {
        resolve_refs(self, path).into_iter().cloned().collect()
    }

    fn resolve_single(&self, path: &str) -> Option<Value> {
        resolve_refs(self, path).into_iter().next().cloned()
    }
}

impl Document for Map<String, Value> {
    fn resolve(&self, path: &str) -> Vec<Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, rest),
            None => (path, ""),
        };
        match self.get(head) {
            Some(child) => child.resolve(rest),
            None => Vec::new(),
        }
    }
}

impl<D: Document + ?Sized> Document for &D {
    fn resolve(&self, path: &str) -> Vec<Value> {
        (**self).resolve(path)
    }

    fn resolve_single(&self, path: &str) -> Option<Value> {
        (**self).resolve_single(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_document() {
        let doc = json!({"user": {"tags": ["a", "b"]}});
        assert_eq!(doc.resolve("user.tags"), vec![json!("a"), json!("b")]);
        assert_eq!(doc.resolve_single("user.tags"), Some(json!("a")));
        assert_eq!(doc.resolve_single("user.name"), None);
    }

    #[test]
    fn test_map_document() {
        let mut map = Map::new();
        map.insert("a".into(), json!({"b": 1}));
        assert_eq!(map.resolve("a.b"), vec![json!(1)]);
        assert!(map.resolve("b").is_empty());
    }
}
