//! Structural field path walker over `serde_json::Value`
//!
//! A path is a dot-separated list of segments:
//! - numeric segments index into arrays
//! - other segments look up object keys, or fan out over arrays
//! - a final array is flattened one level
//! - `null`, missing keys and type mismatches yield nothing

use serde_json::Value;

/// Resolves `path` against `root`, borrowing every value found.
///
/// An empty path resolves the root itself.
pub fn resolve_refs<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    };
    let mut out = Vec::new();
    walk(root, &segments, &mut out);
    out
}

fn walk<'a>(node: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((segment, rest)) = segments.split_first() else {
        match node {
            Value::Null => {}
            Value::Array(items) => out.extend(items.iter().filter(|item| !item.is_null())),
            other => out.push(other),
        }
        return;
    };

    match node {
        Value::Object(map) => {
            if let Some(child) = map.get(*segment) {
                walk(child, rest, out);
            }
        }
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(child) = items.get(index) {
                    walk(child, rest, out);
                }
            }
            Err(_) => {
                for item in items {
                    walk(item, segments, out);
                }
            }
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_object_lookup() {
        let doc = json!({"a": {"b": {"c": 42}}});
        assert_eq!(resolve_refs(&doc, "a.b.c"), vec![&json!(42)]);
    }

    #[test]
    fn test_fan_out_over_arrays() {
        let doc = json!({"items": [{"sku": "x"}, {"sku": "y"}, {"other": 1}]});
        assert_eq!(resolve_refs(&doc, "items.sku"), vec![&json!("x"), &json!("y")]);
    }

    #[test]
    fn test_numeric_segment_indexes() {
        let doc = json!({"items": [{"sku": "x"}, {"sku": "y"}]});
        assert_eq!(resolve_refs(&doc, "items.1.sku"), vec![&json!("y")]);
        assert!(resolve_refs(&doc, "items.5.sku").is_empty());
    }

    #[test]
    fn test_final_array_flattened_once() {
        let doc = json!({"tags": [1, null, [2, 3]]});
        assert_eq!(resolve_refs(&doc, "tags"), vec![&json!(1), &json!([2, 3])]);
    }

    #[test]
    fn test_missing_and_mismatch_yield_nothing() {
        let doc = json!({"a": 1, "b": null});
        assert!(resolve_refs(&doc, "missing").is_empty());
        assert!(resolve_refs(&doc, "a.b").is_empty());
        assert!(resolve_refs(&doc, "b").is_empty());
    }

    #[test]
    fn test_numeric_object_key() {
        let doc = json!({"0": "zero"});
        assert_eq!(resolve_refs(&doc, "0"), vec![&json!("zero")]);
    }
}
