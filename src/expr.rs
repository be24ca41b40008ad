//! Expression evaluation for computed columns and bucket templates
//!
//! The engine only depends on [`ExprEvaluator`]. Without one, computed
//! columns are `null` and bucket templates are left unapplied.
//! [`PathTemplate`] is a minimal evaluator that substitutes `${path}`
//! placeholders from the evaluation context.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::document::{to_text, Document};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("invalid expression '{expr}': {reason}")]
    Invalid { expr: String, reason: String },
}

impl ExprError {
    pub fn code(&self) -> &'static str {
        match self {
            ExprError::Invalid { .. } => "EXPR_INVALID",
        }
    }
}

/// Evaluates an expression against a context map.
///
/// Contexts carry `request` plus either `fieldValues` (computed columns) or
/// `bucket` and `scope` (bucket templates).
pub trait ExprEvaluator: Send + Sync {
    fn evaluate(&self, expr: &Value, context: &Value) -> Result<Value, ExprError>;
}

/// `${path}` substitution over strings, objects and arrays.
///
/// A string that is exactly one placeholder yields the resolved value
/// itself; placeholders embedded in longer strings are interpolated as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathTemplate;

impl ExprEvaluator for PathTemplate {
    fn evaluate(&self, expr: &Value, context: &Value) -> Result<Value, ExprError> {
        match expr {
            Value::String(text) => interpolate(text, context),
            Value::Array(items) => items
                .iter()
                .map(|item| self.evaluate(item, context))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (name, value) in map {
                    out.insert(name.clone(), self.evaluate(value, context)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }
}

fn interpolate(text: &str, context: &Value) -> Result<Value, ExprError> {
    if let Some(path) = text.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        if !path.contains("${") && !path.contains('}') {
            return Ok(context.resolve_single(path.trim()).unwrap_or(Value::Null));
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| ExprError::Invalid {
            expr: text.to_string(),
            reason: "unterminated placeholder".to_string(),
        })?;
        if let Some(value) = context.resolve_single(after[..end].trim()) {
            out.push_str(&to_text(&value));
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_whole_placeholder_keeps_type() {
        let context = json!({"bucket": {"count": 3}});
        let value = PathTemplate.evaluate(&json!("${bucket.count}"), &context).unwrap();
        assert_eq!(value, json!(3));
    }

    #[test]
    fn test_interpolation_and_structure() {
        let context = json!({"fieldValues": {"first": "Ada", "last": "Lovelace"}});
        let expr = json!({"label": "${fieldValues.first} ${fieldValues.last}", "n": 1});
        let value = PathTemplate.evaluate(&expr, &context).unwrap();
        assert_eq!(value, json!({"label": "Ada Lovelace", "n": 1}));
    }

    #[test]
    fn test_missing_path_is_null() {
        let value = PathTemplate.evaluate(&json!("${nope}"), &json!({})).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_unterminated_placeholder() {
        let err = PathTemplate
            .evaluate(&json!("total ${bucket.count"), &json!({}))
            .unwrap_err();
        assert_eq!(err.code(), "EXPR_INVALID");
    }
}
