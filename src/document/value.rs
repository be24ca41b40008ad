//! Value coercion shared by predicates, sorting and aggregation

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Numeric view of a value: numbers, and strings that parse as finite numbers.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// String form of a value. Strings are returned without quotes.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Stable identity of a value, used for de-duplication.
pub fn canonical_key(value: &Value) -> String {
    value.to_string()
}

/// Converts a float back into a JSON value. Non-finite floats become `null`.
pub fn from_f64(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

/// Orders two values.
///
/// Numeric when one side is a number and the other is a number or a numeric
/// string, otherwise by string form.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    if a.is_number() || b.is_number() {
        if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
            return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        }
    }
    to_text(a).cmp(&to_text(b))
}

/// Orders two optional values with `None` greater than any value.
pub fn compare_nullable(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => compare_values(x, y),
    }
}

/// Term equality: numeric when the document value is numeric, otherwise
/// exact string equality.
pub fn term_equals(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Number(n) => match (n.as_f64(), as_number(expected)) {
            (Some(a), Some(e)) => a == e,
            _ => false,
        },
        _ => to_text(actual) == to_text(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(as_number(&json!(3)), Some(3.0));
        assert_eq!(as_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_number(&json!("NaN")), None);
        assert_eq!(as_number(&json!(true)), None);
    }

    #[test]
    fn test_compare_numbers_not_lexically() {
        assert_eq!(compare_values(&json!(9), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("9"), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("9"), &json!("10")), Ordering::Greater);
    }

    #[test]
    fn test_null_sorts_last() {
        assert_eq!(compare_nullable(None, Some(&json!(1))), Ordering::Greater);
        assert_eq!(compare_nullable(Some(&json!("z")), None), Ordering::Less);
    }

    #[test]
    fn test_term_equality() {
        assert!(term_equals(&json!(5), &json!("5")));
        assert!(term_equals(&json!(5.0), &json!(5)));
        assert!(term_equals(&json!("open"), &json!("open")));
        assert!(!term_equals(&json!("Open"), &json!("open")));
        assert!(term_equals(&json!(true), &json!(true)));
        assert!(!term_equals(&json!("5"), &json!(5.0)));
    }
}
