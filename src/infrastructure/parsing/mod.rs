//! Lenient readers for the informal JSON shapes found in market files.

pub mod depth_extraction;
pub mod trade_extraction;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

/// Number or numeric string as f64
pub(crate) fn json_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Number or numeric string as an exact Decimal
pub(crate) fn json_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Integer, float or numeric string truncated to i64
pub(crate) fn json_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// Loose boolean: `true`, non-zero numbers, `"true"`/`"1"` strings.
///
/// Strings are read by meaning, not by emptiness: `"false"` and `"0"` are
/// false even though they are non-empty.
pub(crate) fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1"),
        _ => false,
    }
}

/// First of `keys` present with a non-null value
pub(crate) fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// First of `keys` holding a non-empty array
pub(crate) fn first_non_empty_array<'a>(
    obj: &'a Map<String, Value>,
    keys: &[&str],
) -> Option<&'a Vec<Value>> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_array))
        .find(|a| !a.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_json_decimal_keeps_exact_strings() {
        assert_eq!(json_decimal(&json!("0.61230000")), Some(dec!(0.6123)));
        assert_eq!(json_decimal(&json!(1.25)), Some(dec!(1.25)));
        assert_eq!(json_decimal(&json!("abc")), None);
        assert_eq!(json_decimal(&Value::Null), None);
    }

    #[test]
    fn test_json_i64_accepts_strings_and_floats() {
        assert_eq!(json_i64(&json!("1700000000000")), Some(1_700_000_000_000));
        assert_eq!(json_i64(&json!(1.7e12)), Some(1_700_000_000_000));
        assert_eq!(json_i64(&json!(true)), None);
    }

    #[test]
    fn test_json_truthy() {
        assert!(json_truthy(&json!(true)));
        assert!(json_truthy(&json!(1)));
        assert!(json_truthy(&json!("true")));
        assert!(!json_truthy(&json!("false")));
        assert!(!json_truthy(&Value::Null));
    }

    #[test]
    fn test_first_present_skips_null() {
        let obj = json!({"time": null, "ts": 5});
        let map = obj.as_object().unwrap();
        assert_eq!(first_present(map, &["time", "timestamp", "ts"]), Some(&json!(5)));
    }
}
