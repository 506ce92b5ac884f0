//! Lenient coercions for fields of semi-trusted sidecar JSON.

use serde_json::Value;

/// Integer view of a JSON value: integers as-is, floats truncated toward
/// zero, booleans as 0/1, and strings holding an integer literal.
pub fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::Bool(b) => Some(*b as i64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Float view of a JSON value: numbers, booleans and numeric strings.
pub fn as_float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text view of a JSON label; `null` is treated as absent.
pub fn as_label(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_coercion() {
        assert_eq!(as_int(&json!(12)), Some(12));
        assert_eq!(as_int(&json!(12.9)), Some(12));
        assert_eq!(as_int(&json!(-3.5)), Some(-3));
        assert_eq!(as_int(&json!(" 42 ")), Some(42));
        assert_eq!(as_int(&json!("4.2")), None);
        assert_eq!(as_int(&json!(null)), None);
        assert_eq!(as_int(&json!([1])), None);
    }

    #[test]
    fn float_coercion() {
        assert_eq!(as_float(&json!(0.5)), Some(0.5));
        assert_eq!(as_float(&json!("0.25")), Some(0.25));
        assert_eq!(as_float(&json!("high")), None);
        assert_eq!(as_float(&json!({})), None);
    }

    #[test]
    fn label_coercion() {
        assert_eq!(as_label(&json!("Sneakers")).as_deref(), Some("Sneakers"));
        assert_eq!(as_label(&json!(3)).as_deref(), Some("3"));
        assert_eq!(as_label(&json!(null)), None);
    }
}
