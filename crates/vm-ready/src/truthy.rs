//! Truthiness of dynamic view-model values.
//!
//! A value is falsey when it is absent, `null`, `false`, a zero or NaN
//! number, or the empty string. Arrays and objects are always truthy, even
//! when empty.

use serde_json::Value;

/// Whether a (possibly absent) value counts as truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Inverse of [`is_truthy`].
pub fn is_falsey(value: Option<&Value>) -> bool {
    !is_truthy(value)
}
