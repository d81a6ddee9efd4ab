//! Truthiness and display rules for JSON values in templates.

use serde_json::Value;

/// Truthiness for `{{#if var}}` guards: true booleans, non-zero numbers,
/// non-empty strings, and non-empty arrays/objects are truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// How a variable renders inside text: strings verbatim (no quotes), numbers
/// and booleans via their canonical form, null as empty, compound values as
/// compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
