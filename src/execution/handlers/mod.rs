//! Per-kind executor bodies.

pub mod audio;
pub mod conditional;
pub mod generation;
pub mod output_format;
pub mod page;
pub mod string_ops;
pub mod text;
pub mod webhook;

use serde_json::Value;

/// Renders a value as the text a step operates on.
///
/// Strings are used as-is, null becomes empty, anything else is JSON.
pub(crate) fn value_as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_text() {
        assert_eq!(value_as_text(&Value::Null), "");
        assert_eq!(value_as_text(&json!("plain")), "plain");
        assert_eq!(value_as_text(&json!(3)), "3");
        assert_eq!(value_as_text(&json!({"a": [1]})), r#"{"a":[1]}"#);
    }
}
