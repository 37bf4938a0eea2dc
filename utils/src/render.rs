//! Text rendering of helper values.
//!
//! Rendering never fails: anything that cannot be serialized falls back to
//! its debug form so error reporting cannot itself become an error.

use serde_json::Value;

/// Whether an argument carries nothing worth reporting.
#[must_use]
pub fn is_empty_arg(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Render an argument list for error reports, skipping empty arguments.
#[must_use]
pub fn render_args(args: &[Value]) -> String {
    let kept: Vec<&Value> = args.iter().filter(|arg| !is_empty_arg(arg)).collect();
    serde_json::to_string(&kept).unwrap_or_else(|_| format!("{kept:?}"))
}

/// Text substituted into rendered output for a resolved value.
///
/// Strings are inserted as-is, `null` becomes empty text, everything else
/// uses its JSON form.
#[must_use]
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Short name of a value's JSON type.
#[must_use]
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Cut `text` to at most `max` characters for log output.
#[must_use]
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}
