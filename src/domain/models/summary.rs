//! One-line summaries of task inputs and outputs.
//!
//! Memory logs, the inter-worker log and alert bodies all store summaries,
//! never full payloads. Summaries are single-line so they can never collide
//! with the markdown section separators.

use serde_json::Value;

const INPUT_TEXT_LIMIT: usize = 80;
const INPUT_VALUE_LIMIT: usize = 20;
const INPUT_KEYS: usize = 2;
const OUTPUT_KEYS: usize = 4;
const NON_OBJECT_LIMIT: usize = 60;

/// Cut `text` to at most `limit` characters (not bytes) and flatten newlines.
pub fn clip(text: &str, limit: usize) -> String {
    text.chars()
        .take(limit)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Summarize a task input.
///
/// Strings are cut to 80 characters and objects become `{k=v, k=v}` built
/// from their first two keys in key order. Anything else is rendered as JSON
/// and cut.
pub fn summarize_input(input: &Value) -> String {
    match input {
        Value::String(s) => clip(s, INPUT_TEXT_LIMIT),
        Value::Object(map) => {
            let pairs: Vec<String> = map
                .iter()
                .take(INPUT_KEYS)
                .map(|(k, v)| format!("{k}={}", clip(&scalar_text(v), INPUT_VALUE_LIMIT)))
                .collect();
            format!("{{{}}}", pairs.join(", "))
        }
        other => clip(&other.to_string(), INPUT_TEXT_LIMIT),
    }
}

fn render_fact(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(format!("{key}={}", items.len())),
        Value::Number(n) if n.is_f64() => n.as_f64().map(|f| format!("{key}={f:.2}")),
        Value::String(s) => Some(format!("{key}={}", clip(s, INPUT_TEXT_LIMIT))),
        Value::Object(map) => Some(format!("{key}={{{} keys}}", map.len())),
        other => Some(format!("{key}={other}")),
    }
}

/// Summarize a task output using a caller-supplied list of high-value keys.
///
/// Lists are reported by length and floats with two decimals. Returns
/// `no data` when none of the keys are present.
pub fn summarize_output_keys(data: &Value, keys: &[&str]) -> String {
    let Value::Object(map) = data else {
        return summarize_non_object(data);
    };
    let parts: Vec<String> = keys
        .iter()
        .filter_map(|k| map.get(*k).and_then(|v| render_fact(k, v)))
        .collect();
    if parts.is_empty() {
        "no data".to_string()
    } else {
        parts.join(", ")
    }
}

/// Summarize a task output from its first four scalar keys.
pub fn summarize_output(data: &Value) -> String {
    let Value::Object(map) = data else {
        return summarize_non_object(data);
    };
    let parts: Vec<String> = map
        .iter()
        .filter(|(_, v)| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        .take(OUTPUT_KEYS)
        .filter_map(|(k, v)| render_fact(k, v))
        .collect();
    if parts.is_empty() {
        "no data".to_string()
    } else {
        parts.join(", ")
    }
}

fn summarize_non_object(data: &Value) -> String {
    if data.is_null() {
        "no data".to_string()
    } else {
        format!("data={}", clip(&scalar_text(data), NON_OBJECT_LIMIT))
    }
}
