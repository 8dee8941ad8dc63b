//! Lenient coercion applied before strict validation.
//!
//! Recovers usable data from near-miss output: out-of-range numbers
//! are clamped, over-long strings truncated, near-miss enum strings
//! snapped to the canonical member, and array members that still fall
//! outside the item enum are dropped.

use serde_json::Value;
use tracing::warn;

/// Separators stripped when snapping a prefixed enum value
/// (e.g. "barrier: Concept" or "Tags.Concept").
const PREFIX_SEPARATORS: [char; 4] = [':', '.', '/', ' '];

/// Coerce `value` toward `schema`. Unknown object keys and values with
/// no applicable keyword pass through untouched; the function is a
/// no-op on already-valid input.
pub fn normalize(value: &Value, schema: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let properties = schema.get("properties").and_then(Value::as_object);
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, child) in map {
                let normalized = match properties.and_then(|p| p.get(key)) {
                    Some(child_schema) => normalize(child, child_schema),
                    None => child.clone(),
                };
                out.insert(key.clone(), normalized);
            }
            Value::Object(out)
        }
        Value::Array(items) => normalize_array(items, schema),
        Value::Number(_) => clamp_number(value, schema),
        Value::String(s) => normalize_string(s, schema),
        other => other.clone(),
    }
}

fn normalize_array(items: &[Value], schema: &Value) -> Value {
    let item_schema = schema.get("items");
    let item_enum = item_schema
        .and_then(|s| s.get("enum"))
        .and_then(Value::as_array);

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let normalized = match item_schema {
            Some(s) => normalize(item, s),
            None => item.clone(),
        };
        if let Some(allowed) = item_enum {
            if !allowed.contains(&normalized) {
                warn!(member = %normalized, "dropping array member outside enum");
                continue;
            }
        }
        out.push(normalized);
    }

    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
        if out.len() as u64 > max {
            warn!(
                dropped = out.len() - max as usize,
                "truncating array to maxItems"
            );
            out.truncate(max as usize);
        }
    }

    Value::Array(out)
}

fn clamp_number(value: &Value, schema: &Value) -> Value {
    let Some(actual) = value.as_f64() else {
        return value.clone();
    };
    let mut clamped = actual;
    if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
        clamped = clamped.max(min);
    }
    if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
        clamped = clamped.min(max);
    }
    if clamped == actual {
        return value.clone();
    }

    warn!(from = actual, to = clamped, "clamping out-of-range number");
    if clamped.fract() == 0.0 && (value.is_i64() || value.is_u64()) {
        return Value::Number((clamped as i64).into());
    }
    serde_json::Number::from_f64(clamped)
        .map(Value::Number)
        .unwrap_or_else(|| value.clone())
}

fn normalize_string(s: &str, schema: &Value) -> Value {
    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if let Some(snapped) = snap_enum(s, allowed) {
            return Value::String(snapped);
        }
        return Value::String(s.to_string());
    }
    if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
        let truncated = truncate_chars(s, max as usize);
        if truncated.len() != s.len() {
            warn!(max, "truncating over-long string");
        }
        return Value::String(truncated);
    }
    Value::String(s.to_string())
}

/// Snap a near-miss onto the canonical enum member: exact matches are
/// left alone, then a case-insensitive match, then the same after
/// stripping a recognized prefix ("barrier: Concept" -> "Concept").
fn snap_enum(s: &str, allowed: &[Value]) -> Option<String> {
    let members: Vec<&str> = allowed.iter().filter_map(Value::as_str).collect();
    if members.contains(&s) {
        return None;
    }
    if let Some(member) = members.iter().find(|m| m.eq_ignore_ascii_case(s)) {
        return Some(member.to_string());
    }
    let stripped = s
        .rsplit(|c| PREFIX_SEPARATORS.contains(&c))
        .next()
        .unwrap_or(s)
        .trim();
    members
        .iter()
        .find(|m| m.eq_ignore_ascii_case(stripped))
        .map(|m| m.to_string())
}

/// Truncate to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snap_enum_case_insensitive() {
        let allowed = vec![json!("Concept"), json!("Vocabulary")];
        assert_eq!(snap_enum("concept", &allowed), Some("Concept".into()));
        assert_eq!(snap_enum("Concept", &allowed), None);
        assert_eq!(snap_enum("Unknown", &allowed), None);
    }

    #[test]
    fn snap_enum_strips_prefix() {
        let allowed = vec![json!("Concept"), json!("Vocabulary")];
        assert_eq!(
            snap_enum("barrier: concept", &allowed),
            Some("Concept".into())
        );
        assert_eq!(snap_enum("Tags.Vocabulary", &allowed), Some("Vocabulary".into()));
    }

    #[test]
    fn truncate_chars_respects_multibyte() {
        assert_eq!(truncate_chars("héllo", 3), "hél");
        assert_eq!(truncate_chars("abc", 5), "abc");
    }

    #[test]
    fn clamp_preserves_integer_kind() {
        let clamped = clamp_number(&json!(7), &json!({"minimum": 0, "maximum": 5}));
        assert_eq!(clamped, json!(5));
        assert!(clamped.is_i64());
    }
}
