use crate::ast::HoconValue;
use indexmap::IndexMap;
use serde::Serialize;

/// A resolved configuration value in a shape serde can export.
///
/// Scalars are stored as text in the tree; text that reads as a number is
/// emitted as one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

pub(crate) fn to_value(value: &HoconValue) -> Value {
    match value {
        HoconValue::String(s) => scalar(s),
        HoconValue::Boolean(b) => Value::Boolean(*b),
        HoconValue::Array(items) => Value::Array(items.iter().map(to_value).collect()),
        HoconValue::Object(object) => Value::Object(
            object
                .iter()
                .map(|(key, child)| (key.clone(), to_value(child)))
                .collect(),
        ),
        // Only reachable on trees that were never resolved.
        HoconValue::Substitution(_) | HoconValue::Concatenation(_) => {
            Value::String(value.to_string())
        }
    }
}

fn scalar(text: &str) -> Value {
    if !is_json_number(text) {
        return Value::String(text.to_string());
    }
    if !text.contains(['.', 'e', 'E']) {
        // Integers are exported only when they print back unchanged.
        return match text.parse::<i64>() {
            Ok(i) if i.to_string() == text => Value::Integer(i),
            _ => Value::String(text.to_string()),
        };
    }
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::Number(n),
        _ => Value::String(text.to_string()),
    }
}

/// `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`
fn is_json_number(text: &str) -> bool {
    fn digits(s: &str) -> usize {
        s.bytes().take_while(u8::is_ascii_digit).count()
    }

    let rest = text.strip_prefix('-').unwrap_or(text);
    let int_len = digits(rest);
    if int_len == 0 || (int_len > 1 && rest.starts_with('0')) {
        return false;
    }
    let mut rest = &rest[int_len..];
    if let Some(fraction) = rest.strip_prefix('.') {
        let len = digits(fraction);
        if len == 0 {
            return false;
        }
        rest = &fraction[len..];
    }
    if let Some(exponent) = rest.strip_prefix(['e', 'E']) {
        let exponent = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        let len = digits(exponent);
        if len == 0 {
            return false;
        }
        rest = &exponent[len..];
    }
    rest.is_empty()
}
