//! Declared state types and wire value coercion.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Declared type of a state, as found in the role table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueType {
    Boolean,
    Number,
    String,
    /// Any other declared type; values pass through unchanged.
    Other(std::string::String),
    #[default]
    Mixed,
}

impl From<std::string::String> for ValueType {
    fn from(s: std::string::String) -> Self {
        match s.as_str() {
            "boolean" => Self::Boolean,
            "number" => Self::Number,
            "string" => Self::String,
            "mixed" => Self::Mixed,
            _ => Self::Other(s),
        }
    }
}

impl From<ValueType> for std::string::String {
    fn from(ty: ValueType) -> Self {
        ty.to_string()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("boolean"),
            Self::Number => f.write_str("number"),
            Self::String => f.write_str("string"),
            Self::Mixed => f.write_str("mixed"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Coerces a raw wire value to the declared state type.
///
/// Booleans accept `true`, `"true"`, `1`, `"1"` and `"on"`; anything else
/// is false. Numbers map `on`/`true` to 1 and `off`/`false` to 0 before
/// parsing; unparsable input becomes `null`. Other types pass through.
#[must_use]
pub fn coerce(value: &Value, ty: &ValueType) -> Value {
    match ty {
        ValueType::Boolean => Value::Bool(is_truthy(value)),
        ValueType::Number => to_number(value),
        _ => value.clone(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => matches!(s.as_str(), "true" | "1" | "on"),
        _ => false,
    }
}

fn to_number(value: &Value) -> Value {
    let parsed = match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => return Value::Number(n.clone()),
        Value::String(s) => match s.as_str() {
            "on" | "true" => Some(1.0),
            "off" | "false" => Some(0.0),
            other => parse_float_prefix(other),
        },
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

/// Parses the longest leading decimal number, ignoring leading whitespace.
fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    s[..end].parse().ok()
}
