//! Runtime values of the macro language.
//!
//! A value is a number, a piece of text, or a JSON tree. Whenever text is
//! read back out of a list, property list or tree it goes through
//! [`Value::coerce`], so `"007"` always comes back as the number 7.

use crate::marshal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::Value as Json;
use std::fmt;
use std::str::FromStr;

/// A value produced or consumed by macro evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(Decimal),
    Text(String),
    /// Always an array or object.
    Json(Json),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    pub fn empty() -> Self {
        Value::Text(String::new())
    }

    pub fn number(n: impl Into<Decimal>) -> Self {
        Value::Number(n.into())
    }

    pub fn boolean(b: bool) -> Self {
        Value::Number(if b { Decimal::ONE } else { Decimal::ZERO })
    }

    /// Applies the numeric coercion rule to a piece of text.
    pub fn coerce(text: &str) -> Self {
        match parse_number(text) {
            Some(n) => Value::Number(n),
            None => Value::Text(text.to_string()),
        }
    }

    /// Interprets the textual output of a macro body.
    ///
    /// JSON trees win over numbers, numbers over plain text.
    pub fn from_output(text: &str) -> Self {
        if let Some(tree) = marshal::to_json(text) {
            return Value::Json(tree);
        }
        Value::coerce(text)
    }

    /// Re-applies coercion to a text value, leaving other kinds alone.
    pub fn coerced(self) -> Self {
        match self {
            Value::Text(text) => Value::coerce(&text),
            other => other,
        }
    }

    /// Reads a scalar out of a JSON tree.
    pub fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Value::empty(),
            Json::Bool(b) => Value::text(b.to_string()),
            Json::Number(n) => json_number_to_decimal(n)
                .map(Value::Number)
                .unwrap_or_else(|| Value::text(n.to_string())),
            Json::String(s) => Value::coerce(s),
            tree => Value::Json(tree.clone()),
        }
    }

    /// Converts into a JSON node for storage inside a tree.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Number(n) => decimal_to_json(*n),
            Value::Text(text) => Json::String(text.clone()),
            Value::Json(tree) => tree.clone(),
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(text) => parse_number(text),
            Value::Json(_) => None,
        }
    }

    /// Reads a JSON tree, parsing text that holds one.
    pub fn as_json(&self) -> Option<Json> {
        match self {
            Value::Json(tree) => Some(tree.clone()),
            Value::Text(text) => marshal::to_json(text),
            Value::Number(_) => None,
        }
    }

    /// The boolean rule shared by every built-in that reads a flag.
    ///
    /// `false` (any case), `0` and empty text are false, as are empty trees.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Number(n) => !n.is_zero(),
            Value::Text(text) => {
                let text = text.trim();
                if text.is_empty() || text.eq_ignore_ascii_case("false") {
                    return false;
                }
                match parse_number(text) {
                    Some(n) => !n.is_zero(),
                    None => true,
                }
            }
            Value::Json(Json::Array(items)) => !items.is_empty(),
            Value::Json(Json::Object(map)) => !map.is_empty(),
            Value::Json(_) => true,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::empty()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n.normalize()),
            Value::Text(text) => f.write_str(text),
            Value::Json(tree) => write!(f, "{tree}"),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::text(text)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Decimal::from(n))
    }
}

impl From<Decimal> for Value {
    fn from(n: Decimal) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::boolean(b)
    }
}

/// Parses a plain decimal literal: optional sign, digits, optional fraction.
pub fn parse_number(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    let unsigned = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('+'))
        .unwrap_or(trimmed);

    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    let literal = trimmed.strip_prefix('+').unwrap_or(trimmed);
    Decimal::from_str(literal).ok()
}

fn json_number_to_decimal(n: &serde_json::Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(Decimal::from(u));
    }
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
        .or_else(|| n.as_f64().and_then(Decimal::from_f64))
}

fn decimal_to_json(n: Decimal) -> Json {
    let n = n.normalize();
    if n.scale() == 0 {
        if let Some(i) = n.to_i64() {
            return Json::from(i);
        }
    }
    n.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Json::Number)
        .unwrap_or_else(|| Json::String(n.to_string()))
}
