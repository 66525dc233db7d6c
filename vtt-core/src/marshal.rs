//! Conversions between macro text formats.
//!
//! Macro code passes structured data around in three shapes:
//! - string lists: `"a, b, c"`
//! - property lists: `"hp=10 ; ac=15 ; "`
//! - JSON trees: `{"hp": 10}`
//!
//! Every reader hands scalars back through [`Value::coerce`].

use crate::value::Value;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value as Json};

/// Default delimiter for property lists.
pub const PROPERTY_DELIMITER: &str = ";";

/// Default delimiter for string lists.
pub const LIST_DELIMITER: &str = ",";

/// Separator used when building string lists.
pub const LIST_JOIN: &str = ", ";

lazy_static! {
    static ref KEY_VALUE: Regex = Regex::new(r"(?s)([\w.]+)\s*=\s*(.*)").unwrap();
}

// ============================================================================
// JSON
// ============================================================================

/// Parses text as a JSON array or object; `None` means "not JSON".
pub fn to_json(text: &str) -> Option<Json> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
        return None;
    }
    serde_json::from_str::<Json>(trimmed)
        .ok()
        .filter(|tree| tree.is_array() || tree.is_object())
}

/// Renders a JSON object as `key=value` pairs joined by `delim`.
///
/// Returns `None` for anything other than an object.
pub fn to_property_list(tree: &Json, delim: &str) -> Option<String> {
    let map = tree.as_object()?;
    let parts: Vec<String> = map
        .iter()
        .map(|(key, value)| format!("{key}={}", Value::from_json(value)))
        .collect();
    Some(parts.join(delim))
}

/// Renders a JSON tree as a string list joined by `delim`.
///
/// Arrays list their elements, objects list their keys.
pub fn to_string_list(tree: &Json, delim: &str) -> String {
    match tree {
        Json::Array(items) => items
            .iter()
            .map(|item| Value::from_json(item).to_string())
            .collect::<Vec<_>>()
            .join(delim),
        Json::Object(map) => map.keys().cloned().collect::<Vec<_>>().join(delim),
        scalar => Value::from_json(scalar).to_string(),
    }
}

/// Builds a JSON array from a string list.
pub fn list_to_json(text: &str, delim: &str) -> Json {
    Json::Array(
        from_string_list(text, delim)
            .iter()
            .map(Value::to_json)
            .collect(),
    )
}

// ============================================================================
// String Lists
// ============================================================================

/// Splits a string list into trimmed items.
///
/// Blank input has zero items; empty items between delimiters are kept.
pub fn split_list(text: &str, delim: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let delim = if delim.is_empty() { LIST_DELIMITER } else { delim };
    text.split(delim).map(|item| item.trim().to_string()).collect()
}

/// Splits a string list and coerces each item.
pub fn from_string_list(text: &str, delim: &str) -> Vec<Value> {
    split_list(text, delim)
        .iter()
        .map(|item| Value::coerce(item))
        .collect()
}

/// Joins list items with the canonical `", "` separator.
pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| item.as_ref())
        .collect::<Vec<_>>()
        .join(LIST_JOIN)
}

// ============================================================================
// Property Lists
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct PropertyEntry {
    key: String,
    value: String,
    /// Source text between the previous entry's value and this key.
    leading: Option<String>,
}

/// An ordered `key=value` mapping with case-insensitive lookup.
///
/// Keys keep the casing they were first written with. Rendering keeps the
/// separators found between entries in the source and always ends with the
/// canonical `" ; "` terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyList {
    entries: Vec<PropertyEntry>,
    delimiter: String,
}

impl PropertyList {
    pub fn new(delimiter: &str) -> Self {
        let delimiter = if delimiter.is_empty() {
            PROPERTY_DELIMITER
        } else {
            delimiter
        };
        Self {
            entries: Vec::new(),
            delimiter: delimiter.to_string(),
        }
    }

    /// Parses property-list text.
    pub fn parse(text: &str, delimiter: &str) -> Self {
        let mut list = PropertyList::new(delimiter);
        let mut pending = String::new();

        for (index, segment) in text.split(list.delimiter.as_str()).enumerate() {
            if index > 0 {
                pending.push_str(&list.delimiter);
            }

            let Some(caps) = KEY_VALUE.captures(segment) else {
                pending.push_str(segment);
                continue;
            };
            let (Some(key), Some(raw_value)) = (caps.get(1), caps.get(2)) else {
                pending.push_str(segment);
                continue;
            };

            pending.push_str(&segment[..key.start()]);
            let value = raw_value.as_str().trim();
            let leading = std::mem::take(&mut pending);

            if let Some(existing) = list.position(key.as_str()) {
                list.entries[existing].value = value.to_string();
            } else {
                let leading = if list.entries.is_empty() {
                    None
                } else {
                    Some(leading)
                };
                list.entries.push(PropertyEntry {
                    key: key.as_str().to_string(),
                    value: value.to_string(),
                    leading,
                });
            }

            let raw = raw_value.as_str();
            pending.push_str(&raw[raw.trim_end().len()..]);
        }

        list
    }

    /// Builds a property list from a JSON object.
    pub fn from_json(tree: &Json, delimiter: &str) -> Option<Self> {
        let map = tree.as_object()?;
        let mut list = PropertyList::new(delimiter);
        for (key, value) in map {
            list.set(key, &Value::from_json(value).to_string());
        }
        Some(list)
    }

    fn position(&self, key: &str) -> Option<usize> {
        let upper = key.trim().to_uppercase();
        self.entries
            .iter()
            .position(|entry| entry.key.to_uppercase() == upper)
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw value text for `key`, matched case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key)
            .map(|index| self.entries[index].value.as_str())
    }

    /// Coerced value for `key`.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.get(key).map(Value::coerce)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Replaces the value of an existing key in place, or appends a new one.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.position(key) {
            Some(index) => self.entries[index].value = value.trim().to_string(),
            None => self.entries.push(PropertyEntry {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
                leading: None,
            }),
        }
    }

    /// Removes `key`. Missing keys are ignored.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|entry| entry.key.as_str())
    }

    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|entry| entry.value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.key.as_str(), entry.value.as_str()))
    }

    /// Converts to a JSON object with coerced values, preserving order.
    pub fn to_json(&self) -> Json {
        let mut map = Map::new();
        for (key, value) in self.iter() {
            map.insert(key.to_string(), Value::coerce(value).to_json());
        }
        Json::Object(map)
    }

    /// Renders back to property-list text.
    pub fn render(&self) -> String {
        let terminator = format!(" {} ", self.delimiter);
        let mut out = String::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                match &entry.leading {
                    Some(leading) => out.push_str(leading),
                    None => out.push_str(&terminator),
                }
            }
            out.push_str(&entry.key);
            out.push('=');
            out.push_str(&entry.value);
        }
        if !self.entries.is_empty() {
            out.push_str(&terminator);
        }
        out
    }
}

/// Parses a property list into an ordered mapping.
pub fn from_property_list(text: &str, delimiter: &str) -> PropertyList {
    PropertyList::parse(text, delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_set_keeps_source_layout() {
        let mut props = PropertyList::parse("a=1;b=2", ";");
        props.set("B", "9");
        assert_eq!(props.render(), "a=1;b=9 ; ");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let props = PropertyList::parse("Strength = 16 ; Dex=12", ";");
        assert_eq!(props.get("strength"), Some("16"));
        assert_eq!(props.get("DEX"), Some("12"));
        assert_eq!(props.key_at(0), Some("Strength"));
        assert_eq!(props.value("dex"), Some(Value::number(12)));
    }

    #[test]
    fn test_append_and_delete() {
        let mut props = PropertyList::parse("a=1;b=2", ";");
        props.set("c", "3");
        assert_eq!(props.render(), "a=1;b=2 ; c=3 ; ");

        assert!(props.delete("A"));
        assert!(!props.delete("missing"));
        assert_eq!(props.render(), "b=2 ; c=3 ; ");
    }

    #[test]
    fn test_segments_without_keys_are_ignored() {
        let props = PropertyList::parse("junk;a=1; ;b = x y ;", ";");
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("b"), Some("x y"));
    }

    #[test]
    fn test_custom_delimiter() {
        let props = PropertyList::parse("a=1|b=2", "|");
        assert_eq!(props.get("b"), Some("2"));
        assert_eq!(props.render(), "a=1|b=2 | ");
    }

    #[test]
    fn test_property_list_to_json_coerces() {
        let props = PropertyList::parse("hp=007;name=Bob", ";");
        assert_eq!(props.to_json(), json!({"hp": 7, "name": "Bob"}));
        assert_eq!(
            to_property_list(&props.to_json(), ";").as_deref(),
            Some("hp=7;name=Bob")
        );
    }

    #[test]
    fn test_split_list_keeps_empty_items() {
        assert_eq!(split_list("a,b,,d", ","), vec!["a", "b", "", "d"]);
        assert!(split_list("   ", ",").is_empty());
        assert!(split_list("", ",").is_empty());
        assert_eq!(split_list(" x ", ","), vec!["x"]);
    }

    #[test]
    fn test_string_list_coercion() {
        assert_eq!(
            from_string_list("3, x", ","),
            vec![Value::number(3), Value::text("x")]
        );
        assert_eq!(list_to_json("1,a", ","), json!([1, "a"]));
        assert_eq!(to_string_list(&json!([1, "a"]), ", "), "1, a");
        assert_eq!(to_string_list(&json!({"k": 1, "j": 2}), ","), "k,j");
    }

    #[test]
    fn test_to_json_requires_tree() {
        assert!(to_json("5").is_none());
        assert!(to_json("\"text\"").is_none());
        assert_eq!(to_json(" {\"a\":1} "), Some(json!({"a": 1})));
    }
}
