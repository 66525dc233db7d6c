//! `json.*` functions over JSON arrays and objects.
//!
//! Trees are immutable from macro code: every edit returns a new tree.

use super::{delimiter_arg, int_arg, text_arg};
use crate::error::{Flow, MacroError};
use crate::frame::Frame;
use crate::marshal::{self, PropertyList, LIST_DELIMITER, PROPERTY_DELIMITER};
use crate::registry::{FunctionRegistry, MacroFunction};
use crate::value::Value;
use crate::Builtin;
use serde::Serialize;
use serde_json::{Map, Value as Json};

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_builtin::<JsonGet>();
    registry.register_builtin::<JsonSet>();
    registry.register_builtin::<JsonLength>();
    registry.register_builtin::<JsonFields>();
    registry.register_builtin::<JsonType>();
    registry.register_builtin::<JsonIsEmpty>();
    registry.register_builtin::<JsonContains>();
    registry.register_builtin::<JsonAppend>();
    registry.register_builtin::<JsonRemove>();
    registry.register_builtin::<JsonIndent>();
    registry.register_builtin::<JsonFromList>();
    registry.register_builtin::<JsonFromStrProp>();
    registry.register_builtin::<JsonToList>();
    registry.register_builtin::<JsonToStrProp>();
}

/// Reads argument `index` as a tree.
fn tree_arg(function: &str, args: &[Value], index: usize) -> Result<Json, MacroError> {
    let value = args.get(index).cloned().unwrap_or_default();
    value
        .as_json()
        .ok_or_else(|| MacroError::malformed(function, index + 1, format!("'{value}' is not a JSON array or object")))
}

/// Like [`tree_arg`], but empty text stands for `empty`.
fn tree_or(function: &str, args: &[Value], index: usize, empty: Json) -> Result<Json, MacroError> {
    if text_arg(args, index).trim().is_empty() {
        return Ok(empty);
    }
    tree_arg(function, args, index)
}

/// Resolves a possibly negative array index.
fn array_index(function: &str, args: &[Value], index: usize, len: usize) -> Result<usize, MacroError> {
    let raw = int_arg(function, args, index)?;
    let resolved = if raw < 0 { len as i64 + raw } else { raw };
    usize::try_from(resolved)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| MacroError::malformed(function, index + 1, format!("index {raw} is out of bounds for length {len}")))
}

/// Read keys of an object or indexes of an array
///
/// Several object keys give an object of those keys. Two array indexes
/// give the inclusive slice between them, reversed when start > end.
/// Arrays take at most two indexes.
#[derive(Builtin, Default)]
#[builtin(name = "json.get", min = 2, unlimited)]
pub struct JsonGet;

impl MacroFunction for JsonGet {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        match tree_arg(alias, &args, 0)? {
            Json::Object(map) => {
                if args.len() == 2 {
                    return Ok(map
                        .get(&text_arg(&args, 1))
                        .map(Value::from_json)
                        .unwrap_or_default());
                }
                let mut picked = Map::new();
                for key in args[1..].iter().map(Value::to_string) {
                    let value = map.get(&key).cloned().unwrap_or(Json::String(String::new()));
                    picked.insert(key, value);
                }
                Ok(Value::Json(Json::Object(picked)))
            }
            Json::Array(items) => {
                if args.len() == 2 {
                    let index = array_index(alias, &args, 1, items.len())?;
                    return Ok(Value::from_json(&items[index]));
                }
                if args.len() > 3 {
                    return Err(MacroError::Arity {
                        function: alias.to_string(),
                        min: 2,
                        max: Some(3),
                        got: args.len(),
                    }
                    .into());
                }
                let start = array_index(alias, &args, 1, items.len())?;
                let end = array_index(alias, &args, 2, items.len())?;
                let slice: Vec<Json> = if start <= end {
                    items[start..=end].to_vec()
                } else {
                    items[end..=start].iter().rev().cloned().collect()
                };
                Ok(Value::Json(Json::Array(slice)))
            }
            _ => Err(MacroError::malformed(alias, 1, "not a JSON array or object").into()),
        }
    }
}

/// Set key/value pairs on an object, or index/value pairs on an array
#[derive(Builtin, Default)]
#[builtin(name = "json.set", min = 3, unlimited)]
pub struct JsonSet;

impl MacroFunction for JsonSet {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        if args.len() % 2 == 0 {
            return Err(MacroError::malformed(alias, args.len(), "keys and values must come in pairs").into());
        }
        let mut tree = tree_or(alias, &args, 0, Json::Object(Map::new()))?;
        for pair in (1..args.len()).step_by(2) {
            let value = args[pair + 1].to_json();
            match &mut tree {
                Json::Object(map) => {
                    map.insert(args[pair].to_string(), value);
                }
                Json::Array(items) => {
                    let index = array_index(alias, &args, pair, items.len())?;
                    items[index] = value;
                }
                _ => return Err(MacroError::malformed(alias, 1, "not a JSON array or object").into()),
            }
        }
        Ok(Value::Json(tree))
    }
}

/// Number of fields of an object or elements of an array
#[derive(Builtin, Default)]
#[builtin(name = "json.length", min = 1, max = 1)]
pub struct JsonLength;

impl MacroFunction for JsonLength {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let len = match tree_arg(alias, &args, 0)? {
            Json::Object(map) => map.len(),
            Json::Array(items) => items.len(),
            _ => 0,
        };
        Ok(Value::from(len as i64))
    }
}

/// Keys of an object or indexes of an array; delimiter `json` gives an array
#[derive(Builtin, Default)]
#[builtin(name = "json.fields", min = 1, max = 2)]
pub struct JsonFields;

impl MacroFunction for JsonFields {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let fields: Vec<String> = match tree_arg(alias, &args, 0)? {
            Json::Object(map) => map.keys().cloned().collect(),
            Json::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        };
        let delim = delimiter_arg(&args, 1, LIST_DELIMITER);
        if delim.eq_ignore_ascii_case("json") {
            let items = fields.iter().map(|f| Value::coerce(f).to_json()).collect();
            return Ok(Value::Json(Json::Array(items)));
        }
        Ok(Value::text(fields.join(&delim)))
    }
}

/// `OBJECT`, `ARRAY` or `UNKNOWN`
#[derive(Builtin, Default)]
#[builtin(name = "json.type", min = 1, max = 1)]
pub struct JsonType;

impl MacroFunction for JsonType {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let kind = match args.first().and_then(Value::as_json) {
            Some(Json::Object(_)) => "OBJECT",
            Some(Json::Array(_)) => "ARRAY",
            _ => "UNKNOWN",
        };
        Ok(Value::text(kind))
    }
}

/// 1 for an empty tree or empty text, otherwise 0
#[derive(Builtin, Default)]
#[builtin(name = "json.isEmpty", min = 1, max = 1)]
pub struct JsonIsEmpty;

impl MacroFunction for JsonIsEmpty {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let empty = match args.first().and_then(Value::as_json) {
            Some(Json::Object(map)) => map.is_empty(),
            Some(Json::Array(items)) => items.is_empty(),
            _ => text_arg(&args, 0).is_empty(),
        };
        Ok(Value::boolean(empty))
    }
}

/// Whether an object has a key, or an array holds a value
#[derive(Builtin, Default)]
#[builtin(name = "json.contains", min = 2, max = 2)]
pub struct JsonContains;

impl MacroFunction for JsonContains {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let needle = text_arg(&args, 1);
        let found = match tree_arg(alias, &args, 0)? {
            Json::Object(map) => map.contains_key(&needle),
            Json::Array(items) => items
                .iter()
                .any(|item| Value::from_json(item).to_string() == needle),
            _ => false,
        };
        Ok(Value::boolean(found))
    }
}

/// Array with the values added at the end
#[derive(Builtin, Default)]
#[builtin(name = "json.append", min = 2, unlimited)]
pub struct JsonAppend;

impl MacroFunction for JsonAppend {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let Json::Array(mut items) = tree_or(alias, &args, 0, Json::Array(Vec::new()))? else {
            return Err(MacroError::malformed(alias, 1, "only arrays can be appended to").into());
        };
        items.extend(args[1..].iter().map(Value::to_json));
        Ok(Value::Json(Json::Array(items)))
    }
}

/// Tree without a key or array index
#[derive(Builtin, Default)]
#[builtin(name = "json.remove", min = 2, max = 2)]
pub struct JsonRemove;

impl MacroFunction for JsonRemove {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let mut tree = tree_arg(alias, &args, 0)?;
        match &mut tree {
            Json::Object(map) => {
                map.shift_remove(&text_arg(&args, 1));
            }
            Json::Array(items) => {
                let index = array_index(alias, &args, 1, items.len())?;
                items.remove(index);
            }
            _ => {}
        }
        Ok(Value::Json(tree))
    }
}

/// Pretty-printed JSON text, indenting by the given width (default 4)
#[derive(Builtin, Default)]
#[builtin(name = "json.indent", min = 1, max = 2)]
pub struct JsonIndent;

impl MacroFunction for JsonIndent {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let tree = tree_arg(alias, &args, 0)?;
        let width = match args.get(1) {
            Some(_) => usize::try_from(int_arg(alias, &args, 1)?).unwrap_or(0),
            None => 4,
        };
        let indent = " ".repeat(width);
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        tree.serialize(&mut serializer)
            .map_err(|e| MacroError::Evaluation(e.to_string()))?;
        Ok(Value::text(String::from_utf8_lossy(&out).into_owned()))
    }
}

/// Array built from a string list
#[derive(Builtin, Default)]
#[builtin(name = "json.fromList", min = 1, max = 2)]
pub struct JsonFromList;

impl MacroFunction for JsonFromList {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        Ok(Value::Json(marshal::list_to_json(
            &text_arg(&args, 0),
            &delimiter_arg(&args, 1, LIST_DELIMITER),
        )))
    }
}

/// Object built from a property list
#[derive(Builtin, Default)]
#[builtin(name = "json.fromStrProp", min = 1, max = 2)]
pub struct JsonFromStrProp;

impl MacroFunction for JsonFromStrProp {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let props = PropertyList::parse(
            &text_arg(&args, 0),
            &delimiter_arg(&args, 1, PROPERTY_DELIMITER),
        );
        Ok(Value::Json(props.to_json()))
    }
}

/// String list of array elements or object keys
#[derive(Builtin, Default)]
#[builtin(name = "json.toList", min = 1, max = 2)]
pub struct JsonToList;

impl MacroFunction for JsonToList {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let tree = tree_arg(alias, &args, 0)?;
        Ok(Value::text(marshal::to_string_list(
            &tree,
            &delimiter_arg(&args, 1, LIST_DELIMITER),
        )))
    }
}

/// Property list of an object's fields
#[derive(Builtin, Default)]
#[builtin(name = "json.toStrProp", min = 1, max = 2)]
pub struct JsonToStrProp;

impl MacroFunction for JsonToStrProp {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let tree = tree_arg(alias, &args, 0)?;
        let delim = delimiter_arg(&args, 1, PROPERTY_DELIMITER);
        marshal::to_property_list(&tree, &delim)
            .map(Value::text)
            .ok_or_else(|| MacroError::malformed(alias, 1, "only objects convert to property lists").into())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::MacroError;
    use crate::testing::TestHarness;
    use pretty_assertions::assert_eq;

    const SHEET: &str = r#"'{"name":"Orc","hp":"007","tags":["big","mean"]}'"#;

    #[test]
    fn test_get_coerces_scalars() {
        let h = TestHarness::new();
        assert_eq!(h.eval(&format!("[r: json.get({SHEET}, 'hp') + 1]")), "8");
        assert_eq!(h.eval(&format!("[r: json.get({SHEET}, 'missing')]")), "");
        assert_eq!(
            h.eval(&format!("[r: json.get({SHEET}, 'tags')]")),
            r#"["big","mean"]"#
        );
        assert_eq!(
            h.eval(&format!("[r: json.get({SHEET}, 'name', 'hp')]")),
            r#"{"name":"Orc","hp":"007"}"#
        );
    }

    #[test]
    fn test_get_array_slices() {
        let h = TestHarness::new();
        assert_eq!(h.eval("[r: json.get('[10,20,30,40]', -1)]"), "40");
        assert_eq!(h.eval("[r: json.get('[10,20,30,40]', 1, 2)]"), "[20,30]");
        assert_eq!(h.eval("[r: json.get('[10,20,30,40]', 2, 0)]"), "[30,20,10]");
        assert!(matches!(
            h.error("[r: json.get('[1]', 3)]"),
            MacroError::MalformedArgument { position: 2, .. }
        ));
    }

    #[test]
    fn test_get_rejects_a_third_array_index() {
        let h = TestHarness::new();
        assert_eq!(
            h.error("[r: json.get('[1,2,3]', 0, 1, 2)]"),
            MacroError::Arity {
                function: "json.get".to_string(),
                min: 2,
                max: Some(3),
                got: 4,
            }
        );
        // Objects still take any number of keys.
        assert_eq!(
            h.eval(r#"[r: json.get('{"a":1,"b":2,"c":3}', 'a', 'b', 'c')]"#),
            r#"{"a":1,"b":2,"c":3}"#
        );
    }

    #[test]
    fn test_set_and_remove() {
        let h = TestHarness::new();
        assert_eq!(h.eval(r#"[r: json.set("", "a", 1, "b", "x")]"#), r#"{"a":1,"b":"x"}"#);
        assert_eq!(h.eval("[r: json.set('[1,2]', 0, 9)]"), "[9,2]");
        assert_eq!(h.eval(r#"[r: json.remove('{"a":1,"b":2}', "a")]"#), r#"{"b":2}"#);
        assert_eq!(h.eval("[r: json.remove('[1,2,3]', 1)]"), "[1,3]");
        assert!(h.run_trusted(r#"[r: json.set("{}", "a")]"#).is_err());
    }

    #[test]
    fn test_inspection() {
        let h = TestHarness::new();
        assert_eq!(h.eval(&format!("[r: json.length({SHEET})]")), "3");
        assert_eq!(h.eval(&format!("[r: json.fields({SHEET})]")), "name,hp,tags");
        assert_eq!(h.eval(&format!("[r: json.fields({SHEET}, 'json')]")), r#"["name","hp","tags"]"#);
        assert_eq!(h.eval("[r: json.type('[]')] [r: json.type('x')]"), "ARRAY UNKNOWN");
        assert_eq!(h.eval("[r: json.isEmpty('{}')][r: json.isEmpty('[1]')][r: json.isEmpty('')]"), "101");
        assert_eq!(h.eval(&format!("[r: json.contains({SHEET}, 'hp')]")), "1");
        assert_eq!(h.eval("[r: json.contains('[1,2]', 3)]"), "0");
    }

    #[test]
    fn test_append() {
        let h = TestHarness::new();
        assert_eq!(h.eval("[r: json.append('[1]', 2, 'x')]"), r#"[1,2,"x"]"#);
        assert_eq!(h.eval("[r: json.append('', 1)]"), "[1]");
        assert!(h.run_trusted("[r: json.append('{}', 1)]").is_err());
    }

    #[test]
    fn test_conversions() {
        let h = TestHarness::new();
        assert_eq!(h.eval("[r: json.fromList('a, 2, ,d')]"), r#"["a",2,"","d"]"#);
        assert_eq!(h.eval("[r: json.fromStrProp('a=1 ; B=x')]"), r#"{"a":1,"B":"x"}"#);
        assert_eq!(h.eval("[r: json.toList('[1,\"b\"]', '; ')]"), "1; b");
        assert_eq!(h.eval(r#"[r: json.toStrProp('{"a":1,"b":"x"}')]"#), "a=1;b=x");
        assert_eq!(h.eval("[r: json.indent('[1]', 2)]"), "[\n  1\n]");
    }
}
