//! Property-list functions: `getStrProp`, `setStrProp` and friends.

use super::{delimiter_arg, int_arg, text_arg, text_or};
use crate::error::{Flow, MacroError};
use crate::frame::Frame;
use crate::marshal::{self, PropertyList, PROPERTY_DELIMITER};
use crate::registry::{FunctionRegistry, MacroFunction};
use crate::value::Value;
use crate::Builtin;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_builtin::<GetStrProp>();
    registry.register_builtin::<SetStrProp>();
    registry.register_builtin::<DeleteStrProp>();
    registry.register_builtin::<CountStrProp>();
    registry.register_builtin::<IndexKeyStrProp>();
    registry.register_builtin::<IndexValueStrProp>();
    registry.register_builtin::<VarsFromStrProp>();
    registry.register_builtin::<StrPropFromVars>();
    registry.register_builtin::<FormatStrProp>();
}

fn parse(args: &[Value], delim_index: usize) -> PropertyList {
    marshal::from_property_list(
        &text_arg(args, 0),
        &delimiter_arg(args, delim_index, PROPERTY_DELIMITER),
    )
}

/// Entry at a position; out of range positions give `None`.
fn entry_index(function: &str, args: &[Value]) -> Result<Option<usize>, MacroError> {
    let index = int_arg(function, args, 1)?;
    Ok(usize::try_from(index).ok())
}

/// Value of a key, or the default (empty text) when absent
#[derive(Builtin, Default)]
#[builtin(name = "getStrProp", min = 2, max = 4)]
pub struct GetStrProp;

impl MacroFunction for GetStrProp {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let props = parse(&args, 3);
        Ok(props
            .value(&text_arg(&args, 1))
            .unwrap_or_else(|| args.get(2).cloned().unwrap_or_default()))
    }
}

/// Set a key, keeping the order and casing of existing entries
#[derive(Builtin, Default)]
#[builtin(name = "setStrProp", min = 3, max = 4)]
pub struct SetStrProp;

impl MacroFunction for SetStrProp {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let mut props = parse(&args, 3);
        props.set(&text_arg(&args, 1), &text_arg(&args, 2));
        Ok(Value::text(props.render()))
    }
}

/// Remove a key; removing a missing key is not an error
#[derive(Builtin, Default)]
#[builtin(name = "deleteStrProp", min = 2, max = 3)]
pub struct DeleteStrProp;

impl MacroFunction for DeleteStrProp {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let mut props = parse(&args, 2);
        props.delete(&text_arg(&args, 1));
        Ok(Value::text(props.render()))
    }
}

/// Number of entries
#[derive(Builtin, Default)]
#[builtin(name = "countStrProp", min = 1, max = 2)]
pub struct CountStrProp;

impl MacroFunction for CountStrProp {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        Ok(Value::from(parse(&args, 1).len() as i64))
    }
}

/// Key at a position, or empty text out of range
#[derive(Builtin, Default)]
#[builtin(name = "indexKeyStrProp", min = 2, max = 3)]
pub struct IndexKeyStrProp;

impl MacroFunction for IndexKeyStrProp {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let props = parse(&args, 2);
        let key = entry_index(alias, &args)?
            .and_then(|index| props.key_at(index))
            .unwrap_or_default();
        Ok(Value::text(key))
    }
}

/// Value at a position, or empty text out of range
#[derive(Builtin, Default)]
#[builtin(name = "indexValueStrProp", min = 2, max = 3)]
pub struct IndexValueStrProp;

impl MacroFunction for IndexValueStrProp {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let props = parse(&args, 2);
        Ok(entry_index(alias, &args)?
            .and_then(|index| props.value_at(index))
            .map(Value::coerce)
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarStyle {
    None,
    Suffixed,
    Unsuffixed,
}

impl VarStyle {
    fn parse(text: &str) -> Option<Self> {
        match text.to_uppercase().as_str() {
            "NONE" => Some(VarStyle::None),
            "SUFFIXED" => Some(VarStyle::Suffixed),
            "UNSUFFIXED" => Some(VarStyle::Unsuffixed),
            _ => None,
        }
    }

    fn variable(&self, key: &str) -> String {
        match self {
            VarStyle::Suffixed => format!("{key}_"),
            _ => key.to_string(),
        }
    }
}

/// Bind each entry as a variable; returns the number of entries
///
/// With two arguments, a second argument that is not a style is taken as
/// the delimiter.
#[derive(Builtin, Default)]
#[builtin(name = "varsFromStrProp", min = 1, max = 3)]
pub struct VarsFromStrProp;

impl MacroFunction for VarsFromStrProp {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let (style, delim) = match args.len() {
            1 => (VarStyle::Unsuffixed, PROPERTY_DELIMITER.to_string()),
            _ => {
                let second = text_arg(&args, 1);
                match (VarStyle::parse(&second), args.len()) {
                    (Some(style), _) => (style, delimiter_arg(&args, 2, PROPERTY_DELIMITER)),
                    (None, 2) => (VarStyle::Unsuffixed, second),
                    (None, _) => {
                        return Err(MacroError::malformed(
                            alias,
                            2,
                            format!("'{second}' is not NONE, SUFFIXED or UNSUFFIXED"),
                        )
                        .into())
                    }
                }
            }
        };

        if style == VarStyle::None {
            return Ok(Value::from(0_i64));
        }
        let props = marshal::from_property_list(&text_arg(&args, 0), &delim);
        for (key, value) in props.iter() {
            frame.bind(style.variable(key), Value::coerce(value));
        }
        Ok(Value::from(props.len() as i64))
    }
}

/// Build a property list from the named variables; unbound names are skipped
#[derive(Builtin, Default)]
#[builtin(name = "strPropFromVars", min = 2, max = 3)]
pub struct StrPropFromVars;

impl MacroFunction for StrPropFromVars {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let style_text = text_arg(&args, 1);
        let style = match VarStyle::parse(&style_text) {
            Some(style @ (VarStyle::Suffixed | VarStyle::Unsuffixed)) => style,
            _ => {
                return Err(MacroError::malformed(
                    alias,
                    2,
                    format!("'{style_text}' is not SUFFIXED or UNSUFFIXED"),
                )
                .into())
            }
        };
        let delim = delimiter_arg(&args, 2, PROPERTY_DELIMITER);

        let mut props = PropertyList::new(&delim);
        for name in marshal::split_list(&text_arg(&args, 0), marshal::LIST_DELIMITER) {
            if name.is_empty() {
                continue;
            }
            if let Some(value) = frame.scope().resolve(&style.variable(&name)) {
                props.set(&name, &value.to_string());
            }
        }
        Ok(Value::text(props.render()))
    }
}

/// Format entries with `%key` and `%value`, then place them at `%list`
#[derive(Builtin, Default)]
#[builtin(name = "formatStrProp", min = 4, max = 5)]
pub struct FormatStrProp;

impl MacroFunction for FormatStrProp {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let props = parse(&args, 4);
        let list_format = text_or(&args, 1, "%list");
        let entry_format = text_arg(&args, 2);
        let separator = text_arg(&args, 3);

        let entries: Vec<String> = props
            .iter()
            .map(|(key, value)| entry_format.replace("%key", key).replace("%value", value))
            .collect();
        Ok(Value::text(
            list_format.replacen("%list", &entries.join(&separator), 1),
        ))
    }
}
