//! String-list functions. Items are trimmed; results are joined with `", "`.

use super::{delimiter_arg, int_arg, text_arg};
use crate::error::{Flow, MacroError};
use crate::frame::Frame;
use crate::marshal::{self, LIST_DELIMITER};
use crate::registry::{FunctionRegistry, MacroFunction};
use crate::value::Value;
use crate::Builtin;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_builtin::<ListGet>();
    registry.register_builtin::<ListDelete>();
    registry.register_builtin::<ListCount>();
    registry.register_builtin::<ListFind>();
    registry.register_builtin::<ListAppend>();
    registry.register_builtin::<ListInsert>();
    registry.register_builtin::<ListReplace>();
}

fn items(args: &[Value], delim_index: usize) -> Vec<String> {
    marshal::split_list(
        &text_arg(args, 0),
        &delimiter_arg(args, delim_index, LIST_DELIMITER),
    )
}

/// Position argument; negative positions are kept as `None`.
fn position(function: &str, args: &[Value]) -> Result<Option<usize>, MacroError> {
    Ok(usize::try_from(int_arg(function, args, 1)?).ok())
}

/// Item at a position, or empty text out of range
#[derive(Builtin, Default)]
#[builtin(name = "listGet", min = 2, max = 3)]
pub struct ListGet;

impl MacroFunction for ListGet {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let items = items(&args, 2);
        Ok(position(alias, &args)?
            .and_then(|index| items.get(index))
            .map(|item| Value::coerce(item))
            .unwrap_or_default())
    }
}

/// List without the item at a position
#[derive(Builtin, Default)]
#[builtin(name = "listDelete", min = 2, max = 3)]
pub struct ListDelete;

impl MacroFunction for ListDelete {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let mut items = items(&args, 2);
        if let Some(index) = position(alias, &args)? {
            if index < items.len() {
                items.remove(index);
            }
        }
        Ok(Value::text(marshal::join_list(&items)))
    }
}

/// Number of items
#[derive(Builtin, Default)]
#[builtin(name = "listCount", min = 1, max = 2)]
pub struct ListCount;

impl MacroFunction for ListCount {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        Ok(Value::from(items(&args, 1).len() as i64))
    }
}

/// Position of the first case-insensitive match, or -1
#[derive(Builtin, Default)]
#[builtin(name = "listFind", min = 2, max = 3)]
pub struct ListFind;

impl MacroFunction for ListFind {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let target = text_arg(&args, 1);
        let target = target.trim();
        let found = items(&args, 2)
            .iter()
            .position(|item| item.eq_ignore_ascii_case(target))
            .map(|index| index as i64)
            .unwrap_or(-1);
        Ok(Value::from(found))
    }
}

/// List with an item added at the end
#[derive(Builtin, Default)]
#[builtin(name = "listAppend", min = 2, max = 3)]
pub struct ListAppend;

impl MacroFunction for ListAppend {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let mut items = items(&args, 2);
        items.push(text_arg(&args, 1).trim().to_string());
        Ok(Value::text(marshal::join_list(&items)))
    }
}

/// List with an item inserted before a position; past the end appends
#[derive(Builtin, Default)]
#[builtin(name = "listInsert", min = 3, max = 4)]
pub struct ListInsert;

impl MacroFunction for ListInsert {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let mut items = items(&args, 3);
        let index = position(alias, &args)?.ok_or_else(|| {
            MacroError::malformed(alias, 2, "insert position is negative")
        })?;
        let target = text_arg(&args, 2).trim().to_string();
        items.insert(index.min(items.len()), target);
        Ok(Value::text(marshal::join_list(&items)))
    }
}

/// List with the item at a position replaced
#[derive(Builtin, Default)]
#[builtin(name = "listReplace", min = 3, max = 4)]
pub struct ListReplace;

impl MacroFunction for ListReplace {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let mut items = items(&args, 3);
        if let Some(slot) = position(alias, &args)?.and_then(|index| items.get_mut(index)) {
            *slot = text_arg(&args, 2).trim().to_string();
        }
        Ok(Value::text(marshal::join_list(&items)))
    }
}
