//! Scope and flow control: `arg`, `argCount`, `set`, `abort`, `assert`.

use super::{bool_arg, index_arg, text_arg};
use crate::error::{AbortSignal, Flow, MacroError};
use crate::frame::Frame;
use crate::registry::{FunctionRegistry, MacroFunction};
use crate::scope::{macro_arg_name, MACRO_ARGS_NUM};
use crate::value::Value;
use crate::Builtin;
use rust_decimal::prelude::ToPrimitive;

/// Prefix added to `assert` messages unless turned off.
pub const ASSERT_PREFIX: &str = "Macro-defined error: ";

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_builtin::<Arg>();
    registry.register_builtin::<ArgCount>();
    registry.register_builtin::<Set>();
    registry.register_builtin::<Abort>();
    registry.register_builtin::<Assert>();
}

fn arg_count(frame: &Frame<'_>) -> usize {
    frame
        .scope()
        .resolve(MACRO_ARGS_NUM)
        .and_then(|v| v.as_number())
        .and_then(|n| n.to_usize())
        .unwrap_or(0)
}

/// Argument passed to the current user function
#[derive(Builtin, Default)]
#[builtin(name = "arg", min = 1, max = 1)]
pub struct Arg;

impl MacroFunction for Arg {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let index = index_arg(alias, &args, 0)?;
        let count = arg_count(frame);
        if index >= count {
            return Err(MacroError::malformed(
                alias,
                1,
                format!("index {index} is out of range, {count} arguments were passed"),
            )
            .into());
        }
        Ok(frame
            .scope()
            .resolve(&macro_arg_name(index))
            .unwrap_or_default())
    }
}

/// Number of arguments passed to the current user function
#[derive(Builtin, Default)]
#[builtin(name = "argCount")]
pub struct ArgCount;

impl MacroFunction for ArgCount {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, _args: Vec<Value>) -> Flow<Value> {
        Ok(Value::from(arg_count(frame) as i64))
    }
}

/// Bind name/value pairs in the current scope
#[derive(Builtin, Default)]
#[builtin(name = "set", min = 2, unlimited)]
pub struct Set;

impl MacroFunction for Set {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        if args.len() % 2 != 0 {
            return Err(MacroError::malformed(alias, args.len(), "names and values must come in pairs").into());
        }
        for pair in args.chunks(2) {
            let name = pair[0].to_string();
            if name.trim().is_empty() {
                return Err(MacroError::malformed(alias, 1, "variable name is empty").into());
            }
            frame.bind(name, pair[1].clone());
        }
        Ok(Value::empty())
    }
}

/// Stop the current macro silently
#[derive(Builtin, Default)]
#[builtin(name = "abort", min = 0, max = 1)]
pub struct Abort;

impl MacroFunction for Abort {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let message = args.first().map(Value::to_string);
        Err(AbortSignal::new(message).into())
    }
}

/// Fail with a user-visible message when the condition is false
#[derive(Builtin, Default)]
#[builtin(name = "assert", min = 2, max = 3)]
pub struct Assert;

impl MacroFunction for Assert {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        if args[0].as_bool() {
            return Ok(Value::boolean(true));
        }
        let message = text_arg(&args, 1);
        let message = if bool_arg(&args, 2, true) {
            format!("{ASSERT_PREFIX}{message}")
        } else {
            message
        };
        Err(MacroError::AssertionFailed { message }.into())
    }
}
