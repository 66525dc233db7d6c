//! Built-in macro functions.
//!
//! Each built-in is a unit struct deriving [`Builtin`](vtt_macros::Builtin)
//! for its descriptor and implementing [`MacroFunction`] for its body.
//! Argument positions in error messages are 1-based.

pub mod chat;
pub mod control;
pub mod dice;
pub mod functions;
pub mod initiative;
pub mod json;
pub mod links;
pub mod strlist;
pub mod strprop;
pub mod token;

use crate::error::MacroError;
use crate::registry::FunctionRegistry;
use crate::value::Value;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Registers every built-in on `registry`.
pub fn register_all(registry: &mut FunctionRegistry) {
    strprop::register(registry);
    strlist::register(registry);
    json::register(registry);
    control::register(registry);
    functions::register(registry);
    links::register(registry);
    token::register(registry);
    chat::register(registry);
    initiative::register(registry);
    dice::register(registry);
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Text of argument `index`, or empty text when it was not given.
pub(crate) fn text_arg(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_string).unwrap_or_default()
}

/// Text of argument `index`, or `default` when it was not given.
pub(crate) fn text_or(args: &[Value], index: usize, default: &str) -> String {
    args.get(index)
        .map(Value::to_string)
        .unwrap_or_else(|| default.to_string())
}

/// Delimiter argument; an empty one falls back to `default`.
pub(crate) fn delimiter_arg(args: &[Value], index: usize, default: &str) -> String {
    match args.get(index).map(Value::to_string) {
        Some(delim) if !delim.is_empty() => delim,
        _ => default.to_string(),
    }
}

pub(crate) fn number_arg(function: &str, args: &[Value], index: usize) -> Result<Decimal, MacroError> {
    let value = args.get(index).cloned().unwrap_or_default();
    value
        .as_number()
        .ok_or_else(|| MacroError::malformed(function, index + 1, format!("'{value}' is not a number")))
}

/// Whole-number argument.
pub(crate) fn int_arg(function: &str, args: &[Value], index: usize) -> Result<i64, MacroError> {
    let n = number_arg(function, args, index)?;
    n.trunc()
        .to_i64()
        .ok_or_else(|| MacroError::malformed(function, index + 1, format!("'{n}' is out of range")))
}

/// Non-negative position argument.
pub(crate) fn index_arg(function: &str, args: &[Value], index: usize) -> Result<usize, MacroError> {
    let n = int_arg(function, args, index)?;
    usize::try_from(n)
        .map_err(|_| MacroError::malformed(function, index + 1, format!("index {n} is negative")))
}

/// Flag argument under the shared boolean rule, or `default` when absent.
pub(crate) fn bool_arg(args: &[Value], index: usize, default: bool) -> bool {
    args.get(index).map(Value::as_bool).unwrap_or(default)
}

/// Tighter arity check for one alias of a shared descriptor.
pub(crate) fn check_alias_arity(
    alias: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), MacroError> {
    let got = args.len();
    if got < min || got > max {
        return Err(MacroError::Arity {
            function: alias.to_string(),
            min,
            max: Some(max),
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_covers_every_family() {
        let registry = FunctionRegistry::with_builtins();
        for name in [
            "getStrProp",
            "listGet",
            "json.get",
            "abort",
            "defineFunction",
            "macroLink",
            "getName",
            "setName",
            "broadcast",
            "nextInitiative",
            "roll",
        ] {
            assert!(registry.contains(name), "{name} is not registered");
        }
    }

    #[test]
    fn test_index_arg() {
        let args = vec![Value::from(2_i64), Value::from(-1_i64), Value::text("x")];
        assert_eq!(index_arg("f", &args, 0).unwrap(), 2);
        assert!(matches!(
            index_arg("f", &args, 1),
            Err(MacroError::MalformedArgument { position: 2, .. })
        ));
        assert!(index_arg("f", &args, 2).is_err());
    }

    #[test]
    fn test_alias_arity() {
        let args = vec![Value::empty(); 3];
        assert!(check_alias_arity("getName", &args, 0, 1).is_err());
        assert!(check_alias_arity("setName", &args[..2], 1, 2).is_ok());
    }

    #[test]
    fn test_delimiter_falls_back() {
        let args = vec![Value::empty(), Value::empty()];
        assert_eq!(delimiter_arg(&args, 1, ";"), ";");
        assert_eq!(delimiter_arg(&args, 5, ","), ",");
    }
}
