//! Token and session functions.
//!
//! Reads default to the Subject and accept an explicit token id or name.
//! Writing to any token other than the Subject requires a trusted macro.

use super::{bool_arg, check_alias_arity, delimiter_arg, text_arg};
use crate::error::{Flow, MacroError};
use crate::frame::Frame;
use crate::registry::{FunctionRegistry, MacroFunction};
use crate::value::Value;
use crate::world::Token;
use crate::Builtin;
use serde_json::Value as Json;
use tracing::debug;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_builtin::<CurrentToken>();
    registry.register_builtin::<TokenName>();
    registry.register_builtin::<GetProperty>();
    registry.register_builtin::<SetProperty>();
    registry.register_builtin::<GetState>();
    registry.register_builtin::<SetState>();
    registry.register_builtin::<GetOwners>();
    registry.register_builtin::<FindToken>();
    registry.register_builtin::<GetSelected>();
    registry.register_builtin::<IsGm>();
    registry.register_builtin::<GetPlayerName>();
}

/// Token named by argument `index`, or the Subject when it is absent.
///
/// With `write` set, naming a token other than the Subject needs trust.
fn target_token(
    frame: &Frame<'_>,
    function: &str,
    args: &[Value],
    index: usize,
    write: bool,
) -> Result<Token, MacroError> {
    let Some(named) = args.get(index) else {
        return frame.subject_token(function);
    };
    let token = frame.find_token(function, &named.to_string())?;
    if write && frame.subject() != Some(token.id) {
        frame.require_trust(function)?;
    }
    Ok(token)
}

fn store(frame: &Frame<'_>, function: &str, token: Token) -> Result<(), MacroError> {
    let id = token.id;
    if !frame.session().put_token(token) {
        return Err(MacroError::UnknownToken {
            function: function.to_string(),
            token: id.to_string(),
        });
    }
    debug!(function = %function, token = %id, "token updated");
    Ok(())
}

/// Joins `items` with `delim`, or builds a JSON array for the `json` delimiter.
fn joined(items: Vec<String>, delim: &str) -> Value {
    if delim.eq_ignore_ascii_case("json") {
        return Value::Json(Json::Array(items.into_iter().map(Json::String).collect()));
    }
    Value::text(items.join(delim))
}

/// Id of the Subject token, or empty text
#[derive(Builtin, Default)]
#[builtin(name = "currentToken")]
pub struct CurrentToken;

impl MacroFunction for CurrentToken {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, _args: Vec<Value>) -> Flow<Value> {
        Ok(frame
            .subject()
            .map(|id| Value::text(id.to_string()))
            .unwrap_or_default())
    }
}

/// Read or change a token's name
#[derive(Builtin, Default)]
#[builtin(name = "getName", alias = "setName", min = 0, max = 2)]
pub struct TokenName;

impl MacroFunction for TokenName {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        if alias == "setName" {
            check_alias_arity(alias, &args, 1, 2)?;
            let name = text_arg(&args, 0).trim().to_string();
            if name.is_empty() {
                return Err(MacroError::malformed(alias, 1, "token name is empty").into());
            }
            let mut token = target_token(frame, alias, &args, 1, true)?;
            token.name = name;
            store(frame, alias, token)?;
            return Ok(Value::empty());
        }
        check_alias_arity(alias, &args, 0, 1)?;
        let token = target_token(frame, alias, &args, 0, false)?;
        Ok(Value::text(token.name))
    }
}

/// Property value of a token, or empty text when unset
#[derive(Builtin, Default)]
#[builtin(name = "getProperty", min = 1, max = 2)]
pub struct GetProperty;

impl MacroFunction for GetProperty {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let token = target_token(frame, alias, &args, 1, false)?;
        Ok(token
            .property(&text_arg(&args, 0))
            .map(Value::coerce)
            .unwrap_or_default())
    }
}

#[derive(Builtin, Default)]
#[builtin(name = "setProperty", min = 2, max = 3)]
pub struct SetProperty;

impl MacroFunction for SetProperty {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let name = text_arg(&args, 0).trim().to_string();
        if name.is_empty() {
            return Err(MacroError::malformed(alias, 1, "property name is empty").into());
        }
        let mut token = target_token(frame, alias, &args, 2, true)?;
        token.set_property(&name, text_arg(&args, 1));
        store(frame, alias, token)?;
        Ok(Value::empty())
    }
}

/// Whether a named state is set on a token
#[derive(Builtin, Default)]
#[builtin(name = "getState", min = 1, max = 2)]
pub struct GetState;

impl MacroFunction for GetState {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let token = target_token(frame, alias, &args, 1, false)?;
        Ok(Value::boolean(token.state(&text_arg(&args, 0))))
    }
}

#[derive(Builtin, Default)]
#[builtin(name = "setState", min = 2, max = 3)]
pub struct SetState;

impl MacroFunction for SetState {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let name = text_arg(&args, 0).trim().to_string();
        if name.is_empty() {
            return Err(MacroError::malformed(alias, 1, "state name is empty").into());
        }
        let on = bool_arg(&args, 1, false);
        let mut token = target_token(frame, alias, &args, 2, true)?;
        token.states.insert(name, on);
        store(frame, alias, token)?;
        Ok(Value::boolean(on))
    }
}

/// Owners of a token; `(delim=",", token)`
#[derive(Builtin, Default)]
#[builtin(name = "getOwners", min = 0, max = 2)]
pub struct GetOwners;

impl MacroFunction for GetOwners {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let token = target_token(frame, alias, &args, 1, false)?;
        let owners = token.owners.into_iter().collect();
        Ok(joined(owners, &delimiter_arg(&args, 0, ",")))
    }
}

/// Id of a token by id or name, or empty text
#[derive(Builtin, Default)]
#[builtin(name = "findToken", min = 1, max = 1)]
pub struct FindToken;

impl MacroFunction for FindToken {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        Ok(frame
            .session()
            .find_token(&text_arg(&args, 0))
            .map(|token| Value::text(token.id.to_string()))
            .unwrap_or_default())
    }
}

/// Ids of the selected tokens
#[derive(Builtin, Default)]
#[builtin(name = "getSelected", min = 0, max = 1)]
pub struct GetSelected;

impl MacroFunction for GetSelected {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let ids = frame
            .session()
            .selected()
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        Ok(joined(ids, &delimiter_arg(&args, 0, ",")))
    }
}

/// Whether a player, by default the caller, is a GM
#[derive(Builtin, Default)]
#[builtin(name = "isGM", min = 0, max = 1)]
pub struct IsGm;

impl MacroFunction for IsGm {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let player = match args.first() {
            Some(name) => name.to_string(),
            None => frame.player().to_string(),
        };
        Ok(Value::boolean(frame.session().is_gm(&player)))
    }
}

#[derive(Builtin, Default)]
#[builtin(name = "getPlayerName")]
pub struct GetPlayerName;

impl MacroFunction for GetPlayerName {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, _args: Vec<Value>) -> Flow<Value> {
        Ok(Value::text(frame.player()))
    }
}
