//! Turn order.
//!
//! Every function reads the list from the session, changes a copy and writes
//! it back whole.

use super::{bool_arg, int_arg};
use crate::error::Flow;
use crate::frame::Frame;
use crate::registry::{FunctionRegistry, MacroFunction};
use crate::value::Value;
use crate::world::InitiativeList;
use crate::Builtin;
use tracing::debug;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_builtin::<AddToInitiative>();
    registry.register_builtin::<RemoveFromInitiative>();
    registry.register_builtin::<GetInitiativeRound>();
    registry.register_builtin::<SetInitiativeRound>();
    registry.register_builtin::<NextInitiative>();
    registry.register_builtin::<GetCurrentInitiative>();
    registry.register_builtin::<InitiativeSize>();
}

fn current_index(list: &InitiativeList) -> Value {
    Value::from(list.current.map(|index| index as i64).unwrap_or(-1))
}

/// Add the Subject to the turn order; `(allowDuplicates=0, initiative)`
#[derive(Builtin, Default)]
#[builtin(name = "addToInitiative", min = 0, max = 2)]
pub struct AddToInitiative;

impl MacroFunction for AddToInitiative {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let token = frame.require_subject(alias)?;
        let session = frame.session();
        let mut list = session.initiative();
        if !bool_arg(&args, 0, false) && list.contains(token) {
            return Ok(Value::boolean(false));
        }
        let initiative = args
            .get(1)
            .map(Value::to_string)
            .filter(|text| !text.is_empty());
        list.add(token, initiative);
        session.put_initiative(list);
        debug!(token = %token, "added to initiative");
        Ok(Value::boolean(true))
    }
}

/// Remove every entry of the Subject; returns how many were removed
#[derive(Builtin, Default)]
#[builtin(name = "removeFromInitiative")]
pub struct RemoveFromInitiative;

impl MacroFunction for RemoveFromInitiative {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, _args: Vec<Value>) -> Flow<Value> {
        let token = frame.require_subject(alias)?;
        let session = frame.session();
        let mut list = session.initiative();
        let removed = list.remove(token);
        session.put_initiative(list);
        Ok(Value::from(removed as i64))
    }
}

#[derive(Builtin, Default)]
#[builtin(name = "getInitiativeRound")]
pub struct GetInitiativeRound;

impl MacroFunction for GetInitiativeRound {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, _args: Vec<Value>) -> Flow<Value> {
        Ok(Value::from(frame.session().initiative().round))
    }
}

#[derive(Builtin, Default)]
#[builtin(name = "setInitiativeRound", min = 1, max = 1, trusted)]
pub struct SetInitiativeRound;

impl MacroFunction for SetInitiativeRound {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let round = int_arg(alias, &args, 0)?;
        let session = frame.session();
        let mut list = session.initiative();
        list.round = round;
        session.put_initiative(list);
        Ok(Value::empty())
    }
}

/// Advance the turn, starting a new round after the last entry
#[derive(Builtin, Default)]
#[builtin(name = "nextInitiative", trusted)]
pub struct NextInitiative;

impl MacroFunction for NextInitiative {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, _args: Vec<Value>) -> Flow<Value> {
        let session = frame.session();
        let mut list = session.initiative();
        list.next();
        let current = current_index(&list);
        debug!(round = list.round, current = %current, "initiative advanced");
        session.put_initiative(list);
        Ok(current)
    }
}

/// Index of the entry whose turn it is, or -1
#[derive(Builtin, Default)]
#[builtin(name = "getCurrentInitiative")]
pub struct GetCurrentInitiative;

impl MacroFunction for GetCurrentInitiative {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, _args: Vec<Value>) -> Flow<Value> {
        Ok(current_index(&frame.session().initiative()))
    }
}

#[derive(Builtin, Default)]
#[builtin(name = "initiativeSize")]
pub struct InitiativeSize;

impl MacroFunction for InitiativeSize {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, _args: Vec<Value>) -> Flow<Value> {
        Ok(Value::from(frame.session().initiative().entries.len() as i64))
    }
}
