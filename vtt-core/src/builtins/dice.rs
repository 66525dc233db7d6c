//! Dice.

use super::int_arg;
use crate::dice::{DiceError, DiceExpression};
use crate::error::{Flow, MacroError};
use crate::frame::Frame;
use crate::registry::{FunctionRegistry, MacroFunction};
use crate::value::Value;
use crate::Builtin;
use tracing::debug;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_builtin::<Roll>();
}

fn die_arg(function: &str, args: &[Value], index: usize) -> Result<u32, MacroError> {
    let n = int_arg(function, args, index)?;
    u32::try_from(n)
        .map_err(|_| MacroError::malformed(function, index + 1, format!("{n} is not a valid die count")))
}

/// Roll `count` dice with `sides` sides and sum them
#[derive(Builtin, Default)]
#[builtin(name = "roll", min = 2, max = 2, nondeterministic)]
pub struct Roll;

impl MacroFunction for Roll {
    fn evaluate(&self, _frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let count = die_arg(alias, &args, 0)?;
        let sides = die_arg(alias, &args, 1)?;
        let result = DiceExpression::simple(count, sides)
            .and_then(|expression| expression.roll())
            .map_err(|err| {
                let position = if matches!(err, DiceError::TooManyDice { .. }) { 1 } else { 2 };
                MacroError::malformed(alias, position, err.to_string())
            })?;
        debug!(roll = %result, "rolled dice");
        Ok(Value::from(result.total))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::MacroError;
    use crate::testing::TestHarness;

    #[test]
    fn test_roll_stays_in_range() {
        let h = TestHarness::new();
        for _ in 0..20 {
            let total: i64 = h.eval("[r: roll(3, 6)]").parse().unwrap();
            assert!((3..=18).contains(&total));
        }
        assert_eq!(h.eval("[r: roll(0, 6)]"), "0");
    }

    #[test]
    fn test_roll_rejects_bad_dice() {
        let h = TestHarness::new();
        assert!(matches!(
            h.error("[r: roll(1, 0)]"),
            MacroError::MalformedArgument { position: 2, .. }
        ));
        assert!(matches!(
            h.error("[r: roll(-1, 6)]"),
            MacroError::MalformedArgument { position: 1, .. }
        ));
    }

    #[test]
    fn test_roll_rejects_oversized_pools() {
        let h = TestHarness::new();
        assert!(matches!(
            h.error("[r: roll(3000000000, 6)]"),
            MacroError::MalformedArgument { position: 1, .. }
        ));
        assert!(matches!(
            h.error("[r: roll(2, 2000000)]"),
            MacroError::MalformedArgument { position: 2, .. }
        ));
        let total: i64 = h.eval("[r: roll(10000, 1)]").parse().unwrap();
        assert_eq!(total, 10_000);
    }
}
