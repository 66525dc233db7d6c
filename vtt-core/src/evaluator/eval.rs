//! Tree-walking evaluation against a [`Frame`].

use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::dice::DiceExpression;
use crate::error::{Flow, MacroError};
use crate::frame::Frame;
use crate::value::Value;
use rust_decimal::Decimal;
use std::cmp::Ordering;

fn error(message: impl Into<String>) -> MacroError {
    MacroError::Evaluation(message.into())
}

pub fn eval(expr: &Expr, frame: &mut Frame<'_>) -> Flow<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Dice(notation) => {
            let roll = DiceExpression::parse(notation)
                .and_then(|dice| dice.roll())
                .map_err(|e| error(e.to_string()))?;
            Ok(Value::from(roll.total))
        }
        Expr::Variable(name) => lookup(frame, name),
        Expr::Call(name, arg_exprs) => {
            let mut args = Vec::with_capacity(arg_exprs.len());
            for arg in arg_exprs {
                args.push(eval(arg, frame)?);
            }
            frame.dispatch(name, args)
        }
        Expr::Assign(name, value) => {
            let value = eval(value, frame)?;
            frame.bind(name.clone(), value.clone());
            Ok(value)
        }
        Expr::Unary(UnaryOp::Not, operand) => Ok(Value::boolean(!eval(operand, frame)?.as_bool())),
        Expr::Unary(UnaryOp::Negate, operand) => {
            let value = eval(operand, frame)?;
            let n = value
                .as_number()
                .ok_or_else(|| error(format!("Cannot negate '{value}'")))?;
            Ok(Value::Number(-n))
        }
        Expr::Binary(BinaryOp::And, left, right) => {
            let result = eval(left, frame)?.as_bool() && eval(right, frame)?.as_bool();
            Ok(Value::boolean(result))
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            let result = eval(left, frame)?.as_bool() || eval(right, frame)?.as_bool();
            Ok(Value::boolean(result))
        }
        Expr::Binary(op, left, right) => {
            let left = eval(left, frame)?;
            let right = eval(right, frame)?;
            Ok(binary(*op, &left, &right)?)
        }
    }
}

fn lookup(frame: &Frame<'_>, name: &str) -> Flow<Value> {
    if let Some(value) = frame.lookup(name) {
        return Ok(value);
    }
    if name.eq_ignore_ascii_case("true") {
        return Ok(Value::boolean(true));
    }
    if name.eq_ignore_ascii_case("false") {
        return Ok(Value::boolean(false));
    }
    Err(error(format!("Undefined variable '{name}'")).into())
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, MacroError> {
    let numbers = left.as_number().zip(right.as_number());

    match op {
        BinaryOp::Add => match numbers {
            Some((a, b)) => checked(a.checked_add(b)),
            None => Ok(Value::text(format!("{left}{right}"))),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            let (a, b) = numbers.ok_or_else(|| {
                error(format!("Cannot apply arithmetic to '{left}' and '{right}'"))
            })?;
            match op {
                BinaryOp::Sub => checked(a.checked_sub(b)),
                BinaryOp::Mul => checked(a.checked_mul(b)),
                _ if b.is_zero() => Err(error("Division by zero")),
                _ => checked(a.checked_div(b)),
            }
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = match numbers {
                Some((a, b)) => a == b,
                None => left.to_string() == right.to_string(),
            };
            Ok(Value::boolean(equal == (op == BinaryOp::Eq)))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match numbers {
                Some((a, b)) => a.cmp(&b),
                None => left.to_string().cmp(&right.to_string()),
            };
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::boolean(result))
        }
        // `eval` short-circuits these before both operands are known.
        BinaryOp::And => Ok(Value::boolean(left.as_bool() && right.as_bool())),
        BinaryOp::Or => Ok(Value::boolean(left.as_bool() || right.as_bool())),
    }
}

fn checked(result: Option<Decimal>) -> Result<Value, MacroError> {
    result
        .map(Value::Number)
        .ok_or_else(|| error("Numeric overflow"))
}
