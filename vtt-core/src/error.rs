//! Error and control-flow types for macro evaluation.
//!
//! Two things can cut a macro body short:
//! - [`MacroError`], which always propagates to whoever started the macro
//! - [`AbortSignal`], a silent stop caught at the nearest invocation boundary
//!
//! Both travel through [`Interrupt`], so `?` unwinds either one and only
//! boundary code ever has to look inside.

use std::fmt;
use thiserror::Error;

/// Errors raised while dispatching or evaluating macro code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacroError {
    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Function '{function}' requires {} arguments, {got} given", describe_bounds(.min, .max))]
    Arity {
        function: String,
        min: usize,
        max: Option<usize>,
        got: usize,
    },

    #[error("You do not have permission to use the '{function}' function")]
    Permission { function: String },

    #[error("Function '{function}' needs a current token and none is set")]
    NoSubject { function: String },

    #[error("Argument {position} of '{function}' is invalid: {reason}")]
    MalformedArgument {
        function: String,
        position: usize,
        reason: String,
    },

    #[error("{message}")]
    AssertionFailed { message: String },

    #[error("Function '{function}' could not find token '{token}'")]
    UnknownToken { function: String, token: String },

    #[error("Could not find macro '{name}': {reason}")]
    UnknownMacro { name: String, reason: String },

    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl MacroError {
    /// Shorthand for a [`MacroError::MalformedArgument`].
    pub fn malformed(
        function: impl Into<String>,
        position: usize,
        reason: impl Into<String>,
    ) -> Self {
        MacroError::MalformedArgument {
            function: function.into(),
            position,
            reason: reason.into(),
        }
    }
}

fn describe_bounds(min: &usize, max: &Option<usize>) -> String {
    match *max {
        None => format!("at least {min}"),
        Some(max) if max == *min => format!("exactly {min}"),
        Some(max) => format!("between {min} and {max}"),
    }
}

/// A silent, non-error stop of the current macro body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbortSignal {
    pub message: Option<String>,
}

impl AbortSignal {
    pub fn new(message: Option<String>) -> Self {
        Self { message }
    }
}

impl fmt::Display for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "aborted: {message}"),
            None => write!(f, "aborted"),
        }
    }
}

/// Anything that stops evaluation early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    Abort(AbortSignal),
    Error(MacroError),
}

impl From<MacroError> for Interrupt {
    fn from(err: MacroError) -> Self {
        Interrupt::Error(err)
    }
}

impl From<AbortSignal> for Interrupt {
    fn from(signal: AbortSignal) -> Self {
        Interrupt::Abort(signal)
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Abort(signal) => signal.fmt(f),
            Interrupt::Error(err) => err.fmt(f),
        }
    }
}

/// Result of evaluating anything inside a macro body.
pub type Flow<T> = Result<T, Interrupt>;

/// Converts a flow result at an invocation boundary.
///
/// Aborts become `Ok(None)`; errors pass through untouched.
pub fn catch_abort<T>(flow: Flow<T>) -> Result<Option<T>, MacroError> {
    match flow {
        Ok(value) => Ok(Some(value)),
        Err(Interrupt::Abort(_)) => Ok(None),
        Err(Interrupt::Error(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_message_names_both_bounds() {
        let err = MacroError::Arity {
            function: "listGet".to_string(),
            min: 2,
            max: Some(3),
            got: 4,
        };
        assert_eq!(
            err.to_string(),
            "Function 'listGet' requires between 2 and 3 arguments, 4 given"
        );

        let unlimited = MacroError::Arity {
            function: "json.set".to_string(),
            min: 3,
            max: None,
            got: 1,
        };
        assert!(unlimited.to_string().contains("at least 3"));
    }

    #[test]
    fn test_catch_abort_only_swallows_aborts() {
        let aborted: Flow<i32> = Err(AbortSignal::new(Some("stop".into())).into());
        assert_eq!(catch_abort(aborted), Ok(None));

        let failed: Flow<i32> = Err(MacroError::AssertionFailed {
            message: "nope".into(),
        }
        .into());
        assert!(matches!(
            catch_abort(failed),
            Err(MacroError::AssertionFailed { .. })
        ));

        assert_eq!(catch_abort(Ok(3)), Ok(Some(3)));
    }
}
