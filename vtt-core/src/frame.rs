//! Per-invocation evaluation state.
//!
//! A [`Frame`] is what the evaluator and every built-in see while a macro
//! body runs: the interpreter, the current scope, the trust fixed at the
//! start of the invocation, and the output produced so far.

use crate::error::{Flow, MacroError};
use crate::interpreter::Interpreter;
use crate::scope::Scope;
use crate::session::SessionState;
use crate::trust::Trust;
use crate::user_functions::UserFunctionEntry;
use crate::value::Value;
use crate::world::{Token, TokenId};
use std::rc::Rc;
use tracing::warn;

/// Identifies the macro a frame is running.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
    /// Macro or function name.
    pub name: String,
    /// `TOKEN`, `Lib:<name>`, or `chat` for unattached text.
    pub location: String,
    /// Player on whose behalf the macro runs.
    pub player: String,
}

impl Invocation {
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        player: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            player: player.into(),
        }
    }
}

pub struct Frame<'a> {
    interpreter: &'a Interpreter,
    scope: Scope,
    trust: Trust,
    invocation: Invocation,
    current_function: Option<Rc<UserFunctionEntry>>,
    output: String,
}

impl<'a> Frame<'a> {
    pub fn new(
        interpreter: &'a Interpreter,
        scope: Scope,
        trust: Trust,
        invocation: Invocation,
    ) -> Self {
        Self {
            interpreter,
            scope,
            trust,
            invocation,
            current_function: None,
            output: String::new(),
        }
    }

    /// A frame for a nested call that keeps this frame's trust and player.
    pub fn nested(&self, scope: Scope, name: &str, location: &str) -> Frame<'a> {
        Frame {
            interpreter: self.interpreter,
            scope,
            trust: self.trust,
            invocation: Invocation::new(name, location, &self.invocation.player),
            current_function: self.current_function.clone(),
            output: String::new(),
        }
    }

    pub fn with_current_function(mut self, entry: Rc<UserFunctionEntry>) -> Self {
        self.current_function = Some(entry);
        self
    }

    pub fn interpreter(&self) -> &'a Interpreter {
        self.interpreter
    }

    pub fn session(&self) -> &'a dyn SessionState {
        self.interpreter.session()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn trust(&self) -> Trust {
        self.trust
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn player(&self) -> &str {
        &self.invocation.player
    }

    /// User function whose body this frame is running, if any.
    pub fn current_function(&self) -> Option<&UserFunctionEntry> {
        self.current_function.as_deref()
    }

    /// Fails with a permission error unless the invocation is trusted.
    pub fn require_trust(&self, function: &str) -> Result<(), MacroError> {
        if self.trust.is_trusted() {
            return Ok(());
        }
        warn!(function = %function, player = %self.invocation.player, "permission denied");
        Err(MacroError::Permission {
            function: function.to_string(),
        })
    }

    pub fn subject(&self) -> Option<TokenId> {
        self.scope.subject()
    }

    /// The Subject, or a [`MacroError::NoSubject`] naming `function`.
    pub fn require_subject(&self, function: &str) -> Result<TokenId, MacroError> {
        self.subject().ok_or_else(|| MacroError::NoSubject {
            function: function.to_string(),
        })
    }

    /// Loads the Subject token.
    pub fn subject_token(&self, function: &str) -> Result<Token, MacroError> {
        let id = self.require_subject(function)?;
        self.session()
            .token(id)
            .ok_or_else(|| MacroError::UnknownToken {
                function: function.to_string(),
                token: id.to_string(),
            })
    }

    /// Loads a token by id or name, naming `function` on failure.
    pub fn find_token(&self, function: &str, id_or_name: &str) -> Result<Token, MacroError> {
        self.session()
            .find_token(id_or_name)
            .ok_or_else(|| MacroError::UnknownToken {
                function: function.to_string(),
                token: id_or_name.to_string(),
            })
    }

    /// Variable lookup: the scope first, then a property of the Subject.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.scope.resolve(name) {
            return Some(value);
        }
        let token = self.session().token(self.subject()?)?;
        token.property(name).map(Value::coerce)
    }

    pub fn bind(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.scope.bind(name, value);
    }

    /// Calls a function by name through the interpreter.
    pub fn dispatch(&mut self, name: &str, args: Vec<Value>) -> Flow<Value> {
        let interpreter = self.interpreter;
        interpreter.dispatch(name, args, self)
    }

    /// Runs a named macro (`name@location`) as a nested invocation.
    ///
    /// Returns its output. `macro.return` is copied into this scope if set.
    pub fn run_macro(&mut self, qualified_name: &str, args: &str) -> Result<String, MacroError> {
        let interpreter = self.interpreter;
        let resolved =
            interpreter.resolve_macro(qualified_name, self.subject(), &self.invocation.location)?;
        let output = interpreter.run_resolved(&resolved, args, self.subject(), self.player())?;
        if let Some(value) = output.return_value.clone() {
            self.scope.bind(crate::scope::MACRO_RETURN, value);
        }
        Ok(output.text)
    }

    pub fn emit(&mut self, text: &str) {
        self.output.push_str(text);
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }
}
