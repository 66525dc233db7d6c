//! The interpreter context.
//!
//! An [`Interpreter`] owns the function registry, the user-defined function
//! table and a handle to the session. Nothing is global, so independent
//! interpreters can run side by side.
//!
//! Every method that starts a macro body is an invocation boundary: an abort
//! raised inside stops that body, keeps its output so far, and goes no
//! further. Errors always propagate.
//!
//! Recursion through user functions or nested macros is not limited. A
//! definition that calls itself forever exhausts the stack.

use crate::config::InterpreterConfig;
use crate::error::{catch_abort, Flow, MacroError};
use crate::evaluator::{ExpressionEvaluator, LineEvaluator};
use crate::frame::{Frame, Invocation};
use crate::link::{self, LinkRunOptions, LinkRunReport};
use crate::registry::FunctionRegistry;
use crate::scope::{Scope, SubjectBinding, MACRO_RETURN};
use crate::session::SessionState;
use crate::trust::{self, MacroOrigin, Trust};
use crate::user_functions::{UserFunctionEntry, UserFunctionTable};
use crate::value::Value;
use crate::world::{Token, TokenId, LIBRARY_PREFIX};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Location reported for text typed into chat.
pub const CHAT_LOCATION: &str = "chat";

/// Location naming the Subject token's own macros.
pub const TOKEN_LOCATION: &str = "TOKEN";

/// Result of running a whole macro body.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroOutput {
    /// Text produced, including anything emitted before an abort.
    pub text: String,
    /// Whether the body stopped early through `abort`.
    pub aborted: bool,
    /// `macro.return`, if the body set it.
    pub return_value: Option<Value>,
}

/// How a top-level body is started.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub origin: MacroOrigin,
    pub subject: Option<TokenId>,
    pub invocation: Invocation,
    /// Raw argument text bound to `macro.args`.
    pub args: Option<String>,
}

impl RunContext {
    pub fn new(origin: MacroOrigin, player: impl Into<String>) -> Self {
        Self {
            origin,
            subject: None,
            invocation: Invocation::new("chat", CHAT_LOCATION, player),
            args: None,
        }
    }

    pub fn with_subject(mut self, subject: Option<TokenId>) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_macro(mut self, name: impl Into<String>, location: impl Into<String>) -> Self {
        self.invocation.name = name.into();
        self.invocation.location = location.into();
        self
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }
}

/// A macro button located by `name@location`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMacro {
    pub name: String,
    pub location: String,
    pub holder: TokenId,
    pub body: String,
    pub auto_execute: bool,
}

pub struct Interpreter {
    config: InterpreterConfig,
    registry: FunctionRegistry,
    user_functions: UserFunctionTable,
    session: Arc<dyn SessionState>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    deferred_links: Mutex<VecDeque<String>>,
}

impl Interpreter {
    /// An interpreter with every built-in and the line evaluator.
    pub fn new(session: Arc<dyn SessionState>, config: InterpreterConfig) -> Self {
        Self {
            config,
            registry: FunctionRegistry::with_builtins(),
            user_functions: UserFunctionTable::new(),
            session,
            evaluator: Arc::new(LineEvaluator::new()),
            deferred_links: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    pub fn user_functions(&self) -> &UserFunctionTable {
        &self.user_functions
    }

    pub fn session(&self) -> &dyn SessionState {
        self.session.as_ref()
    }

    // ========================================================================
    // Running macros
    // ========================================================================

    /// Runs a macro body from the top.
    pub fn run(&self, body: &str, context: RunContext) -> Result<MacroOutput, MacroError> {
        let trust = trust::is_trusted(&context.origin, self.session());
        debug!(
            macro_name = %context.invocation.name,
            location = %context.invocation.location,
            %trust,
            "running macro"
        );

        let scope = Scope::new(context.subject);
        if let Some(args) = &context.args {
            scope.bind_argument_text(args);
        }
        let mut frame = Frame::new(self, scope.clone(), trust, context.invocation);
        let aborted = catch_abort(self.evaluate_body(body, &mut frame))?.is_none();
        if aborted {
            debug!("macro aborted");
        }

        Ok(MacroOutput {
            text: frame.into_output(),
            aborted,
            return_value: scope.resolve(MACRO_RETURN),
        })
    }

    /// Runs chat input as the local player, acting as the impersonated token.
    pub fn run_chat(&self, text: &str) -> Result<MacroOutput, MacroError> {
        let context = RunContext::new(
            MacroOrigin::chat(self.config.trust_chat),
            &self.config.player_name,
        )
        .with_subject(self.session.impersonated());
        self.run(text, context)
    }

    /// Runs a macro button by `name@location` against `subject`.
    pub fn run_macro(
        &self,
        qualified_name: &str,
        args: &str,
        subject: Option<TokenId>,
    ) -> Result<MacroOutput, MacroError> {
        if qualified_name.trim().is_empty() {
            return Ok(MacroOutput {
                text: String::new(),
                aborted: false,
                return_value: None,
            });
        }
        let resolved = self.resolve_macro(qualified_name, subject, "")?;
        self.run_resolved(&resolved, args, subject, &self.config.player_name)
    }

    /// Runs an already located macro with trust derived from its holder.
    pub fn run_resolved(
        &self,
        resolved: &ResolvedMacro,
        args: &str,
        subject: Option<TokenId>,
        player: &str,
    ) -> Result<MacroOutput, MacroError> {
        let context = RunContext::new(MacroOrigin::Token(resolved.holder), player)
            .with_subject(subject)
            .with_macro(&resolved.name, &resolved.location)
            .with_args(args);
        self.run(&resolved.body, context)
    }

    /// Locates a macro button.
    ///
    /// `location` may be `TOKEN` (the Subject), `Lib:<name>`, or `this`,
    /// which stands for `current_location`.
    pub fn resolve_macro(
        &self,
        qualified_name: &str,
        subject: Option<TokenId>,
        current_location: &str,
    ) -> Result<ResolvedMacro, MacroError> {
        let unknown = |reason: &str| MacroError::UnknownMacro {
            name: qualified_name.to_string(),
            reason: reason.to_string(),
        };

        let (name, location) = qualified_name
            .split_once('@')
            .ok_or_else(|| unknown("a location must be given as name@location"))?;
        let location = if location.eq_ignore_ascii_case("this") {
            if current_location.is_empty() || current_location == CHAT_LOCATION {
                return Err(unknown("@this used outside a token macro"));
            }
            current_location
        } else {
            location
        };

        let holder: Token = if location.eq_ignore_ascii_case(TOKEN_LOCATION) {
            let id = subject.ok_or_else(|| unknown("no current token"))?;
            self.session
                .token(id)
                .ok_or_else(|| unknown("current token no longer exists"))?
        } else if location.to_lowercase().starts_with(LIBRARY_PREFIX) {
            self.library_token(location)
                .map_err(|reason| unknown(&reason))?
        } else {
            return Err(unknown("unsupported macro location"));
        };

        let button = holder
            .macro_button(name)
            .ok_or_else(|| unknown("no such macro button"))?;

        Ok(ResolvedMacro {
            name: name.to_string(),
            location: if location.eq_ignore_ascii_case(TOKEN_LOCATION) {
                TOKEN_LOCATION.to_string()
            } else {
                holder.name.clone()
            },
            holder: holder.id,
            body: button.command.clone(),
            auto_execute: button.auto_execute,
        })
    }

    fn library_token(&self, name: &str) -> Result<Token, String> {
        let mut matches = self
            .session
            .library_tokens()
            .into_iter()
            .filter(|token| token.name.eq_ignore_ascii_case(name));
        let token = matches
            .next()
            .ok_or_else(|| format!("no library token named {name}"))?;
        if matches.next().is_some() {
            return Err(format!("more than one library token named {name}"));
        }
        Ok(token)
    }

    /// Hands a body to the expression evaluator.
    pub fn evaluate_body(&self, body: &str, frame: &mut Frame<'_>) -> Flow<()> {
        self.evaluator.evaluate(body, frame)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Calls `name`: user definitions first, then built-ins.
    pub fn dispatch(&self, name: &str, args: Vec<Value>, frame: &mut Frame<'_>) -> Flow<Value> {
        if let Some(entry) = self.user_functions.get(name) {
            return self.invoke_user_function(entry, args, frame);
        }
        self.registry.dispatch(name, args, frame)
    }

    /// Calls a built-in, skipping user definitions of the same name.
    pub fn dispatch_builtin(
        &self,
        name: &str,
        args: Vec<Value>,
        frame: &mut Frame<'_>,
    ) -> Flow<Value> {
        self.registry.dispatch(name, args, frame)
    }

    pub fn is_function_defined(&self, name: &str) -> bool {
        self.user_functions.is_defined(name) || self.registry.contains(name)
    }

    /// Adds a user function. Requires a trusted invocation.
    pub fn define_function(&self, trust: Trust, entry: UserFunctionEntry) -> Result<(), MacroError> {
        if !trust.is_trusted() {
            warn!(function = %entry.name, "untrusted attempt to define a function");
            return Err(MacroError::Permission {
                function: "defineFunction".to_string(),
            });
        }
        info!(function = %entry.name, location = %entry.location, "defining function");
        if let Some(name) = self.user_functions.define(entry) {
            debug!(function = %name, "previous definition kept for oldFunction");
        }
        Ok(())
    }

    /// Runs a user function body as a nested invocation.
    pub fn invoke_user_function(
        &self,
        entry: UserFunctionEntry,
        args: Vec<Value>,
        caller: &mut Frame<'_>,
    ) -> Flow<Value> {
        debug!(function = %entry.name, args = args.len(), "invoking user function");

        let scope = caller
            .scope()
            .child(!entry.new_variable_context, SubjectBinding::Inherit);
        scope.unbind(MACRO_RETURN);
        scope.bind_arguments(&args);

        let entry = Rc::new(entry);
        let mut frame = caller
            .nested(scope.clone(), &entry.name, &entry.location)
            .with_current_function(Rc::clone(&entry));
        if catch_abort(self.evaluate_body(&entry.body, &mut frame))?.is_none() {
            debug!(function = %entry.name, "user function aborted");
        }

        let returned = caller.scope().take_return_from(&scope);
        let output = frame.into_output();
        let value = if entry.ignore_output {
            returned.unwrap_or_default()
        } else if output.trim().is_empty() {
            returned.unwrap_or_else(|| Value::text(output))
        } else {
            Value::from_output(&output)
        };
        Ok(value)
    }

    // ========================================================================
    // Campaign lifecycle
    // ========================================================================

    /// Clears user functions and runs the load hook on trusted library tokens.
    ///
    /// Returns the hooks that failed; they are also logged.
    pub fn reload_campaign(&self) -> Vec<(String, MacroError)> {
        self.user_functions.clear();
        info!(hook = %self.config.load_hook, "reloading campaign functions");

        let mut failures = Vec::new();
        for token in self.session.library_tokens() {
            if token.macro_button(&self.config.load_hook).is_none() {
                continue;
            }
            if !trust::token_is_trusted(&token, self.session()) {
                warn!(token = %token.name, "skipping load hook on untrusted library token");
                continue;
            }
            let qualified = format!("{}@{}", self.config.load_hook, token.name);
            if let Err(err) = self.run_macro(&qualified, "", None) {
                warn!(token = %token.name, error = %err, "load hook failed");
                failures.push((token.name.clone(), err));
            }
        }
        failures
    }

    // ========================================================================
    // Macro links
    // ========================================================================

    /// Runs a macro link as the local player.
    pub fn run_link(&self, link: &str, options: LinkRunOptions) -> Result<LinkRunReport, MacroError> {
        link::run(self, link, &self.config.player_name, options)
    }

    /// Queues a link for [`Interpreter::run_deferred_links`].
    pub fn queue_link(&self, link: impl Into<String>) {
        self.deferred_links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(link.into());
    }

    pub fn pending_links(&self) -> usize {
        self.deferred_links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Runs queued links in order. Stops at the first error.
    pub fn run_deferred_links(&self) -> Result<Vec<LinkRunReport>, MacroError> {
        let mut reports = Vec::new();
        loop {
            let next = self
                .deferred_links
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(link) = next else {
                break;
            };
            reports.push(self.run_link(&link, LinkRunOptions::default())?);
        }
        Ok(reports)
    }
}
