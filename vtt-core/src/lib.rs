//! Macro execution core for a virtual tabletop.
//!
//! This crate provides:
//! - A function registry with arity, trust and coercion checks at dispatch
//! - Scoped variables, user-defined functions and non-local `abort`
//! - Property-list, string-list and JSON marshalling
//! - Macro links that run a macro against one or more tokens
//! - A reference line evaluator, campaign state and persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use vtt_core::{Campaign, CampaignSession, Interpreter, InterpreterConfig};
//!
//! let session = Arc::new(CampaignSession::new(Campaign::new("Demo")));
//! let interpreter = Interpreter::new(session, InterpreterConfig::new("Gina"));
//!
//! let output = interpreter.run_chat("[r: setStrProp('a=1;b=2', 'b', 9)]")?;
//! assert_eq!(output.text, "a=1;b=9 ; ");
//! ```

// Lets `#[derive(Builtin)]` expand to `::vtt_core::...` inside this crate.
extern crate self as vtt_core;

pub mod builtins;
pub mod config;
pub mod dice;
pub mod error;
pub mod evaluator;
pub mod frame;
pub mod headless;
pub mod interpreter;
pub mod link;
pub mod marshal;
pub mod persist;
pub mod registry;
pub mod scope;
pub mod session;
pub mod testing;
pub mod trust;
pub mod user_functions;
pub mod value;
pub mod world;

// Re-export for convenience
pub use vtt_macros::Builtin;

// Primary public API
pub use config::InterpreterConfig;
pub use error::{AbortSignal, Flow, Interrupt, MacroError};
pub use frame::Frame;
pub use headless::{HeadlessConfig, HeadlessSession};
pub use interpreter::{Interpreter, MacroOutput, RunContext};
pub use link::{LinkRunOptions, LinkRunReport, MacroLink};
pub use registry::{Arity, FunctionDescriptor, FunctionRegistry, MacroFunction};
pub use session::{CampaignSession, SessionState};
pub use testing::TestHarness;
pub use trust::{MacroOrigin, Trust};
pub use value::Value;
pub use world::{Campaign, Token, TokenId};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Describe;

    /// Sum two numbers
    #[derive(Builtin, Default)]
    #[builtin(name = "add2", min = 2, max = 2)]
    struct AddTwo;

    /// Log everything given
    #[derive(Builtin, Default)]
    #[builtin(min = 1, unlimited, trusted, nondeterministic)]
    struct LogAll;

    #[derive(Builtin, Default)]
    #[builtin(name = "first", alias = "head")]
    struct First;

    #[test]
    fn test_builtin_derive() {
        let descriptor = AddTwo::descriptor();
        assert_eq!(descriptor.name(), "add2");
        assert_eq!(descriptor.arity(), Arity::between(2, 2));
        assert_eq!(descriptor.description(), "Sum two numbers");
        assert!(descriptor.is_deterministic());
        assert!(!descriptor.requires_trust());
    }

    #[test]
    fn test_builtin_derive_defaults() {
        let descriptor = LogAll::descriptor();
        assert_eq!(descriptor.name(), "logAll");
        assert_eq!(descriptor.arity(), Arity::at_least(1));
        assert!(descriptor.requires_trust());
        assert!(!descriptor.is_deterministic());

        let first = First::descriptor();
        assert_eq!(first.names(), &["first".to_string(), "head".to_string()]);
        assert_eq!(first.arity(), Arity::between(0, 0));
        assert_eq!(first.description(), "");
    }
}
