//! Function registry and dispatcher.
//!
//! Every built-in is a [`MacroFunction`] registered under a
//! [`FunctionDescriptor`]. The dispatcher owns the checks that apply to all
//! of them:
//! 1. name lookup through the alias index
//! 2. argument count against the descriptor's [`Arity`]
//! 3. trust, for privileged functions
//! 4. numeric coercion of the result
//!
//! Aborts raised by a function pass straight through.

use crate::error::{Flow, MacroError};
use crate::frame::Frame;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from building descriptors by hand.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid arity: min {min} exceeds max {max}")]
    InvalidArity { min: usize, max: usize },

    #[error("A function needs at least one name")]
    NoNames,
}

// ============================================================================
// Descriptors
// ============================================================================

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    min: usize,
    max: Option<usize>,
}

impl Arity {
    /// `min..=max` arguments. Panics if `min > max`.
    pub const fn between(min: usize, max: usize) -> Self {
        assert!(min <= max, "arity min exceeds max");
        Self {
            min,
            max: Some(max),
        }
    }

    /// `min` or more arguments.
    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn new(min: usize, max: Option<usize>) -> Result<Self, RegistryError> {
        match max {
            Some(max) if min > max => Err(RegistryError::InvalidArity { min, max }),
            _ => Ok(Self { min, max }),
        }
    }

    pub fn min(&self) -> usize {
        self.min
    }

    /// `None` means unlimited.
    pub fn max(&self) -> Option<usize> {
        self.max
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

/// Metadata for one invocable function and all of its aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    names: Vec<String>,
    arity: Arity,
    deterministic: bool,
    trusted: bool,
    description: String,
}

impl FunctionDescriptor {
    pub fn new(names: &[&str], arity: Arity) -> Self {
        Self {
            names: names.iter().map(|name| name.to_string()).collect(),
            arity,
            deterministic: true,
            trusted: false,
            description: String::new(),
        }
    }

    /// Marks the function as requiring a trusted invocation.
    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Primary name, the first alias.
    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or_default()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_alias(&self, name: &str) -> bool {
        self.names.iter().any(|alias| alias == name)
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    pub fn requires_trust(&self) -> bool {
        self.trusted
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Implemented by `#[derive(Builtin)]`.
pub trait Describe {
    fn descriptor() -> FunctionDescriptor;
}

/// The evaluation routine of a function.
///
/// `alias` is the name the caller used; functions sharing one descriptor
/// branch on it and never on argument shape.
pub trait MacroFunction: Send + Sync {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value>;
}

// ============================================================================
// Registry
// ============================================================================

struct Registered {
    descriptor: FunctionDescriptor,
    function: Arc<dyn MacroFunction>,
}

/// Alias index over registered functions.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: Vec<Registered>,
    aliases: HashMap<String, usize>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in function.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtins::register_all(&mut registry);
        registry
    }

    /// Registers a function under all names of `descriptor`.
    ///
    /// A name that already belongs to another function is taken over.
    pub fn register(
        &mut self,
        descriptor: FunctionDescriptor,
        function: Arc<dyn MacroFunction>,
    ) -> Result<(), RegistryError> {
        if descriptor.names.is_empty() {
            return Err(RegistryError::NoNames);
        }
        let index = self.entries.len();
        for name in &descriptor.names {
            if let Some(previous) = self.aliases.insert(name.clone(), index) {
                warn!(function = %name, previous = %self.entries[previous].descriptor.name(), "function name re-registered");
                self.entries[previous].descriptor.names.retain(|alias| alias != name);
            }
        }
        self.entries.push(Registered {
            descriptor,
            function,
        });
        Ok(())
    }

    /// Registers a derived built-in.
    pub fn register_builtin<F>(&mut self)
    where
        F: Describe + MacroFunction + Default + 'static,
    {
        let descriptor = F::descriptor();
        // Derived descriptors always carry at least one name.
        let _ = self.register(descriptor, Arc::new(F::default()));
    }

    pub fn descriptor(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.aliases
            .get(name)
            .map(|index| &self.entries[*index].descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Every registered name, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.aliases.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validates and invokes `name`.
    pub fn dispatch(&self, name: &str, args: Vec<Value>, frame: &mut Frame<'_>) -> Flow<Value> {
        let entry = self
            .aliases
            .get(name)
            .map(|index| &self.entries[*index])
            .ok_or_else(|| MacroError::UnknownFunction {
                name: name.to_string(),
            })?;
        let descriptor = &entry.descriptor;

        let got = args.len();
        if !descriptor.arity.accepts(got) {
            return Err(MacroError::Arity {
                function: name.to_string(),
                min: descriptor.arity.min(),
                max: descriptor.arity.max(),
                got,
            }
            .into());
        }

        if descriptor.requires_trust() {
            frame.require_trust(name)?;
        }

        debug!(function = %name, args = got, "dispatching built-in");
        let value = entry.function.evaluate(frame, name, args)?;
        Ok(value.coerced())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_bounds() {
        let arity = Arity::between(2, 4);
        assert!(!arity.accepts(1));
        assert!(arity.accepts(2));
        assert!(arity.accepts(4));
        assert!(!arity.accepts(5));

        let open = Arity::at_least(1);
        assert!(open.accepts(100));
        assert!(!open.accepts(0));
    }

    #[test]
    fn test_arity_rejects_inverted_range() {
        assert_eq!(
            Arity::new(3, Some(2)),
            Err(RegistryError::InvalidArity { min: 3, max: 2 })
        );
        assert!(Arity::new(3, None).is_ok());
    }

    #[test]
    fn test_aliases_resolve_to_one_descriptor() {
        let registry = FunctionRegistry::with_builtins();
        let get = registry.descriptor("getName").unwrap();
        let set = registry.descriptor("setName").unwrap();
        assert!(get.has_alias("setName"));
        assert_eq!(get, set);
    }

    #[test]
    fn test_builtin_metadata() {
        let registry = FunctionRegistry::with_builtins();

        let define = registry.descriptor("defineFunction").unwrap();
        assert!(define.requires_trust());
        assert_eq!(define.arity(), Arity::between(2, 4));

        let roll = registry.descriptor("roll").unwrap();
        assert!(!roll.is_deterministic());

        let old = registry.descriptor("oldFunction").unwrap();
        assert_eq!(old.arity().max(), None);
        assert!(registry.descriptor("noSuchThing").is_none());
    }
}
