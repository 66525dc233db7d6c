//! Functions defined at runtime by macros.
//!
//! The table is shared by every invocation on an interpreter. Lookups hand
//! out a copy of the entry, so a redefinition never affects a call that has
//! already started.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A function defined with `defineFunction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFunctionEntry {
    pub name: String,
    pub body: String,
    /// Discard the body's text and return `macro.return` instead.
    pub ignore_output: bool,
    /// Run the body in a fresh variable mapping.
    pub new_variable_context: bool,
    /// Where the body came from, reported by `getMacroLocation`.
    pub location: String,
    /// The definition this one replaced, reached through `oldFunction`.
    pub previous: Option<Box<UserFunctionEntry>>,
}

impl UserFunctionEntry {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            ignore_output: false,
            new_variable_context: true,
            location: String::from("chat"),
            previous: None,
        }
    }

    pub fn with_ignore_output(mut self, ignore_output: bool) -> Self {
        self.ignore_output = ignore_output;
        self
    }

    pub fn with_new_variable_context(mut self, new_variable_context: bool) -> Self {
        self.new_variable_context = new_variable_context;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFunctionTable {
    entries: Arc<RwLock<HashMap<String, UserFunctionEntry>>>,
}

impl UserFunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a definition. A replaced entry stays reachable
    /// through the new entry's `previous`; its name is returned.
    pub fn define(&self, mut entry: UserFunctionEntry) -> Option<String> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entry.previous = entries.remove(&entry.name).map(Box::new);
        let replaced = entry.previous.as_ref().map(|old| old.name.clone());
        entries.insert(entry.name.clone(), entry);
        replaced
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Copy of the current definition.
    pub fn get(&self, name: &str) -> Option<UserFunctionEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
