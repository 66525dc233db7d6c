//! Variable scopes for macro evaluation.
//!
//! A scope is a variable mapping plus an optional Subject token. Child scopes
//! either share the parent's mapping or start empty; both keep the Subject
//! unless told otherwise.

use crate::value::Value;
use crate::world::TokenId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Variable holding the JSON array of arguments for a nested call.
pub const MACRO_ARGS: &str = "macro.args";
/// Variable holding the argument count.
pub const MACRO_ARGS_NUM: &str = "macro.args.num";
/// Variable a nested call sets to hand back a result.
pub const MACRO_RETURN: &str = "macro.return";

/// Name of the variable holding argument `index`.
pub fn macro_arg_name(index: usize) -> String {
    format!("{MACRO_ARGS}.{index}")
}

/// How a child scope picks its Subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectBinding {
    Inherit,
    Set(Option<TokenId>),
}

/// A variable environment bound to an optional Subject.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: Rc<RefCell<HashMap<String, Value>>>,
    subject: Option<TokenId>,
}

impl Scope {
    pub fn new(subject: Option<TokenId>) -> Self {
        Self {
            variables: Rc::default(),
            subject,
        }
    }

    pub fn resolve(&self, name: &str) -> Option<Value> {
        self.variables.borrow().get(name).cloned()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.variables.borrow().contains_key(name)
    }

    pub fn bind(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.borrow_mut().insert(name.into(), value.into());
    }

    pub fn unbind(&self, name: &str) -> Option<Value> {
        self.variables.borrow_mut().remove(name)
    }

    pub fn subject(&self) -> Option<TokenId> {
        self.subject
    }

    /// Creates a child scope.
    ///
    /// With `share_variables` the child reads and writes the parent's mapping.
    pub fn child(&self, share_variables: bool, subject: SubjectBinding) -> Scope {
        let variables = if share_variables {
            Rc::clone(&self.variables)
        } else {
            Rc::default()
        };
        let subject = match subject {
            SubjectBinding::Inherit => self.subject,
            SubjectBinding::Set(subject) => subject,
        };
        Scope { variables, subject }
    }

    /// True when both scopes use the same variable mapping.
    pub fn shares_variables_with(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.variables, &other.variables)
    }

    /// Binds `macro.args`, `macro.args.num` and `macro.args.N`.
    pub fn bind_arguments(&self, args: &[Value]) {
        let tree = serde_json::Value::Array(args.iter().map(Value::to_json).collect());
        let packed = if args.is_empty() {
            Value::empty()
        } else {
            Value::Json(tree)
        };
        self.bind(MACRO_ARGS, packed);
        self.bind(MACRO_ARGS_NUM, Value::from(args.len() as i64));
        for (index, arg) in args.iter().enumerate() {
            self.bind(macro_arg_name(index), arg.clone());
        }
    }

    /// Binds `macro.args` from raw argument text, as passed to named macros.
    pub fn bind_argument_text(&self, text: &str) {
        self.bind(MACRO_ARGS, Value::from_output(text));
    }

    /// Copies `macro.return` from `child` if the child set it.
    pub fn take_return_from(&self, child: &Scope) -> Option<Value> {
        let value = child.resolve(MACRO_RETURN)?;
        if !self.shares_variables_with(child) {
            self.bind(MACRO_RETURN, value.clone());
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_starts_empty_but_keeps_subject() {
        let subject = TokenId::new();
        let parent = Scope::new(Some(subject));
        parent.bind("x", Value::number(1));

        let child = parent.child(false, SubjectBinding::Inherit);
        assert!(child.resolve("x").is_none());
        assert_eq!(child.subject(), Some(subject));

        child.bind("y", Value::number(2));
        assert!(parent.resolve("y").is_none());
    }

    #[test]
    fn test_shared_context_writes_through() {
        let parent = Scope::new(None);
        let child = parent.child(true, SubjectBinding::Inherit);
        child.bind("hp", Value::number(5));
        assert_eq!(parent.resolve("hp"), Some(Value::number(5)));
        assert!(parent.shares_variables_with(&child));
    }

    #[test]
    fn test_child_can_rebind_subject() {
        let parent = Scope::new(Some(TokenId::new()));
        let other = TokenId::new();
        let child = parent.child(false, SubjectBinding::Set(Some(other)));
        assert_eq!(child.subject(), Some(other));
    }

    #[test]
    fn test_bind_arguments() {
        let scope = Scope::new(None);
        scope.bind_arguments(&[Value::number(21), Value::text("x")]);
        assert_eq!(scope.resolve(MACRO_ARGS_NUM), Some(Value::number(2)));
        assert_eq!(scope.resolve("macro.args.0"), Some(Value::number(21)));
        assert_eq!(
            scope.resolve(MACRO_ARGS).map(|v| v.to_string()),
            Some("[21,\"x\"]".to_string())
        );
    }

    #[test]
    fn test_return_copied_only_when_set() {
        let parent = Scope::new(None);
        let child = parent.child(false, SubjectBinding::Inherit);
        assert!(parent.take_return_from(&child).is_none());

        child.bind(MACRO_RETURN, Value::text("done"));
        assert_eq!(parent.take_return_from(&child), Some(Value::text("done")));
        assert_eq!(parent.resolve(MACRO_RETURN), Some(Value::text("done")));
    }
}
