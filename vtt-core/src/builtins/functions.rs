//! User-defined functions and nested macro text.

use super::{bool_arg, text_arg};
use crate::error::{Flow, MacroError};
use crate::frame::Frame;
use crate::registry::{FunctionRegistry, MacroFunction};
use crate::scope::SubjectBinding;
use crate::user_functions::UserFunctionEntry;
use crate::value::Value;
use crate::Builtin;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_builtin::<DefineFunction>();
    registry.register_builtin::<IsFunctionDefined>();
    registry.register_builtin::<OldFunction>();
    registry.register_builtin::<EvalMacro>();
    registry.register_builtin::<ExecMacro>();
    registry.register_builtin::<GetMacroName>();
    registry.register_builtin::<GetMacroLocation>();
}

/// Body text with segments is taken literally; anything else names a macro.
/// Plain text such as `hello` is therefore looked up as macro `hello`
/// rather than defining a function that prints it.
fn is_literal_body(text: &str) -> bool {
    text.contains('[') || text.contains('{')
}

/// Define a function from body text or a `name@location` macro
#[derive(Builtin, Default)]
#[builtin(name = "defineFunction", min = 2, max = 4, trusted)]
pub struct DefineFunction;

impl MacroFunction for DefineFunction {
    fn evaluate(&self, frame: &mut Frame<'_>, alias: &str, args: Vec<Value>) -> Flow<Value> {
        let name = text_arg(&args, 0).trim().to_string();
        if name.is_empty() {
            return Err(MacroError::malformed(alias, 1, "function name is empty").into());
        }
        let source = text_arg(&args, 1);

        let (body, location) = if is_literal_body(&source) {
            (source, frame.invocation().location.clone())
        } else {
            let resolved = frame.interpreter().resolve_macro(
                source.trim(),
                frame.subject(),
                &frame.invocation().location,
            )?;
            (resolved.body, resolved.location)
        };

        let entry = UserFunctionEntry::new(name, body)
            .with_ignore_output(bool_arg(&args, 2, false))
            .with_new_variable_context(bool_arg(&args, 3, true))
            .with_location(location);
        frame.interpreter().define_function(frame.trust(), entry)?;
        Ok(Value::empty())
    }
}

/// Whether a user function or built-in exists under a name
#[derive(Builtin, Default)]
#[builtin(name = "isFunctionDefined", min = 1, max = 1)]
pub struct IsFunctionDefined;

impl MacroFunction for IsFunctionDefined {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        Ok(Value::boolean(
            frame.interpreter().is_function_defined(&text_arg(&args, 0)),
        ))
    }
}

/// Call the definition the current user function replaced: the previous
/// user definition of the same name, or the shadowed built-in
#[derive(Builtin, Default)]
#[builtin(name = "oldFunction", min = 0, unlimited)]
pub struct OldFunction;

impl MacroFunction for OldFunction {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let current = frame.current_function().ok_or_else(|| {
            MacroError::Evaluation("oldFunction can only be called inside a user function".into())
        })?;
        let name = current.name.clone();
        let previous = current.previous.as_deref().cloned();
        let interpreter = frame.interpreter();
        match previous {
            Some(entry) => interpreter.invoke_user_function(entry, args, frame),
            None => interpreter.dispatch_builtin(&name, args, frame),
        }
    }
}

/// Runs `text` as macro code nested in `frame`.
fn run_text(frame: &mut Frame<'_>, text: &str, share_variables: bool) -> Flow<Value> {
    let scope = frame.scope().child(share_variables, SubjectBinding::Inherit);
    let invocation = frame.invocation();
    let mut nested = frame.nested(scope.clone(), &invocation.name, &invocation.location);
    frame.interpreter().evaluate_body(text, &mut nested)?;
    frame.scope().take_return_from(&scope);
    Ok(Value::from_output(&nested.into_output()))
}

/// Evaluate macro text in the caller's scope
#[derive(Builtin, Default)]
#[builtin(name = "evalMacro", min = 1, max = 1, trusted)]
pub struct EvalMacro;

impl MacroFunction for EvalMacro {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        run_text(frame, &text_arg(&args, 0), true)
    }
}

/// Evaluate macro text in a fresh scope
#[derive(Builtin, Default)]
#[builtin(name = "execMacro", min = 1, max = 1, trusted)]
pub struct ExecMacro;

impl MacroFunction for ExecMacro {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        run_text(frame, &text_arg(&args, 0), false)
    }
}

/// Name of the running macro or user function
#[derive(Builtin, Default)]
#[builtin(name = "getMacroName")]
pub struct GetMacroName;

impl MacroFunction for GetMacroName {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, _args: Vec<Value>) -> Flow<Value> {
        Ok(Value::text(frame.invocation().name.clone()))
    }
}

/// Location of the running macro: `TOKEN`, a library token name, or `chat`
#[derive(Builtin, Default)]
#[builtin(name = "getMacroLocation")]
pub struct GetMacroLocation;

impl MacroFunction for GetMacroLocation {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, _args: Vec<Value>) -> Flow<Value> {
        Ok(Value::text(frame.invocation().location.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_define_and_call() {
        let h = TestHarness::new();
        h.eval(r#"[h: defineFunction("double", "[r: arg(0) * 2]")]"#);
        assert_eq!(h.eval("[r: double(21)]"), "42");
        assert!(h.interpreter.user_functions().is_defined("double"));
    }

    #[test]
    fn test_new_context_does_not_leak() {
        let h = TestHarness::new();
        h.eval(r#"[h: defineFunction("peek", "[r: x]")]"#);
        let err = h.error("[h: x = 5][r: peek()]");
        assert!(matches!(err, MacroError::Evaluation(_)));

        h.eval(r#"[h: defineFunction("peekShared", "[r: x]", 0, 0)]"#);
        assert_eq!(h.eval("[h: x = 5][r: peekShared()]"), "5");
    }

    #[test]
    fn test_ignore_output_returns_macro_return() {
        let h = TestHarness::new();
        h.eval(r#"[h: defineFunction("quiet", "noise [h: macro.return = arg(0) + 1]", 1)]"#);
        assert_eq!(h.eval("[r: quiet(1)]"), "2");
    }

    #[test]
    fn test_define_from_library_macro() {
        let h = TestHarness::new();
        h.add_library_macro("triple", "[r: arg(0) * 3]");
        h.eval(r#"[h: defineFunction("triple", "triple@Lib:Test")]"#);
        // Later edits of the button do not change the captured body.
        h.add_library_macro("triple", "[r: 0]");
        assert_eq!(h.eval("[r: triple(5)]"), "15");
        assert!(h.run_trusted(r#"[h: defineFunction("nope", "missing@Lib:Test")]"#).is_err());
    }

    #[test]
    fn test_untrusted_define_is_denied() {
        let h = TestHarness::new();
        let err = h.run(r#"[h: defineFunction("evil", "[r: 1]")]"#).unwrap_err();
        assert_eq!(
            err,
            MacroError::Permission {
                function: "defineFunction".to_string()
            }
        );
        assert!(!h.interpreter.user_functions().is_defined("evil"));
    }

    #[test]
    fn test_shadowing_and_old_function() {
        let h = TestHarness::new();
        h.eval(r#"[h: defineFunction("listCount", "[r: oldFunction(arg(0)) * 10]")]"#);
        assert_eq!(h.eval(r#"[r: listCount("a,b,c")]"#), "30");
        assert!(h.run_trusted("[r: oldFunction()]").is_err());
    }

    #[test]
    fn test_old_function_reaches_previous_definition() {
        let h = TestHarness::new();
        h.eval(r#"[h: defineFunction("bonus", "[r: arg(0) + 1]")]"#);
        h.eval(r#"[h: defineFunction("bonus", "[r: oldFunction(arg(0)) * 10]")]"#);
        assert_eq!(h.eval("[r: bonus(2)]"), "30");

        h.eval(r#"[h: defineFunction("bonus", "[r: oldFunction(arg(0)) + 100]")]"#);
        assert_eq!(h.eval("[r: bonus(2)]"), "130");
    }

    #[test]
    fn test_old_function_without_builtin_fails() {
        let h = TestHarness::new();
        h.eval(r#"[h: defineFunction("fresh", "[r: oldFunction()]")]"#);
        assert!(h.run_trusted("[r: fresh()]").is_err());
    }

    #[test]
    fn test_plain_text_body_names_a_macro() {
        assert!(!is_literal_body("hello"));
        assert!(is_literal_body("[r: 1]"));

        let h = TestHarness::new();
        h.add_library_macro("hello", "[r: 'hi ' + arg(0)]");
        h.eval(r#"[h: defineFunction("greet", "hello@Lib:Test")]"#);
        assert_eq!(h.eval("[r: greet('Pat')]"), "hi Pat");
        assert!(matches!(
            h.error(r#"[h: defineFunction("echo", "just words")]"#),
            MacroError::UnknownMacro { .. }
        ));
    }

    #[test]
    fn test_is_function_defined() {
        let h = TestHarness::new();
        assert_eq!(h.eval("[r: isFunctionDefined('listGet')]"), "1");
        assert_eq!(h.eval("[r: isFunctionDefined('custom')]"), "0");
        h.eval(r#"[h: defineFunction("custom", "[r: 1]")]"#);
        assert_eq!(h.eval("[r: isFunctionDefined('custom')]"), "1");
    }

    #[test]
    fn test_eval_and_exec_macro_scopes() {
        let h = TestHarness::new();
        assert_eq!(h.eval("[h: x = 2][h: evalMacro('[h: x = x + 1]')][r: x]"), "3");
        assert_eq!(h.eval("[h: y = 2][h: execMacro('[h: y = 9]')][r: y]"), "2");
        assert_eq!(h.eval("[r: evalMacro('[r: 6 * 7]') + 1]"), "43");
    }

    #[test]
    fn test_macro_name_and_location() {
        let h = TestHarness::new();
        h.add_library_macro("whoami", "[r: getMacroName()]@[r: getMacroLocation()]");
        let output = h.interpreter.run_macro("whoami@Lib:Test", "", None).unwrap();
        assert_eq!(output.text, "whoami@Lib:Test");
        assert_eq!(h.eval("[r: getMacroLocation()]"), "chat");
    }
}
