//! Macro link functions.

use super::{bool_arg, text_arg, text_or};
use crate::error::Flow;
use crate::frame::Frame;
use crate::link::{self, LinkRunOptions, MacroLink, OutputTarget, RecipientTarget};
use crate::registry::{FunctionRegistry, MacroFunction};
use crate::value::Value;
use crate::Builtin;
use tracing::debug;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_builtin::<MacroLinkHtml>();
    registry.register_builtin::<MacroLinkText>();
    registry.register_builtin::<ExecLink>();
}

/// Builds a link from `(macroName, output, args, target)` starting at `first`.
fn build_link(args: &[Value], first: usize) -> MacroLink {
    MacroLink::new(
        text_arg(args, first).trim(),
        OutputTarget::parse(&text_or(args, first + 1, "none")),
        RecipientTarget::parse(&text_or(args, first + 3, "impersonated")),
        &text_arg(args, first + 2),
    )
}

/// HTML anchor running a macro when clicked
#[derive(Builtin, Default)]
#[builtin(name = "macroLink", min = 2, max = 5)]
pub struct MacroLinkHtml;

impl MacroFunction for MacroLinkHtml {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let link = build_link(&args, 1);
        Ok(Value::text(format!(
            "<a href=\"{}\">{}</a>",
            link.encode(),
            text_arg(&args, 0)
        )))
    }
}

/// Bare `macro://` link text
#[derive(Builtin, Default)]
#[builtin(name = "macroLinkText", min = 1, max = 4)]
pub struct MacroLinkText;

impl MacroFunction for MacroLinkText {
    fn evaluate(&self, _frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        Ok(Value::text(build_link(&args, 0).encode()))
    }
}

/// Run a macro link now, or queue it when `defer` is set
#[derive(Builtin, Default)]
#[builtin(name = "execLink", min = 1, max = 2, trusted)]
pub struct ExecLink;

impl MacroFunction for ExecLink {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let text = text_arg(&args, 0);
        let interpreter = frame.interpreter();
        if bool_arg(&args, 1, false) {
            debug!(link = %text, "deferring macro link");
            interpreter.queue_link(text);
        } else {
            link::run(interpreter, &text, frame.player(), LinkRunOptions::default())?;
        }
        Ok(Value::empty())
    }
}

#[cfg(test)]
mod tests {
    use crate::link::{LinkPayload, MacroLink, OutputTarget, RecipientTarget};
    use crate::testing::TestHarness;
    use crate::world::Channel;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_macro_link_text() {
        let h = TestHarness::new();
        let text = h.eval(r#"[r: macroLinkText("heal@Lib:Test", "all", "amount=5", "selected")]"#);
        assert_eq!(text, "macro://heal@Lib:Test/all/selected?amount%3D5");

        let decoded = MacroLink::decode(&text).unwrap();
        assert_eq!(decoded.output, OutputTarget::All);
        assert_eq!(decoded.recipients, RecipientTarget::Selected);
        assert_eq!(decoded.payload, LinkPayload::PropertyList(vec!["amount=5".into()]));
    }

    #[test]
    fn test_macro_link_defaults() {
        let h = TestHarness::new();
        assert_eq!(
            h.eval(r#"[r: macroLink("Heal", "heal@Lib:Test")]"#),
            r#"<a href="macro://heal@Lib:Test/none/impersonated?">Heal</a>"#
        );
    }

    #[test]
    fn test_exec_link_runs_and_routes() {
        let h = TestHarness::new();
        h.add_library_macro("shout", "Hi [r: getStrProp(macro.args, 'who')]");
        h.eval(r#"[h: execLink(macroLinkText("shout@Lib:Test", "all", "who=Bob"))]"#);
        let transcript = h.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].channel, Channel::All);
        assert_eq!(transcript[0].text, "Hi Bob");
    }

    #[test]
    fn test_exec_link_deferred() {
        let h = TestHarness::new();
        h.add_library_macro("later", "done");
        h.eval(r#"[h: execLink(macroLinkText("later@Lib:Test", "gm"), 1)]"#);
        assert!(h.transcript().is_empty());
        assert_eq!(h.interpreter.pending_links(), 1);

        h.interpreter.run_deferred_links().unwrap();
        assert_eq!(h.interpreter.pending_links(), 0);
        assert_eq!(h.transcript()[0].channel, Channel::Gm);
    }

    #[test]
    fn test_exec_link_requires_trust() {
        let h = TestHarness::new();
        assert!(h.run(r#"[h: execLink("macro://x@Lib:Test/all/impersonated")]"#).is_err());
        assert_eq!(h.interpreter.pending_links(), 0);
    }
}
