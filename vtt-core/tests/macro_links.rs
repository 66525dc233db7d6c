//! Macro link encoding, auto-execution and multi-recipient runs.

use pretty_assertions::assert_eq;
use serde_json::json;
use vtt_core::link::{
    is_auto_executable, LinkPayload, LinkRunOptions, MacroLink, OutputTarget, RecipientTarget,
};
use vtt_core::testing::{assert_property, TestHarness};
use vtt_core::world::{Channel, MacroButton, Role, Token};
use vtt_core::MacroError;

// =============================================================================
// Encoding
// =============================================================================

#[test]
fn test_json_payload_round_trip() {
    let link = MacroLink::new(
        "heal@Lib:Test",
        OutputTarget::All,
        RecipientTarget::Selected,
        r#"{"amount": 5, "note": "a;b&c", "tags": ["x", "y"]}"#,
    );
    assert_eq!(
        link.payload,
        LinkPayload::Json(json!({"amount": 5, "note": "a;b&c", "tags": ["x", "y"]}))
    );
    assert_eq!(MacroLink::decode(&link.encode()), Some(link));
}

#[test]
fn test_property_payload_with_separators_round_trips() {
    let link = MacroLink {
        macro_name: "note@Lib:Test".to_string(),
        output: OutputTarget::Gm,
        recipients: RecipientTarget::Tokens(vec!["Hero".into(), "Shared".into()]),
        payload: LinkPayload::PropertyList(vec!["text=fish & chips; peas".into(), "n=2".into()]),
    };
    let encoded = link.encode();
    assert!(!encoded.contains(' '));
    assert_eq!(encoded.matches('&').count(), 1);
    assert_eq!(MacroLink::decode(&encoded), Some(link));
}

#[test]
fn test_non_links_decode_to_none() {
    for text in ["", "macro://", "macro://a/b", "https://x/y/z?q", "see macro://a"] {
        assert_eq!(MacroLink::decode(text), None, "{text:?}");
    }
}

// =============================================================================
// Auto-execution
// =============================================================================

fn auto_link(name: &str) -> String {
    MacroLink::new(name, OutputTarget::None, RecipientTarget::Impersonated, "").encode()
}

#[test]
fn test_auto_execution_requires_flag_and_trusted_holder() {
    let h = TestHarness::new();
    h.put_macro(h.library, MacroButton::new("auto", "x").with_auto_execute(true));
    h.put_macro(h.library, MacroButton::new("manual", "x"));
    h.add_token(
        Token::new("Lib:Open")
            .owned_by_all()
            .with_macro(MacroButton::new("auto", "x").with_auto_execute(true)),
    );
    h.add_token(
        Token::new("Lib:Pat")
            .with_owner("Pat")
            .with_macro(MacroButton::new("auto", "x").with_auto_execute(true)),
    );

    assert!(is_auto_executable(&h.interpreter, &auto_link("auto@Lib:Test")));
    assert!(!is_auto_executable(&h.interpreter, &auto_link("manual@Lib:Test")));
    assert!(!is_auto_executable(&h.interpreter, &auto_link("auto@Lib:Open")));
    assert!(!is_auto_executable(&h.interpreter, &auto_link("auto@Lib:Pat")));
    assert!(!is_auto_executable(&h.interpreter, &auto_link("missing@Lib:Test")));
    assert!(!is_auto_executable(&h.interpreter, "auto@Lib:Test"));
}

#[test]
fn test_gm_demotion_is_seen_on_next_check() {
    let h = TestHarness::new();
    h.put_macro(h.library, MacroButton::new("auto", "x").with_auto_execute(true));
    let link = auto_link("auto@Lib:Test");
    assert!(is_auto_executable(&h.interpreter, &link));

    h.set_role("Gina", Role::Player);
    assert!(!is_auto_executable(&h.interpreter, &link));

    h.set_role("Gina", Role::Gm);
    assert!(is_auto_executable(&h.interpreter, &link));
}

// =============================================================================
// Running
// =============================================================================

fn seed_shared_hp(h: &TestHarness) {
    h.eval("[h: setProperty('HP', 3, 'Shared')]");
}

#[test]
fn test_link_runs_once_per_selected_token() {
    let h = TestHarness::new();
    seed_shared_hp(&h);
    h.add_library_macro(
        "heal",
        "[h: setProperty('HP', HP + getStrProp(macro.args, 'amount'))][r: getName() + ' healed']",
    );
    h.session.set_selected(vec![h.hero, h.shared]);

    let link = MacroLink::new("heal@Lib:Test", OutputTarget::All, RecipientTarget::Selected, "amount=5");
    let report = h
        .interpreter
        .run_link(&link.encode(), LinkRunOptions::default())
        .unwrap();

    assert_eq!(report.outputs.len(), 2);
    assert_eq!(report.outputs[0].subject, Some(h.hero));
    assert_property(&h, h.hero, "HP", Some("17"));
    assert_property(&h, h.shared, "HP", Some("8"));

    let texts: Vec<String> = h.transcript().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["Hero healed", "Shared healed"]);
}

#[test]
fn test_output_targets_route_messages() {
    let h = TestHarness::new();
    h.add_library_macro("say", "hi");

    for (output, expected) in [
        (OutputTarget::Caller, vec![Channel::Player("Gina".into())]),
        (OutputTarget::Gm, vec![Channel::Gm]),
        (OutputTarget::All, vec![Channel::All]),
        (
            OutputTarget::CallerAndGm,
            vec![Channel::Player("Gina".into()), Channel::Gm],
        ),
        (OutputTarget::None, vec![]),
    ] {
        let link = MacroLink::new("say@Lib:Test", output, RecipientTarget::Impersonated, "");
        h.interpreter
            .run_link(&link.encode(), LinkRunOptions::default())
            .unwrap();
        let channels: Vec<Channel> = h.session.drain_transcript().into_iter().map(|m| m.channel).collect();
        assert_eq!(channels, expected, "{output}");
    }
}

#[test]
fn test_abort_in_one_recipient_does_not_stop_the_rest() {
    let h = TestHarness::new();
    h.add_library_macro(
        "maybe",
        "[h: getName() == 'Hero' && abort(0)][r: 'ran on ' + getName()]",
    );
    h.session.set_selected(vec![h.hero, h.shared]);

    let link = MacroLink::new("maybe@Lib:Test", OutputTarget::All, RecipientTarget::Selected, "");
    let report = h
        .interpreter
        .run_link(&link.encode(), LinkRunOptions::default())
        .unwrap();

    assert_eq!(report.outputs.len(), 2);
    assert!(report.outputs[0].aborted);
    assert_eq!(report.outputs[0].text, "");
    assert!(!report.outputs[1].aborted);
    assert_eq!(report.outputs[1].text, "ran on Shared");
    assert_eq!(h.transcript().len(), 1);
}

#[test]
fn test_errors_end_the_run_unless_isolated() {
    let h = TestHarness::new();
    h.add_library_macro("strict", "[h: assert(getName() != 'Hero', 'not the hero')][r: getName()]");
    let link = MacroLink::new(
        "strict@Lib:Test",
        OutputTarget::All,
        RecipientTarget::parse("Hero, Nobody, Shared"),
        "",
    )
    .encode();

    let err = h
        .interpreter
        .run_link(&link, LinkRunOptions::default())
        .unwrap_err();
    assert!(matches!(err, MacroError::AssertionFailed { .. }));
    assert!(h.session.drain_transcript().is_empty());

    let report = h.interpreter.run_link(&link, LinkRunOptions::isolated()).unwrap();
    assert_eq!(report.outputs.len(), 1);
    assert_eq!(report.outputs[0].text, "Shared");
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[1].recipient, "Nobody");
    assert!(matches!(report.failures[1].error, MacroError::UnknownToken { .. }));
}

#[test]
fn test_link_trust_comes_from_the_macro_holder() {
    let h = TestHarness::new();
    h.add_token(
        Token::new("Lib:Pat")
            .with_owner("Pat")
            .with_macro(MacroButton::new("shout", "[h: broadcast('forged')]")),
    );
    h.add_library_macro("shout", "[h: broadcast('official')]");

    let forged = MacroLink::new("shout@Lib:Pat", OutputTarget::None, RecipientTarget::Impersonated, "");
    let err = h
        .interpreter
        .run_link(&forged.encode(), LinkRunOptions::default())
        .unwrap_err();
    assert_eq!(
        err,
        MacroError::Permission {
            function: "broadcast".to_string()
        }
    );

    let official = MacroLink::new("shout@Lib:Test", OutputTarget::None, RecipientTarget::Impersonated, "");
    h.interpreter
        .run_link(&official.encode(), LinkRunOptions::default())
        .unwrap();
    assert_eq!(h.transcript()[0].text, "official");
}

#[test]
fn test_token_macro_on_recipient() {
    let h = TestHarness::new();
    h.put_macro(h.hero, MacroButton::new("shout", "[r: getName()] shouts"));
    h.put_macro(h.shared, MacroButton::new("shout", "[r: getName()] whispers"));

    let link = MacroLink::new(
        "shout@TOKEN",
        OutputTarget::All,
        RecipientTarget::parse("Hero,Shared"),
        "",
    );
    h.interpreter
        .run_link(&link.encode(), LinkRunOptions::default())
        .unwrap();
    let texts: Vec<String> = h.transcript().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["Hero shouts", "Shared whispers"]);
}
