//! Dice rolled from macro text stay bounded.
//!
//! Oversized pools, oversized dice and overflowing modifiers come back as
//! macro errors instead of taking the process down.

use vtt_core::testing::TestHarness;
use vtt_core::MacroError;

fn rejected_argument(h: &TestHarness, body: &str) -> usize {
    match h.run_trusted(body) {
        Err(MacroError::MalformedArgument { position, .. }) => position,
        other => panic!("expected a malformed argument from {body}, got {other:?}"),
    }
}

#[test]
fn test_roll_function_bounds() {
    let h = TestHarness::new();
    assert_eq!(rejected_argument(&h, "[r: roll(3000000000, 6)]"), 1);
    assert_eq!(rejected_argument(&h, "[r: roll(10001, 6)]"), 1);
    assert_eq!(rejected_argument(&h, "[r: roll(99999999999, 6)]"), 1);
    assert_eq!(rejected_argument(&h, "[r: roll(1, 0)]"), 2);
    assert_eq!(rejected_argument(&h, "[r: roll(1, 1000001)]"), 2);

    let total: i64 = h.eval("[r: roll(10000, 6)]").parse().unwrap();
    assert!((10_000..=60_000).contains(&total));
}

#[test]
fn test_dice_literal_bounds() {
    let h = TestHarness::new();
    for body in [
        "[r: 3000000000d6]",
        "[r: 1d0]",
        "[r: 2d6kh3]",
    ] {
        assert!(
            matches!(h.error(body), MacroError::Evaluation(_)),
            "{body} should be rejected"
        );
    }

    let total: i64 = h.eval("[r: 4d6kl1]").parse().unwrap();
    assert!((1..=6).contains(&total));
}

#[test]
fn test_session_survives_rejected_rolls() {
    let h = TestHarness::new();
    assert!(h.run_trusted("[r: roll(4000000000, 4000000000)]").is_err());
    assert_eq!(h.eval("[r: roll(1, 1)]"), "1");
}
