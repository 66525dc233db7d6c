//! Testing utilities for macro scenarios.
//!
//! [`TestHarness`] seeds a small campaign and runs macro text against it:
//! - GM `Gina` and player `Pat`
//! - `Lib:Test`, a library token owned by Gina
//! - `Hero`, owned by Pat, with `HP=12` and `Strength=16`
//! - `Shared`, owned by everyone
//!
//! The assertion helpers at the bottom report the macro text on failure.

use crate::config::InterpreterConfig;
use crate::error::MacroError;
use crate::interpreter::{Interpreter, MacroOutput, RunContext};
use crate::session::{CampaignSession, SessionState};
use crate::trust::MacroOrigin;
use crate::world::{Campaign, ChatMessage, MacroButton, Player, Role, Token, TokenId};
use std::sync::Arc;

/// Name of the seeded GM; trusted runs act as this player.
pub const GM_PLAYER: &str = "Gina";

/// Name of the seeded regular player; untrusted runs act as this player.
pub const PLAYER: &str = "Pat";

/// Name of the seeded library token.
pub const LIBRARY_TOKEN: &str = "Lib:Test";

/// A seeded campaign plus an interpreter over it.
pub struct TestHarness {
    pub session: Arc<CampaignSession>,
    pub interpreter: Interpreter,
    pub library: TokenId,
    pub hero: TokenId,
    pub shared: TokenId,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::new(GM_PLAYER))
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        let mut campaign = Campaign::new("Test Campaign");
        campaign.add_player(Player::gm(GM_PLAYER));
        campaign.add_player(Player::player(PLAYER));

        let library = campaign.add_token(Token::new(LIBRARY_TOKEN).with_owner(GM_PLAYER));
        let hero = campaign.add_token(
            Token::new("Hero")
                .with_owner(PLAYER)
                .with_property("HP", "12")
                .with_property("Strength", "16"),
        );
        let shared = campaign.add_token(Token::new("Shared").owned_by_all());
        campaign.impersonated = Some(hero);

        let session = Arc::new(CampaignSession::new(campaign));
        let interpreter = Interpreter::new(session.clone(), config);

        Self {
            session,
            interpreter,
            library,
            hero,
            shared,
        }
    }

    /// Runs `body` as untrusted chat input from Pat, acting as Hero.
    pub fn run(&self, body: &str) -> Result<MacroOutput, MacroError> {
        let context = RunContext::new(MacroOrigin::chat(false), PLAYER).with_subject(Some(self.hero));
        self.interpreter.run(body, context)
    }

    /// Runs `body` as a trusted internal caller, acting as Hero.
    pub fn run_trusted(&self, body: &str) -> Result<MacroOutput, MacroError> {
        let context = RunContext::new(
            MacroOrigin::internal(),
            &self.interpreter.config().player_name,
        )
        .with_subject(Some(self.hero));
        self.interpreter.run(body, context)
    }

    /// Output text of a trusted run. Panics on error.
    #[track_caller]
    pub fn eval(&self, body: &str) -> String {
        match self.run_trusted(body) {
            Ok(output) => output.text,
            Err(err) => panic!("macro {body:?} failed: {err}"),
        }
    }

    /// Error of a trusted run. Panics if the run succeeds.
    #[track_caller]
    pub fn error(&self, body: &str) -> MacroError {
        match self.run_trusted(body) {
            Ok(output) => panic!("macro {body:?} succeeded with {:?}", output.text),
            Err(err) => err,
        }
    }

    /// Adds a macro button to `Lib:Test`, replacing one with the same label.
    pub fn add_library_macro(&self, label: &str, command: &str) {
        self.put_macro(self.library, MacroButton::new(label, command));
    }

    /// Adds or replaces a macro button on any token.
    pub fn put_macro(&self, token: TokenId, button: MacroButton) {
        self.session.with_campaign_mut(|campaign| {
            if let Some(token) = campaign.token_mut(token) {
                token.macros.retain(|existing| existing.label != button.label);
                token.macros.push(button);
            }
        });
    }

    pub fn add_token(&self, token: Token) -> TokenId {
        self.session.with_campaign_mut(|campaign| campaign.add_token(token))
    }

    /// Current state of a token. Panics if it does not exist.
    #[track_caller]
    pub fn token(&self, id: TokenId) -> Token {
        self.session
            .token(id)
            .unwrap_or_else(|| panic!("token {id} does not exist"))
    }

    /// Changes a player's role, adding the player if needed.
    pub fn set_role(&self, player: &str, role: Role) {
        self.session
            .with_campaign_mut(|campaign| campaign.add_player(Player::new(player, role)));
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.session.transcript()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that a trusted run of `body` outputs `expected`.
#[track_caller]
pub fn assert_output(harness: &TestHarness, body: &str, expected: &str) {
    let actual = harness.eval(body);
    assert_eq!(actual, expected, "Unexpected output from {body:?}");
}

/// Assert that an untrusted run of `body` is refused for `function`.
#[track_caller]
pub fn assert_permission_denied(harness: &TestHarness, body: &str, function: &str) {
    match harness.run(body) {
        Err(MacroError::Permission { function: denied }) => assert_eq!(
            denied, function,
            "Expected {function} to be refused in {body:?}"
        ),
        other => panic!("Expected {function} to be refused in {body:?}, got {other:?}"),
    }
}

/// Assert a token property value, `None` meaning unset.
#[track_caller]
pub fn assert_property(harness: &TestHarness, token: TokenId, name: &str, expected: Option<&str>) {
    let actual = harness.token(token);
    assert_eq!(
        actual.property(name),
        expected,
        "Unexpected value for property {name} on {}",
        actual.name
    );
}
