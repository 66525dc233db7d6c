//! Headless campaign runner for programmatic use.
//!
//! Wraps a [`CampaignSession`] and an [`Interpreter`] behind a small API
//! suited to scripts, tests and the line-oriented `vtt` binary:
//! - run chat text as the local player
//! - run macro links, including auto-executing ones found in output
//! - impersonate and select tokens
//! - save and load campaigns
//!
//! # Example
//!
//! ```ignore
//! use vtt_core::headless::{HeadlessConfig, HeadlessSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut table = HeadlessSession::new(HeadlessConfig::new("Gina")).await?;
//!     let reply = table.send("[r: 2 + 3]")?;
//!     println!("{}", reply.output.text);
//!     table.save("table.json").await?;
//!     Ok(())
//! }
//! ```

use crate::config::InterpreterConfig;
use crate::error::MacroError;
use crate::interpreter::{Interpreter, MacroOutput};
use crate::link::{self, LinkRunOptions, LinkRunReport};
use crate::persist::{PersistError, SavedCampaign};
use crate::session::{CampaignSession, SessionState};
use crate::world::{Campaign, ChatMessage, Player, Token, TokenId};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

lazy_static! {
    static ref LINK_IN_TEXT: Regex = Regex::new(r#"macro://[^\s"'<>]+"#).unwrap();
}

#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error(transparent)]
    Macro(#[from] MacroError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("No token matches '{0}'")]
    UnknownToken(String),
}

/// Configuration for a headless session.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub interpreter: InterpreterConfig,
    /// Campaign to load at start; a small demo table is used when unset.
    pub campaign_path: Option<PathBuf>,
}

impl HeadlessConfig {
    pub fn new(player: impl Into<String>) -> Self {
        Self {
            interpreter: InterpreterConfig::new(player),
            campaign_path: None,
        }
    }

    /// Reads the interpreter settings from the environment.
    pub fn from_env() -> Self {
        Self {
            interpreter: InterpreterConfig::from_env(),
            campaign_path: None,
        }
    }

    pub fn with_campaign(mut self, path: impl Into<PathBuf>) -> Self {
        self.campaign_path = Some(path.into());
        self
    }

    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        self.interpreter.player_name = player.into();
        self
    }
}

/// Result of one line of chat input.
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// Output of the chat macro itself, shown to the local player.
    pub output: MacroOutput,
    /// Auto-executed and deferred links run after the macro.
    pub links: Vec<LinkRunReport>,
    /// Messages delivered to chat while the line ran.
    pub messages: Vec<ChatMessage>,
}

/// A campaign table driven from code.
pub struct HeadlessSession {
    session: Arc<CampaignSession>,
    interpreter: Interpreter,
}

impl HeadlessSession {
    /// Loads the configured campaign, or builds the demo table.
    pub async fn new(config: HeadlessConfig) -> Result<Self, HeadlessError> {
        let campaign = match &config.campaign_path {
            Some(path) => SavedCampaign::load_json(path).await?.into_campaign(),
            None => demo_campaign(&config.interpreter.player_name),
        };
        Ok(Self::with_campaign(campaign, config.interpreter))
    }

    pub fn with_campaign(campaign: Campaign, config: InterpreterConfig) -> Self {
        let session = Arc::new(CampaignSession::new(campaign));
        let interpreter = Interpreter::new(session.clone(), config);
        let table = Self {
            session,
            interpreter,
        };
        table.reload();
        table
    }

    pub fn session(&self) -> &CampaignSession {
        &self.session
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn player_name(&self) -> &str {
        &self.interpreter.config().player_name
    }

    /// Runs chat input, then any auto-executing links in its output and any
    /// links it deferred.
    pub fn send(&self, text: &str) -> Result<ChatReply, HeadlessError> {
        let output = self.interpreter.run_chat(text)?;

        let mut links = Vec::new();
        for found in LINK_IN_TEXT.find_iter(&output.text) {
            if link::is_auto_executable(&self.interpreter, found.as_str()) {
                info!(link = %found.as_str(), "auto-executing macro link");
                links.push(self.interpreter.run_link(found.as_str(), LinkRunOptions::default())?);
            }
        }
        links.extend(self.interpreter.run_deferred_links()?);

        Ok(ChatReply {
            output,
            links,
            messages: self.session.drain_transcript(),
        })
    }

    /// Runs a macro link as the local player. Recipient failures are reported,
    /// not raised.
    pub fn run_link(&self, text: &str) -> Result<(LinkRunReport, Vec<ChatMessage>), HeadlessError> {
        let report = self.interpreter.run_link(text, LinkRunOptions::isolated())?;
        Ok((report, self.session.drain_transcript()))
    }

    /// Acts as the named token for chat input.
    pub fn impersonate(&self, token: &str) -> Result<TokenId, HeadlessError> {
        let id = self.lookup(token)?;
        self.session.set_impersonated(Some(id));
        Ok(id)
    }

    pub fn select(&self, tokens: &[&str]) -> Result<Vec<TokenId>, HeadlessError> {
        let ids = tokens
            .iter()
            .map(|token| self.lookup(token))
            .collect::<Result<Vec<_>, _>>()?;
        self.session.set_selected(ids.clone());
        Ok(ids)
    }

    fn lookup(&self, token: &str) -> Result<TokenId, HeadlessError> {
        self.session
            .find_token(token)
            .map(|found| found.id)
            .ok_or_else(|| HeadlessError::UnknownToken(token.to_string()))
    }

    /// Names of the user-defined functions in effect.
    pub fn function_names(&self) -> Vec<String> {
        self.interpreter.user_functions().names()
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), HeadlessError> {
        SavedCampaign::new(self.session.snapshot())
            .save_json(path)
            .await?;
        Ok(())
    }

    /// Replaces the campaign and re-runs the load hooks.
    ///
    /// Returns the library tokens whose hook failed.
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<Vec<(String, MacroError)>, HeadlessError> {
        let campaign = SavedCampaign::load_json(path).await?.into_campaign();
        info!(campaign = %campaign.name, "campaign loaded");
        self.session.replace(campaign);
        Ok(self.reload())
    }

    fn reload(&self) -> Vec<(String, MacroError)> {
        let failures = self.interpreter.reload_campaign();
        for (token, err) in &failures {
            warn!(token = %token, error = %err, "campaign load hook failed");
        }
        failures
    }
}

/// A table with the local player as GM, one hero and a library token.
pub fn demo_campaign(player: &str) -> Campaign {
    let mut campaign = Campaign::new("Headless Table");
    campaign.add_player(Player::gm(player));
    campaign.add_token(Token::new("Lib:Table").with_owner(player));
    let hero = campaign.add_token(
        Token::new("Hero")
            .with_owner(player)
            .with_property("HP", "10"),
    );
    campaign.impersonated = Some(hero);
    campaign
}
