//! Interpreter configuration.

use std::env;

/// Macro run when a campaign is (re)loaded, on each trusted library token.
pub const DEFAULT_LOAD_HOOK: &str = "onCampaignLoad";

/// Configuration for an [`crate::Interpreter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Name of the local player; chat output for `self` goes here.
    pub player_name: String,

    /// Whether chat input not attached to a token runs trusted.
    pub trust_chat: bool,

    /// Macro label run on library tokens after a campaign reload.
    pub load_hook: String,
}

impl InterpreterConfig {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            trust_chat: false,
            load_hook: DEFAULT_LOAD_HOOK.to_string(),
        }
    }

    pub fn with_trust_chat(mut self, trust_chat: bool) -> Self {
        self.trust_chat = trust_chat;
        self
    }

    pub fn with_load_hook(mut self, load_hook: impl Into<String>) -> Self {
        self.load_hook = load_hook.into();
        self
    }

    /// Reads `VTT_PLAYER`, `VTT_TRUST_CHAT` and `VTT_ONLOAD_MACRO`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(player) = env::var("VTT_PLAYER") {
            config.player_name = player;
        }
        if let Ok(flag) = env::var("VTT_TRUST_CHAT") {
            config.trust_chat = matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(hook) = env::var("VTT_ONLOAD_MACRO") {
            config.load_hook = hook;
        }
        config
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self::new("Player")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = InterpreterConfig::new("Gina")
            .with_trust_chat(true)
            .with_load_hook("init");
        assert_eq!(config.player_name, "Gina");
        assert!(config.trust_chat);
        assert_eq!(config.load_hook, "init");
    }

    #[test]
    fn test_defaults() {
        let config = InterpreterConfig::default();
        assert!(!config.trust_chat);
        assert_eq!(config.load_hook, DEFAULT_LOAD_HOOK);
    }
}
