//! Campaign state that macros read and mutate.
//!
//! Contains players, tokens with their macro buttons, the turn order and
//! the chat transcript. The interpreter never touches these types directly;
//! it goes through [`crate::session::SessionState`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Token names starting with this prefix are library tokens.
pub const LIBRARY_PREFIX: &str = "lib:";

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(pub Uuid);

impl TokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(TokenId)
    }
}

// ============================================================================
// Players
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Role {
    Gm,
    #[default]
    Player,
}

/// A connected player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub role: Role,
}

impl Player {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    pub fn gm(name: impl Into<String>) -> Self {
        Self::new(name, Role::Gm)
    }

    pub fn player(name: impl Into<String>) -> Self {
        Self::new(name, Role::Player)
    }

    pub fn is_gm(&self) -> bool {
        self.role == Role::Gm
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// A macro button stored on a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroButton {
    pub label: String,
    pub command: String,
    #[serde(default)]
    pub auto_execute: bool,
    #[serde(default)]
    pub group: String,
}

impl MacroButton {
    pub fn new(label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
            auto_execute: false,
            group: String::new(),
        }
    }

    pub fn with_auto_execute(mut self, auto_execute: bool) -> Self {
        self.auto_execute = auto_execute;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }
}

/// A token on the map, or a library token holding shared macros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub name: String,
    #[serde(default)]
    pub owners: BTreeSet<String>,
    #[serde(default)]
    pub owned_by_all: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub states: BTreeMap<String, bool>,
    #[serde(default)]
    pub macros: Vec<MacroButton>,
}

impl Token {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TokenId::new(),
            name: name.into(),
            owners: BTreeSet::new(),
            owned_by_all: false,
            properties: BTreeMap::new(),
            states: BTreeMap::new(),
            macros: Vec::new(),
        }
    }

    pub fn with_owner(mut self, player: impl Into<String>) -> Self {
        self.owners.insert(player.into());
        self
    }

    pub fn owned_by_all(mut self) -> Self {
        self.owned_by_all = true;
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(&name.into(), value);
        self
    }

    pub fn with_macro(mut self, button: MacroButton) -> Self {
        self.macros.push(button);
        self
    }

    pub fn is_library(&self) -> bool {
        self.name.to_lowercase().starts_with(LIBRARY_PREFIX)
    }

    pub fn is_owner(&self, player: &str) -> bool {
        self.owned_by_all || self.owners.contains(player)
    }

    /// Property lookup, ignoring case.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        let key = self
            .properties
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| name.to_string());
        self.properties.insert(key, value.into());
    }

    pub fn state(&self, name: &str) -> bool {
        self.states.get(name).copied().unwrap_or(false)
    }

    pub fn macro_button(&self, label: &str) -> Option<&MacroButton> {
        self.macros.iter().find(|button| button.label == label)
    }
}

// ============================================================================
// Turn Order
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    pub token: TokenId,
    pub initiative: Option<String>,
}

/// Turn order tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeList {
    pub round: i64,
    pub current: Option<usize>,
    pub entries: Vec<InitiativeEntry>,
}

impl InitiativeList {
    pub fn new() -> Self {
        Self {
            round: 1,
            current: None,
            entries: Vec::new(),
        }
    }

    pub fn contains(&self, token: TokenId) -> bool {
        self.entries.iter().any(|entry| entry.token == token)
    }

    pub fn add(&mut self, token: TokenId, initiative: Option<String>) {
        self.entries.push(InitiativeEntry { token, initiative });
    }

    /// Removes every entry for `token`, returning how many were removed.
    pub fn remove(&mut self, token: TokenId) -> usize {
        let before = self.entries.len();
        let current_token = self.current_entry().map(|entry| entry.token);
        self.entries.retain(|entry| entry.token != token);
        self.current = match current_token {
            Some(current) if current != token => {
                self.entries.iter().position(|entry| entry.token == current)
            }
            _ => None,
        };
        before - self.entries.len()
    }

    pub fn current_entry(&self) -> Option<&InitiativeEntry> {
        self.current.and_then(|index| self.entries.get(index))
    }

    /// Advances to the next entry, wrapping into a new round.
    pub fn next(&mut self) {
        if self.entries.is_empty() {
            self.current = None;
            return;
        }
        self.current = match self.current {
            None => Some(0),
            Some(index) if index + 1 >= self.entries.len() => {
                self.round += 1;
                Some(0)
            }
            Some(index) => Some(index + 1),
        };
    }
}

impl Default for InitiativeList {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Chat
// ============================================================================

/// Where a chat message is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    /// Only the named player sees it.
    Player(String),
    /// Every GM sees it.
    Gm,
    /// Everyone sees it.
    All,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Player(name) => write!(f, "to {name}"),
            Channel::Gm => write!(f, "gm"),
            Channel::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub channel: Channel,
    pub sender: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(channel: Channel, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel,
            sender: sender.into(),
            text: text.into(),
        }
    }
}

// ============================================================================
// Campaign
// ============================================================================

/// Everything a running campaign shares between players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub name: String,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub selected: Vec<TokenId>,
    #[serde(default)]
    pub impersonated: Option<TokenId>,
    #[serde(default)]
    pub initiative: InitiativeList,
    #[serde(default)]
    pub transcript: Vec<ChatMessage>,
}

impl Campaign {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            players: Vec::new(),
            tokens: Vec::new(),
            selected: Vec::new(),
            impersonated: None,
            initiative: InitiativeList::new(),
            transcript: Vec::new(),
        }
    }

    pub fn add_player(&mut self, player: Player) {
        self.players.retain(|existing| existing.name != player.name);
        self.players.push(player);
    }

    pub fn add_token(&mut self, token: Token) -> TokenId {
        let id = token.id;
        self.tokens.push(token);
        id
    }

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.iter().find(|token| token.id == id)
    }

    pub fn token_mut(&mut self, id: TokenId) -> Option<&mut Token> {
        self.tokens.iter_mut().find(|token| token.id == id)
    }

    /// Resolves a token by id, falling back to a case-insensitive name match.
    pub fn find_token(&self, id_or_name: &str) -> Option<&Token> {
        if let Ok(id) = id_or_name.parse::<TokenId>() {
            if let Some(token) = self.token(id) {
                return Some(token);
            }
        }
        let wanted = id_or_name.trim();
        self.tokens
            .iter()
            .find(|token| token.name.eq_ignore_ascii_case(wanted))
    }

    pub fn is_gm(&self, player: &str) -> bool {
        self.players
            .iter()
            .any(|existing| existing.name == player && existing.is_gm())
    }

    pub fn library_tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|token| token.is_library())
    }
}

impl Default for Campaign {
    fn default() -> Self {
        Campaign::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_token_by_id_or_name() {
        let mut campaign = Campaign::new("Test");
        let id = campaign.add_token(Token::new("Goblin"));

        assert_eq!(campaign.find_token(&id.to_string()).map(|t| t.id), Some(id));
        assert_eq!(campaign.find_token("goblin").map(|t| t.id), Some(id));
        assert!(campaign.find_token("Orc").is_none());
    }

    #[test]
    fn test_token_properties_ignore_case() {
        let mut token = Token::new("Hero").with_property("HP", "10");
        token.set_property("hp", "12");
        assert_eq!(token.property("Hp"), Some("12"));
        assert_eq!(token.properties.len(), 1);
    }

    #[test]
    fn test_library_detection() {
        assert!(Token::new("Lib:Combat").is_library());
        assert!(!Token::new("Library").is_library());
    }

    #[test]
    fn test_initiative_wraps_rounds() {
        let mut list = InitiativeList::new();
        let a = TokenId::new();
        let b = TokenId::new();
        list.add(a, Some("15".into()));
        list.add(b, None);

        list.next();
        assert_eq!(list.current_entry().map(|e| e.token), Some(a));
        list.next();
        assert_eq!(list.current_entry().map(|e| e.token), Some(b));
        list.next();
        assert_eq!(list.current_entry().map(|e| e.token), Some(a));
        assert_eq!(list.round, 2);
    }

    #[test]
    fn test_initiative_remove_keeps_current() {
        let mut list = InitiativeList::new();
        let a = TokenId::new();
        let b = TokenId::new();
        list.add(a, None);
        list.add(b, None);
        list.next();
        list.next();

        assert_eq!(list.remove(a), 1);
        assert_eq!(list.current_entry().map(|e| e.token), Some(b));
    }
}
