//! Session-state accessor used by built-ins.
//!
//! The interpreter does not own campaign state. Built-ins read and write it
//! through [`SessionState`], which hands out token snapshots and accepts
//! whole-token updates. [`CampaignSession`] is the in-memory implementation
//! used by the headless runner and the tests.

use crate::world::{Campaign, ChatMessage, InitiativeList, Player, Token, TokenId};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Read/write surface of the shared session.
///
/// Implementations serialize their own mutations.
pub trait SessionState: Send + Sync {
    /// Looks a token up by id, then by name.
    fn find_token(&self, id_or_name: &str) -> Option<Token>;

    fn token(&self, id: TokenId) -> Option<Token>;

    /// Stores an updated token. Returns false if no token has that id.
    fn put_token(&self, token: Token) -> bool;

    fn library_tokens(&self) -> Vec<Token>;

    fn players(&self) -> Vec<Player>;

    /// GM-role membership, checked against the current player list.
    fn is_gm(&self, player: &str) -> bool {
        self.players()
            .iter()
            .any(|existing| existing.name == player && existing.is_gm())
    }

    fn impersonated(&self) -> Option<TokenId>;

    fn selected(&self) -> Vec<TokenId>;

    fn initiative(&self) -> InitiativeList;

    fn put_initiative(&self, list: InitiativeList);

    /// Message sink for chat output.
    fn deliver(&self, message: ChatMessage);
}

/// A [`Campaign`] behind a lock.
#[derive(Debug, Default)]
pub struct CampaignSession {
    campaign: RwLock<Campaign>,
}

impl CampaignSession {
    pub fn new(campaign: Campaign) -> Self {
        Self {
            campaign: RwLock::new(campaign),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Campaign> {
        self.campaign.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Campaign> {
        self.campaign.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current campaign state.
    pub fn snapshot(&self) -> Campaign {
        self.read().clone()
    }

    /// Swaps in a different campaign, returning the old one.
    pub fn replace(&self, campaign: Campaign) -> Campaign {
        std::mem::replace(&mut *self.write(), campaign)
    }

    pub fn with_campaign<R>(&self, f: impl FnOnce(&Campaign) -> R) -> R {
        f(&self.read())
    }

    pub fn with_campaign_mut<R>(&self, f: impl FnOnce(&mut Campaign) -> R) -> R {
        f(&mut self.write())
    }

    pub fn set_impersonated(&self, token: Option<TokenId>) {
        self.write().impersonated = token;
    }

    pub fn set_selected(&self, tokens: Vec<TokenId>) {
        self.write().selected = tokens;
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.read().transcript.clone()
    }

    /// Removes and returns every message delivered so far.
    pub fn drain_transcript(&self) -> Vec<ChatMessage> {
        std::mem::take(&mut self.write().transcript)
    }
}

impl SessionState for CampaignSession {
    fn find_token(&self, id_or_name: &str) -> Option<Token> {
        self.read().find_token(id_or_name).cloned()
    }

    fn token(&self, id: TokenId) -> Option<Token> {
        self.read().token(id).cloned()
    }

    fn put_token(&self, token: Token) -> bool {
        let mut campaign = self.write();
        match campaign.token_mut(token.id) {
            Some(existing) => {
                *existing = token;
                true
            }
            None => false,
        }
    }

    fn library_tokens(&self) -> Vec<Token> {
        self.read().library_tokens().cloned().collect()
    }

    fn players(&self) -> Vec<Player> {
        self.read().players.clone()
    }

    fn is_gm(&self, player: &str) -> bool {
        self.read().is_gm(player)
    }

    fn impersonated(&self) -> Option<TokenId> {
        self.read().impersonated
    }

    fn selected(&self) -> Vec<TokenId> {
        self.read().selected.clone()
    }

    fn initiative(&self) -> InitiativeList {
        self.read().initiative.clone()
    }

    fn put_initiative(&self, list: InitiativeList) {
        self.write().initiative = list;
    }

    fn deliver(&self, message: ChatMessage) {
        self.write().transcript.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Channel;

    #[test]
    fn test_put_token_requires_existing_id() {
        let mut campaign = Campaign::new("Test");
        let id = campaign.add_token(Token::new("Hero"));
        let session = CampaignSession::new(campaign);

        let mut hero = session.token(id).unwrap();
        hero.name = "Renamed".into();
        assert!(session.put_token(hero));
        assert_eq!(session.find_token("renamed").map(|t| t.id), Some(id));

        assert!(!session.put_token(Token::new("Stranger")));
    }

    #[test]
    fn test_gm_membership_reads_live_players() {
        let mut campaign = Campaign::new("Test");
        campaign.add_player(Player::gm("Alice"));
        let session = CampaignSession::new(campaign);
        assert!(session.is_gm("Alice"));

        session.with_campaign_mut(|c| c.add_player(Player::player("Alice")));
        assert!(!session.is_gm("Alice"));
    }

    #[test]
    fn test_deliver_appends_to_transcript() {
        let session = CampaignSession::default();
        session.deliver(ChatMessage::new(Channel::All, "Alice", "hello"));
        assert_eq!(session.drain_transcript().len(), 1);
        assert!(session.transcript().is_empty());
    }
}
