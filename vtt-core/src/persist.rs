//! Campaign persistence.
//!
//! Campaigns are saved as versioned, human-readable JSON. Loading rejects
//! documents written with a different format version.

use crate::world::Campaign;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

/// A saved campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCampaign {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// Seconds since the Unix epoch when the save was created.
    pub saved_at: String,

    pub metadata: SaveMetadata,

    pub campaign: Campaign,
}

/// Summary readable without loading the whole campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub campaign_name: String,
    pub players: usize,
    pub tokens: usize,
    /// Names of the library tokens, whose macros hold most of the campaign logic.
    #[serde(default)]
    pub library_tokens: Vec<String>,
}

impl SavedCampaign {
    pub fn new(campaign: Campaign) -> Self {
        let metadata = SaveMetadata {
            campaign_name: campaign.name.clone(),
            players: campaign.players.len(),
            tokens: campaign.tokens.len(),
            library_tokens: campaign
                .library_tokens()
                .map(|token| token.name.clone())
                .collect(),
        };
        Self {
            version: SAVE_VERSION,
            saved_at: unix_now(),
            metadata,
            campaign,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;
        check_version(saved.version)?;
        Ok(saved)
    }

    /// Reads only the version and metadata of a save file.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let content = fs::read_to_string(path).await?;
        let partial: Partial = serde_json::from_str(&content)?;
        check_version(partial.version)?;
        Ok(partial.metadata)
    }

    pub fn into_campaign(self) -> Campaign {
        self.campaign
    }
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found != SAVE_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: SAVE_VERSION,
            found,
        });
    }
    Ok(())
}

/// Information about a save file.
#[derive(Debug, Clone)]
pub struct SaveInfo {
    pub path: PathBuf,
    pub metadata: SaveMetadata,
}

/// Lists loadable saves in a directory, sorted by path.
///
/// Files that are not current-version saves are skipped.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let mut saves = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Ok(metadata) = SavedCampaign::peek_metadata(&path).await {
                saves.push(SaveInfo { path, metadata });
            }
        }
    }

    saves.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(saves)
}

/// File name for a campaign save inside `base_dir`.
pub fn save_path(base_dir: impl AsRef<Path>, campaign_name: &str) -> PathBuf {
    let sanitized = campaign_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    base_dir.as_ref().join(format!("{sanitized}.json"))
}

fn unix_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{MacroButton, Player, Token};
    use tempfile::TempDir;

    fn sample() -> Campaign {
        let mut campaign = Campaign::new("Night Market");
        campaign.add_player(Player::gm("Gina"));
        campaign.add_token(
            Token::new("Lib:Rules")
                .with_owner("Gina")
                .with_macro(MacroButton::new("onCampaignLoad", "[h: x = 1]")),
        );
        campaign.add_token(Token::new("Hero").with_property("HP", "12"));
        campaign
    }

    #[test]
    fn test_metadata() {
        let saved = SavedCampaign::new(sample());
        assert_eq!(saved.version, SAVE_VERSION);
        assert_eq!(saved.metadata.campaign_name, "Night Market");
        assert_eq!(saved.metadata.tokens, 2);
        assert_eq!(saved.metadata.library_tokens, vec!["Lib:Rules".to_string()]);
    }

    #[test]
    fn test_save_path() {
        let path = save_path("/tmp/saves", "Night Market!");
        assert!(path.to_string_lossy().ends_with("Night_Market_.json"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("campaign.json");

        let campaign = sample();
        SavedCampaign::new(campaign.clone())
            .save_json(&path)
            .await
            .unwrap();

        let loaded = SavedCampaign::load_json(&path).await.unwrap();
        assert_eq!(loaded.into_campaign(), campaign);
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.json");

        let mut saved = SavedCampaign::new(sample());
        saved.version = SAVE_VERSION + 1;
        saved.save_json(&path).await.unwrap();

        let err = SavedCampaign::load_json(&path).await.unwrap_err();
        assert!(matches!(
            err,
            PersistError::VersionMismatch { expected: SAVE_VERSION, .. }
        ));
        assert!(SavedCampaign::peek_metadata(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_list_saves_skips_other_files() {
        let dir = TempDir::new().unwrap();
        SavedCampaign::new(sample())
            .save_json(save_path(dir.path(), "b"))
            .await
            .unwrap();
        SavedCampaign::new(Campaign::new("a"))
            .save_json(save_path(dir.path(), "a"))
            .await
            .unwrap();
        fs::write(dir.path().join("notes.json"), "{}").await.unwrap();
        fs::write(dir.path().join("readme.txt"), "hi").await.unwrap();

        let saves = list_saves(dir.path()).await.unwrap();
        let names: Vec<_> = saves.iter().map(|s| s.metadata.campaign_name.as_str()).collect();
        assert_eq!(names, vec!["a", "Night Market"]);
    }
}
