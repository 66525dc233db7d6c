//! Saving and loading campaigns through the headless table.

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use vtt_core::headless::{demo_campaign, HeadlessConfig, HeadlessSession};
use vtt_core::persist::{list_saves, save_path, PersistError, SavedCampaign};
use vtt_core::world::{MacroButton, Player, Token};
use vtt_core::{Campaign, InterpreterConfig, MacroError};

fn campaign() -> Campaign {
    let mut campaign = demo_campaign("Gina");
    campaign.name = "Sunken Keep".to_string();
    campaign.add_player(Player::player("Pat"));
    campaign.add_token(
        Token::new("Lib:Rules")
            .with_owner("Gina")
            .with_macro(MacroButton::new(
                "onCampaignLoad",
                "[h: defineFunction('bloodied', '[r: HP < 5]')]",
            )),
    );
    campaign.add_token(
        Token::new("Lib:Homebrew")
            .with_owner("Pat")
            .with_macro(MacroButton::new(
                "onCampaignLoad",
                "[h: defineFunction('cheat', '[r: 20]')]",
            )),
    );
    campaign
}

fn table(campaign: Campaign) -> HeadlessSession {
    HeadlessSession::with_campaign(campaign, InterpreterConfig::new("Gina").with_trust_chat(true))
}

#[tokio::test]
async fn test_table_state_survives_a_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = save_path(dir.path(), "Sunken Keep");

    let before = table(campaign());
    before
        .send("[h: setProperty('HP', 3)][h: setState('Prone', 1)][h: addToInitiative(0, 14)][h: setInitiativeRound(4)]")
        .unwrap();
    before.save(&path).await.unwrap();

    let after = HeadlessSession::new(HeadlessConfig::new("Gina").with_campaign(&path))
        .await
        .unwrap();
    assert_eq!(after.session().snapshot(), before.session().snapshot());
    assert_eq!(
        after
            .send("[r: getState('Prone')],[r: getInitiativeRound()],[r: initiativeSize()]")
            .unwrap()
            .output
            .text,
        "1,4,1"
    );
}

#[tokio::test]
async fn test_only_trusted_load_hooks_define_functions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keep.json");

    let first = table(campaign());
    assert_eq!(first.function_names(), vec!["bloodied".to_string()]);
    first.send("[h: defineFunction('scratch', '[r: 1]')]").unwrap();
    first.save(&path).await.unwrap();

    let failures = first.load(&path).await.unwrap();
    assert!(failures.is_empty());
    assert_eq!(first.function_names(), vec!["bloodied".to_string()]);
    assert_eq!(first.send("[r: bloodied()]").unwrap().output.text, "0");
}

#[tokio::test]
async fn test_failing_hook_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");

    let mut broken = campaign();
    broken.add_token(
        Token::new("Lib:Broken")
            .with_owner("Gina")
            .with_macro(MacroButton::new("onCampaignLoad", "[h: assert(0, 'missing tables')]")),
    );
    SavedCampaign::new(broken).save_json(&path).await.unwrap();

    let failures = table(campaign()).load(&path).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "Lib:Broken");
    assert_eq!(
        failures[0].1,
        MacroError::AssertionFailed {
            message: "Macro-defined error: missing tables".to_string()
        }
    );
}

#[tokio::test]
async fn test_directory_listing_reads_metadata_only() {
    let dir = TempDir::new().unwrap();
    table(campaign())
        .save(save_path(dir.path(), "Sunken Keep"))
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("corrupt.json"), "{ not json")
        .await
        .unwrap();

    let saves = list_saves(dir.path()).await.unwrap();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].metadata.campaign_name, "Sunken Keep");
    assert_eq!(saves[0].metadata.players, 2);
    assert_eq!(
        saves[0].metadata.library_tokens,
        vec![
            "Lib:Table".to_string(),
            "Lib:Rules".to_string(),
            "Lib:Homebrew".to_string()
        ]
    );
}

#[tokio::test]
async fn test_missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = SavedCampaign::load_json(dir.path().join("absent.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, PersistError::Io(_)));
}
