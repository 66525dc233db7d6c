//! Chat output.

use super::{delimiter_arg, text_arg};
use crate::error::Flow;
use crate::frame::Frame;
use crate::marshal;
use crate::registry::{FunctionRegistry, MacroFunction};
use crate::value::Value;
use crate::world::{Channel, ChatMessage};
use crate::Builtin;
use serde_json::Value as Json;
use tracing::debug;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_builtin::<Broadcast>();
}

/// Maps broadcast target names onto channels.
///
/// `gm`, `self` and `all` are keywords; anything else must be a known
/// player. Unknown players are skipped.
fn channels(frame: &Frame<'_>, targets: &[String]) -> Vec<Channel> {
    if targets.is_empty() {
        return vec![Channel::All];
    }
    let players = frame.session().players();
    let mut channels = Vec::new();
    for target in targets {
        let channel = match target.to_lowercase().as_str() {
            "gm" => Channel::Gm,
            "self" => Channel::Player(frame.player().to_string()),
            "all" => Channel::All,
            _ => match players.iter().find(|player| player.name == *target) {
                Some(player) => Channel::Player(player.name.clone()),
                None => {
                    debug!(target = %target, "broadcast target is not a player");
                    continue;
                }
            },
        };
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    channels
}

/// Send a message to players, the GM, or everyone
#[derive(Builtin, Default)]
#[builtin(name = "broadcast", min = 1, max = 3, trusted)]
pub struct Broadcast;

impl MacroFunction for Broadcast {
    fn evaluate(&self, frame: &mut Frame<'_>, _alias: &str, args: Vec<Value>) -> Flow<Value> {
        let message = text_arg(&args, 0);
        let targets: Vec<String> = match args.get(1) {
            None => Vec::new(),
            Some(value) => match value.as_json() {
                Some(Json::Array(items)) => items
                    .iter()
                    .map(|item| Value::from_json(item).to_string())
                    .collect(),
                _ => marshal::split_list(&value.to_string(), &delimiter_arg(&args, 2, ","))
                    .into_iter()
                    .filter(|target| !target.is_empty())
                    .collect(),
            },
        };

        for channel in channels(frame, &targets) {
            frame
                .session()
                .deliver(ChatMessage::new(channel, frame.player(), message.clone()));
        }
        Ok(Value::empty())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::MacroError;
    use crate::testing::TestHarness;
    use crate::world::Channel;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_broadcast_defaults_to_everyone() {
        let h = TestHarness::new();
        h.eval("[h: broadcast('Roll for initiative')]");
        let transcript = h.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].channel, Channel::All);
        assert_eq!(transcript[0].sender, "Gina");
    }

    #[test]
    fn test_broadcast_targets() {
        let h = TestHarness::new();
        h.eval("[h: broadcast('psst', 'Pat; gm; nobody; gm', ';')]");
        let channels: Vec<Channel> = h.transcript().into_iter().map(|m| m.channel).collect();
        assert_eq!(channels, vec![Channel::Player("Pat".into()), Channel::Gm]);
    }

    #[test]
    fn test_broadcast_json_targets() {
        let h = TestHarness::new();
        h.eval(r#"[h: broadcast('hi', '["self"]')]"#);
        assert_eq!(h.transcript()[0].channel, Channel::Player("Gina".into()));
    }

    #[test]
    fn test_broadcast_requires_trust() {
        let h = TestHarness::new();
        assert_eq!(
            h.run("[h: broadcast('spam')]").unwrap_err(),
            MacroError::Permission {
                function: "broadcast".to_string()
            }
        );
        assert!(h.transcript().is_empty());
    }
}
