// src/types/mod.rs - Core data types shared by the watch pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Color used for a reply prefix when the entry does not set one
pub const DEFAULT_PREFIX_COLOR: &str = "#F5E945";

/// One configured trigger rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordEntry {
    pub trigger: String,
    pub exact_match: bool,
    pub auto_reply: bool,
    pub reply_message: String,
    pub prefix: String,
    pub prefix_color: String,
    /// Seconds between automated replies for this trigger; zero or negative never blocks
    pub cooldown_seconds: i64,
}

impl KeywordEntry {
    /// Plain loose-mode entry with no reply attached
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            ..Self::default()
        }
    }

    /// Entries with an empty or whitespace-only trigger never match
    pub fn is_blank(&self) -> bool {
        self.trigger.trim().is_empty()
    }

    /// Whether a match on this entry may produce a reply at all
    pub fn wants_reply(&self) -> bool {
        self.auto_reply && !self.reply_message.is_empty()
    }
}

/// Which keyword list produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Obscene,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Obscene => "OBSCENE",
            Category::General => "GENERAL",
        }
    }

    /// Embed color for webhook notifications (red for obscene, blue for general)
    pub fn color(&self) -> u32 {
        match self {
            Category::Obscene => 16711680,
            Category::General => 3447003,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The player that authored a chat message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub uid: String,
    pub name: String,
}

impl Player {
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
        }
    }
}

/// A single chat utterance as delivered by the host server
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub player: Player,
    pub channel_id: i32,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ChatEvent {
    pub fn new(player: Player, channel_id: i32, message: impl Into<String>) -> Self {
        Self {
            player,
            channel_id,
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Record of one match, handed to the logging, reply and notification paths
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEvent {
    pub category: Category,
    pub trigger: String,
    pub player: Player,
    pub message: String,
}

/// Chat classification a host uses when delivering a message to a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Notification,
    General,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_entries() {
        assert!(KeywordEntry::new("").is_blank());
        assert!(KeywordEntry::new("  \t ").is_blank());
        assert!(!KeywordEntry::new(" x ").is_blank());
    }

    #[test]
    fn test_wants_reply_requires_flag_and_message() {
        let mut entry = KeywordEntry::new("hello");
        assert!(!entry.wants_reply());

        entry.reply_message = "Hi there".to_string();
        assert!(!entry.wants_reply());

        entry.auto_reply = true;
        assert!(entry.wants_reply());

        entry.reply_message.clear();
        assert!(!entry.wants_reply());
    }

    #[test]
    fn test_category_colors() {
        assert_eq!(Category::Obscene.color(), 0xFF0000);
        assert_eq!(Category::General.color(), 0x3498DB);
        assert_eq!(Category::Obscene.to_string(), "OBSCENE");
    }

    #[test]
    fn test_entry_defaults_fill_missing_fields() {
        let entry: KeywordEntry = serde_json::from_str(r#"{"trigger": "grief"}"#).unwrap();
        assert_eq!(entry.trigger, "grief");
        assert!(!entry.exact_match);
        assert!(!entry.auto_reply);
        assert_eq!(entry.cooldown_seconds, 0);
    }

    #[test]
    fn test_entry_accepts_negative_cooldown() {
        let entry: KeywordEntry =
            serde_json::from_str(r#"{"trigger": "help", "cooldown_seconds": -1}"#).unwrap();
        assert_eq!(entry.cooldown_seconds, -1);
    }
}
