//! # ChatWatch
//!
//! Keyword watch for multiplayer game server chat. Every message is checked
//! against an obscene and a general keyword list; the first matching entry
//! can append to a category log, send an automated reply to the author and
//! forward a notification to a webhook.
//!
//! ## Features
//!
//! - **Loose matching**: substring checks that see through inserted punctuation ("d.u.m-b")
//! - **Exact matching**: word-boundary patterns that tolerate spaced-out letters
//! - **Per-trigger cooldowns**: automated replies are rate limited per keyword
//! - **Non-blocking side effects**: replies are queued, notifications pooled
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatwatch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigurationManager::new("config/chatwatch.yaml").load_or_create().await;
//!
//!     let (queue, receiver) = ReplyQueue::channel();
//!     let server = std::sync::Arc::new(ConsoleServer::new(tokio::io::stdout()));
//!     tokio::spawn(ReplyPump::new(receiver, server).run());
//!
//!     let watch = ChatWatch::new(&config, queue, None);
//!     watch.handle_chat(&Player::new("uid-1", "Steve"), "hello there");
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod platforms;
pub mod bot;
pub mod config;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bot::{ChatWatch, Classification};
    pub use crate::bot::pattern_matching::{normalize, strip_markup, KeywordList, KeywordRule, MessageView};
    pub use crate::bot::cooldown::CooldownGate;
    pub use crate::bot::replies::{format_reply, ReplyPump, ReplyQueue, ReplyTask};
    pub use crate::bot::webhook::{build_payload, NotificationPool, Notifier, WebhookNotifier, WebhookPayload};
    pub use crate::config::{ConfigurationManager, WatchConfiguration};
    pub use crate::platforms::{console::ConsoleServer, GameServer};
    pub use crate::types::{Category, ChatEvent, DispatchEvent, KeywordEntry, MessageKind, Player};
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
