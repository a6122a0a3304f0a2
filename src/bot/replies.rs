// src/bot/replies.rs - Automated reply formatting and delivery queue

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::platforms::GameServer;
use crate::types::{KeywordEntry, MessageKind, Player, DEFAULT_PREFIX_COLOR};

/// Render the chat line sent back to a player for a matched entry
pub fn format_reply(entry: &KeywordEntry) -> String {
    if entry.prefix.is_empty() {
        return entry.reply_message.clone();
    }

    let color = if entry.prefix_color.is_empty() {
        DEFAULT_PREFIX_COLOR
    } else {
        entry.prefix_color.as_str()
    };

    format!(
        "<font color=\"{}\"><strong>{}</strong></font> {}",
        color, entry.prefix, entry.reply_message
    )
}

/// A reply waiting to be delivered on the host's messaging context
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyTask {
    pub player: Player,
    pub trigger: String,
    pub message: String,
    pub kind: MessageKind,
}

/// Sending half of the reply queue; enqueueing never blocks
#[derive(Debug, Clone)]
pub struct ReplyQueue {
    sender: mpsc::UnboundedSender<ReplyTask>,
}

impl ReplyQueue {
    /// Create a queue and the receiver its pump will drain
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReplyTask>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn enqueue(&self, task: ReplyTask) {
        if let Err(e) = self.sender.send(task) {
            warn!("Reply for trigger '{}' dropped, pump has stopped", e.0.trigger);
        }
    }
}

/// Drains queued replies into the game server, one at a time and in order
pub struct ReplyPump {
    receiver: mpsc::UnboundedReceiver<ReplyTask>,
    server: Arc<dyn GameServer>,
}

impl ReplyPump {
    pub fn new(receiver: mpsc::UnboundedReceiver<ReplyTask>, server: Arc<dyn GameServer>) -> Self {
        Self { receiver, server }
    }

    /// Deliver replies until every queue handle has been dropped.
    ///
    /// Returns how many replies reached the server.
    pub async fn run(mut self) -> u64 {
        info!("Reply pump started for {}", self.server.server_name());
        let mut delivered = 0;

        while let Some(task) = self.receiver.recv().await {
            match self.server.send_to_player(&task.player, &task.message, task.kind).await {
                Ok(()) => {
                    delivered += 1;
                    debug!("Replied to {} for trigger '{}'", task.player.name, task.trigger);
                }
                Err(e) => {
                    // Usually the player left between the match and the reply
                    debug!("Could not reply to {}: {}", task.player.name, e);
                }
            }
        }

        info!("Reply pump stopped after {} replies", delivered);
        delivered
    }
}
