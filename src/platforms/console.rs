use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::platforms::GameServer;
use crate::types::{ChatEvent, MessageKind, Player};

/// Stand-in host that reads chat from a terminal and prints replies.
///
/// Input lines look like `name: message`; the name doubles as the player uid.
pub struct ConsoleServer<W> {
    output: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> ConsoleServer<W> {
    pub fn new(output: W) -> Self {
        Self {
            output: Mutex::new(output),
        }
    }

    /// Parse one console line into a chat event on the global channel
    pub fn parse_line(line: &str) -> Option<ChatEvent> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (name, message) = line.split_once(':')?;
        let name = name.trim();
        if name.is_empty() {
            debug!("Ignoring console line without a player name: {}", line);
            return None;
        }

        Some(ChatEvent::new(Player::new(name, name), 0, message.trim_start()))
    }

    pub fn into_inner(self) -> W {
        self.output.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> GameServer for ConsoleServer<W> {
    async fn send_to_player(&self, player: &Player, message: &str, kind: MessageKind) -> Result<()> {
        let label = match kind {
            MessageKind::Notification => "notice",
            MessageKind::General => "chat",
        };

        let mut output = self.output.lock().await;
        output
            .write_all(format!("[{} -> {}] {}\n", label, player.name, message).as_bytes())
            .await?;
        output.flush().await?;
        Ok(())
    }

    fn server_name(&self) -> &str {
        "console"
    }
}
