use anyhow::Result;
use async_trait::async_trait;

use crate::types::{MessageKind, Player};

pub mod console;

/// Interface to the host game server's player messaging facility.
///
/// Calls arrive from the reply pump, which runs wherever the host requires
/// player mutations to happen.
#[async_trait]
pub trait GameServer: Send + Sync {
    /// Deliver a chat line to one player
    async fn send_to_player(&self, player: &Player, message: &str, kind: MessageKind) -> Result<()>;

    /// Get the host identifier (e.g., "console")
    fn server_name(&self) -> &str;
}
