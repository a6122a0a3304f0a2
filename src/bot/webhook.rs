// src/bot/webhook.rs - Webhook notifications for matched messages

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::types::Category;

pub const FOOTER_LABEL: &str = "ChatWatch Keyword Monitor";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Embed document posted to the webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl WebhookPayload {
    /// Serialized form; quotes, backslashes and newlines come out escaped
    pub fn to_json(&self) -> Result<String, DeliveryError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Prepare a user-supplied value for the payload. Carriage returns are
/// dropped here; the JSON encoder escapes the rest.
pub fn sanitize_field(value: &str) -> String {
    value.replace('\r', "")
}

fn field(name: &str, value: &str, inline: Option<bool>) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: sanitize_field(value),
        inline,
    }
}

/// Build the notification document for one match
pub fn build_payload(
    category: Category,
    player_name: &str,
    player_uid: &str,
    message: &str,
    trigger: &str,
) -> WebhookPayload {
    WebhookPayload {
        embeds: vec![Embed {
            title: format!("ChatWatch Trigger: {}", category),
            color: category.color(),
            fields: vec![
                field("Player", player_name, Some(true)),
                field("Trigger", trigger, Some(true)),
                field("UID", player_uid, Some(false)),
                field("Message", message, None),
            ],
            footer: EmbedFooter {
                text: FOOTER_LABEL.to_string(),
            },
        }],
    }
}

/// Outbound delivery of a notification document
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, payload: &WebhookPayload) -> Result<(), DeliveryError>;
}

/// Posts payloads to an HTTP webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, payload: &WebhookPayload) -> Result<(), DeliveryError> {
        let response = self.client.post(&self.url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status));
        }
        Ok(())
    }
}

/// Counters for the notification pool
#[derive(Debug, Default)]
pub struct NotificationStats {
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
    pub dropped: AtomicU64,
}

impl NotificationStats {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.delivered.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
        )
    }
}

/// Fire-and-forget submission into a bounded set of concurrent deliveries.
///
/// Submitting never waits. When the queue is full the payload is dropped.
/// Failed deliveries are logged and never retried.
#[derive(Clone)]
pub struct NotificationPool {
    sender: mpsc::Sender<WebhookPayload>,
    stats: Arc<NotificationStats>,
}

impl NotificationPool {
    /// Spawn the pool worker on the current tokio runtime.
    ///
    /// The returned handle completes once every pool handle is dropped and
    /// all in-flight deliveries have finished.
    pub fn start(
        notifier: Arc<dyn Notifier>,
        max_in_flight: usize,
        queue_size: usize,
    ) -> (Self, JoinHandle<()>) {
        let max_in_flight = concurrency_limit(max_in_flight);
        let (sender, receiver) = mpsc::channel(queue_size.max(1));
        let stats = Arc::new(NotificationStats::default());

        let worker = tokio::spawn(Self::run(receiver, notifier, max_in_flight, stats.clone()));
        info!("Notification pool started ({} concurrent deliveries)", max_in_flight);

        (Self { sender, stats }, worker)
    }

    pub fn submit(&self, payload: WebhookPayload) -> bool {
        match self.sender.try_send(payload) {
            Ok(()) => true,
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Notification dropped: {}", e);
                false
            }
        }
    }

    pub fn stats(&self) -> Arc<NotificationStats> {
        self.stats.clone()
    }

    async fn run(
        mut receiver: mpsc::Receiver<WebhookPayload>,
        notifier: Arc<dyn Notifier>,
        max_in_flight: usize,
        stats: Arc<NotificationStats>,
    ) {
        let permits = Arc::new(Semaphore::new(max_in_flight));

        while let Some(payload) = receiver.recv().await {
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let notifier = notifier.clone();
            let stats = stats.clone();
            tokio::spawn(async move {
                let _permit = permit;
                match notifier.deliver(&payload).await {
                    Ok(()) => {
                        stats.delivered.fetch_add(1, Ordering::Relaxed);
                        debug!("Notification delivered");
                    }
                    Err(e) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!("Notification delivery failed: {}", e);
                    }
                }
            });
        }

        // Wait for in-flight deliveries before reporting completion
        let _ = permits
            .acquire_many(u32::try_from(max_in_flight).unwrap_or(u32::MAX))
            .await;
        debug!("Notification pool drained");
    }
}

/// Keep the configured concurrency within what a semaphore can hold and
/// what `acquire_many` can drain in one call.
fn concurrency_limit(requested: usize) -> usize {
    let ceiling = Semaphore::MAX_PERMITS.min(usize::try_from(u32::MAX).unwrap_or(usize::MAX));
    requested.clamp(1, ceiling)
}
