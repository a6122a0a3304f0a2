use log::{debug, error, info};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::WatchConfiguration;
use crate::types::{Category, ChatEvent, DispatchEvent, KeywordEntry, MessageKind, Player};

pub mod chat_log;
pub mod cooldown;
pub mod pattern_matching;
pub mod replies;
pub mod webhook;

use chat_log::ChatLog;
use cooldown::CooldownGate;
use pattern_matching::{strip_markup, KeywordList, KeywordRule, MessageView};
use replies::{format_reply, ReplyQueue, ReplyTask};
use webhook::{build_payload, NotificationPool};

/// Result of classifying one message, before any side effect runs
#[derive(Debug)]
pub struct Classification<'a> {
    pub category: Category,
    pub rule: &'a KeywordRule,
    pub clean_message: String,
}

/// Running totals for the watch
#[derive(Debug, Default)]
pub struct WatchStats {
    pub messages_seen: AtomicU64,
    pub obscene_matches: AtomicU64,
    pub general_matches: AtomicU64,
    pub replies_queued: AtomicU64,
}

/// Classifies chat messages and fans matches out to logs, replies and
/// webhook notifications.
///
/// `handle_chat` runs synchronously on the caller's thread. Replies are
/// queued for the reply pump and notifications handed to the pool, so
/// neither blocks message processing.
pub struct ChatWatch {
    obscene: KeywordList,
    general: KeywordList,
    command_prefix: String,
    cooldowns: CooldownGate,
    chat_log: Option<ChatLog>,
    replies: ReplyQueue,
    notifications: Option<NotificationPool>,
    stats: WatchStats,
}

impl ChatWatch {
    pub fn new(
        config: &WatchConfiguration,
        replies: ReplyQueue,
        notifications: Option<NotificationPool>,
    ) -> Self {
        let chat_log = if config.create_server_logs {
            let log = ChatLog::new(
                &config.log_directory,
                &config.general_log_name,
                &config.obscene_log_name,
            );
            if let Err(e) = log.ensure_directory() {
                error!("Could not create log directory {}: {}", log.directory().display(), e);
            }
            Some(log)
        } else {
            None
        };

        let watch = Self {
            obscene: KeywordList::new(Category::Obscene, &config.obscene_keywords),
            general: KeywordList::new(Category::General, &config.general_keywords),
            command_prefix: config.command_prefix.clone(),
            cooldowns: CooldownGate::new(),
            chat_log,
            replies,
            notifications,
            stats: WatchStats::default(),
        };

        info!(
            "Chat watch ready: {} obscene and {} general keywords, logging {}, notifications {}",
            watch.obscene.len(),
            watch.general.len(),
            if watch.chat_log.is_some() { "on" } else { "off" },
            if watch.notifications.is_some() { "on" } else { "off" }
        );
        watch
    }

    pub fn cooldowns(&self) -> &CooldownGate {
        &self.cooldowns
    }

    pub fn stats(&self) -> &WatchStats {
        &self.stats
    }

    /// Find the first rule that hits a raw message. Obscene rules are
    /// always tried before general ones.
    pub fn classify(&self, raw_message: &str) -> Option<Classification<'_>> {
        if raw_message.is_empty() || self.is_command(raw_message) {
            return None;
        }

        let clean_message = strip_markup(raw_message);
        let view = MessageView::new(clean_message);

        [&self.obscene, &self.general].into_iter().find_map(|list| {
            list.first_match(&view).map(|rule| Classification {
                category: list.category(),
                rule,
                clean_message: clean_message.to_string(),
            })
        })
    }

    /// Handle a chat event from the host
    pub fn handle_event(&self, event: &ChatEvent) -> Option<DispatchEvent> {
        self.handle_chat_at(&event.player, &event.message, event.timestamp.timestamp())
    }

    /// Classify a message and run the side effects of a match
    pub fn handle_chat(&self, player: &Player, message: &str) -> Option<DispatchEvent> {
        self.handle_chat_at(player, message, chrono::Utc::now().timestamp())
    }

    /// Same as `handle_chat` with an explicit clock, in Unix seconds
    pub fn handle_chat_at(&self, player: &Player, message: &str, now: i64) -> Option<DispatchEvent> {
        self.stats.messages_seen.fetch_add(1, Ordering::Relaxed);

        let classification = self.classify(message)?;
        let entry = classification.rule.entry();

        let event = DispatchEvent {
            category: classification.category,
            trigger: entry.trigger.clone(),
            player: player.clone(),
            message: classification.clean_message,
        };

        match event.category {
            Category::Obscene => self.stats.obscene_matches.fetch_add(1, Ordering::Relaxed),
            Category::General => self.stats.general_matches.fetch_add(1, Ordering::Relaxed),
        };
        info!(
            "{} trigger '{}' hit by {} ({}): {}",
            event.category, event.trigger, player.name, player.uid, event.message
        );

        self.record(&event);
        self.notify(&event);
        self.attempt_reply(player, entry, now);

        Some(event)
    }

    fn is_command(&self, message: &str) -> bool {
        !self.command_prefix.is_empty() && message.starts_with(&self.command_prefix)
    }

    fn record(&self, event: &DispatchEvent) {
        if let Some(log) = &self.chat_log {
            if let Err(e) = log.append(event.category, &event.player, &event.message) {
                error!("Failed to write {} log entry: {}", event.category, e);
            }
        }
    }

    fn notify(&self, event: &DispatchEvent) {
        if let Some(pool) = &self.notifications {
            pool.submit(build_payload(
                event.category,
                &event.player.name,
                &event.player.uid,
                &event.message,
                &event.trigger,
            ));
        }
    }

    /// Queue a reply if the entry wants one and its trigger is off cooldown
    fn attempt_reply(&self, player: &Player, entry: &KeywordEntry, now: i64) -> bool {
        if !entry.wants_reply() {
            return false;
        }

        if !self.cooldowns.try_fire(&entry.trigger, entry.cooldown_seconds, now) {
            debug!("Reply for '{}' suppressed by cooldown", entry.trigger);
            return false;
        }

        self.replies.enqueue(ReplyTask {
            player: player.clone(),
            trigger: entry.trigger.clone(),
            message: format_reply(entry),
            kind: MessageKind::Notification,
        });
        self.stats.replies_queued.fetch_add(1, Ordering::Relaxed);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::sync::{mpsc, Mutex};
    use super::webhook::{DeliveryError, Notifier, WebhookPayload};

    fn entry(trigger: &str) -> KeywordEntry {
        KeywordEntry::new(trigger)
    }

    fn replying(trigger: &str, reply: &str, cooldown_seconds: i64) -> KeywordEntry {
        KeywordEntry {
            auto_reply: true,
            reply_message: reply.to_string(),
            cooldown_seconds,
            ..KeywordEntry::new(trigger)
        }
    }

    fn config(obscene: Vec<KeywordEntry>, general: Vec<KeywordEntry>) -> WatchConfiguration {
        WatchConfiguration {
            create_server_logs: false,
            obscene_keywords: obscene,
            general_keywords: general,
            ..WatchConfiguration::default()
        }
    }

    fn watch(config: &WatchConfiguration) -> (ChatWatch, mpsc::UnboundedReceiver<ReplyTask>) {
        let (queue, receiver) = ReplyQueue::channel();
        (ChatWatch::new(config, queue, None), receiver)
    }

    fn steve() -> Player {
        Player::new("uid-steve", "Steve")
    }

    #[test]
    fn test_commands_and_empty_messages_are_ignored() {
        let (watch, _rx) = watch(&config(vec![entry("bad")], vec![]));
        assert!(watch.handle_chat_at(&steve(), "", 0).is_none());
        assert!(watch.handle_chat_at(&steve(), "/bad command", 0).is_none());
        assert!(watch.handle_chat_at(&steve(), "bad", 0).is_some());
    }

    #[tokio::test]
    async fn test_obscene_wins_over_general() {
        let temp_dir = tempdir().unwrap();
        let log_dir = temp_dir.path().join("logs");
        let notifier = Arc::new(CapturingNotifier {
            payloads: Mutex::new(Vec::new()),
        });
        let (pool, worker) = NotificationPool::start(notifier.clone(), 2, 16);
        let (queue, mut rx) = ReplyQueue::channel();
        let config = WatchConfiguration {
            create_server_logs: true,
            log_directory: log_dir.clone(),
            ..config(vec![entry("idiot")], vec![replying("idiot", "general reply", 0)])
        };
        let watch = ChatWatch::new(&config, queue, Some(pool));

        let event = watch.handle_chat_at(&steve(), "you idiot", 0).unwrap();
        assert_eq!(event.category, Category::Obscene);
        assert_eq!(event.trigger, "idiot");
        drop(watch);
        worker.await.unwrap();

        // None of the general entry's side effects run
        assert!(rx.try_recv().is_err());
        let general = std::fs::read_to_string(log_dir.join("chatwatch-general.log")).unwrap_or_default();
        assert!(general.is_empty());
        let obscene = std::fs::read_to_string(log_dir.join("chatwatch-obscene.log")).unwrap();
        assert_eq!(obscene.lines().count(), 1);

        let payloads = notifier.payloads.lock().await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].embeds[0].title, "ChatWatch Trigger: OBSCENE");
        assert!(payloads
            .iter()
            .all(|p| p.embeds[0].color != Category::General.color()));
    }

    #[test]
    fn test_first_entry_in_list_wins() {
        let (watch, _rx) = watch(&config(vec![], vec![entry("help"), entry("help me")]));
        let event = watch.handle_chat_at(&steve(), "help me please", 0).unwrap();
        assert_eq!(event.category, Category::General);
        assert_eq!(event.trigger, "help");
    }

    #[test]
    fn test_no_match_produces_nothing() {
        let (watch, mut rx) = watch(&config(vec![entry("bad")], vec![replying("help", "hi", 0)]));
        assert!(watch.handle_chat_at(&steve(), "good morning", 0).is_none());
        assert!(rx.try_recv().is_err());
        assert_eq!(watch.stats().messages_seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_markup_is_stripped_before_matching() {
        let (watch, _rx) = watch(&config(vec![], vec![entry("hello")]));
        let event = watch
            .handle_chat_at(&steve(), "<font color=#fff>Name</font>Hello world", 0)
            .unwrap();
        assert_eq!(event.message, "Hello world");

        // The styled name alone must not trigger a match
        let (watch, _rx) = self::watch(&config(vec![], vec![entry("name")]));
        assert!(watch
            .handle_chat_at(&steve(), "<font color=#fff>Name</font>Hello world", 0)
            .is_none());
    }

    #[test]
    fn test_reply_is_queued_and_gated_by_cooldown() {
        let (watch, mut rx) = watch(&config(vec![], vec![replying("help", "Ask a mod", 300)]));

        watch.handle_chat_at(&steve(), "help", 0).unwrap();
        let task = rx.try_recv().unwrap();
        assert_eq!(task.message, "Ask a mod");
        assert_eq!(task.player, steve());
        assert_eq!(task.kind, MessageKind::Notification);

        // Still matched and reported, but no second reply inside the window
        assert!(watch.handle_chat_at(&steve(), "HELP", 299).is_some());
        assert!(rx.try_recv().is_err());
        assert_eq!(watch.cooldowns().last_fired("help"), Some(0));

        watch.handle_chat_at(&steve(), "help", 300).unwrap();
        assert!(rx.try_recv().is_ok());
        assert_eq!(watch.cooldowns().last_fired("help"), Some(300));
    }

    #[test]
    fn test_negative_cooldown_replies_every_time() {
        let (watch, mut rx) = watch(&config(vec![], vec![replying("help", "Ask a mod", -1)]));

        for _ in 0..3 {
            watch.handle_chat_at(&steve(), "help", 10).unwrap();
            assert_eq!(rx.try_recv().unwrap().message, "Ask a mod");
        }
    }

    #[test]
    fn test_disabled_reply_never_queues_or_consumes_cooldown() {
        let mut silent = replying("help", "Ask a mod", 300);
        silent.auto_reply = false;
        let (watch, mut rx) = watch(&config(vec![], vec![silent]));

        for now in [0, 1, 500] {
            assert!(watch.handle_chat_at(&steve(), "help", now).is_some());
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(watch.cooldowns().last_fired("help"), None);
    }

    #[test]
    fn test_empty_reply_message_never_queues() {
        let (watch, mut rx) = watch(&config(vec![], vec![replying("help", "", 0)]));
        assert!(watch.handle_chat_at(&steve(), "help", 0).is_some());
        assert!(rx.try_recv().is_err());
        assert_eq!(watch.cooldowns().tracked_triggers(), 0);
    }

    #[test]
    fn test_same_trigger_in_both_lists_shares_cooldown() {
        let (watch, mut rx) = watch(&config(
            vec![replying("Noob", "obscene reply", 60)],
            vec![replying("noob", "general reply", 60)],
        ));

        watch.handle_chat_at(&steve(), "noob", 0).unwrap();
        assert_eq!(rx.try_recv().unwrap().message, "obscene reply");
        assert_eq!(watch.cooldowns().last_fired("NOOB"), Some(0));
    }

    #[test]
    fn test_matches_are_logged_per_category() {
        let temp_dir = tempdir().unwrap();
        let log_dir = temp_dir.path().join("logs");
        let config = WatchConfiguration {
            create_server_logs: true,
            log_directory: log_dir.clone(),
            ..config(vec![entry("bad")], vec![entry("help")])
        };
        let (watch, _rx) = watch(&config);
        assert!(log_dir.exists());

        watch.handle_chat_at(&steve(), "so bad", 0).unwrap();
        watch.handle_chat_at(&steve(), "help", 0).unwrap();
        watch.handle_chat_at(&steve(), "nothing here", 0);

        let obscene = std::fs::read_to_string(log_dir.join("chatwatch-obscene.log")).unwrap();
        assert!(obscene.contains("| PlayerUID: uid-steve] Steve: so bad"));
        let general = std::fs::read_to_string(log_dir.join("chatwatch-general.log")).unwrap();
        assert_eq!(general.lines().count(), 1);
    }

    #[test_log::test]
    fn test_log_failure_does_not_stop_replies() {
        let temp_dir = tempdir().unwrap();
        let blocker = temp_dir.path().join("blocked");
        std::fs::write(&blocker, "file").unwrap();

        let config = WatchConfiguration {
            create_server_logs: true,
            log_directory: blocker.join("logs"),
            ..config(vec![], vec![replying("help", "hi", 0)])
        };
        let (watch, mut rx) = watch(&config);

        assert!(watch.handle_chat_at(&steve(), "help", 0).is_some());
        assert!(rx.try_recv().is_ok());
    }

    struct CapturingNotifier {
        payloads: Mutex<Vec<WebhookPayload>>,
    }

    #[async_trait]
    impl Notifier for CapturingNotifier {
        async fn deliver(&self, payload: &WebhookPayload) -> Result<(), DeliveryError> {
            self.payloads.lock().await.push(payload.clone());
            Ok(())
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_matches_are_forwarded_to_notifier() {
        let notifier = Arc::new(CapturingNotifier {
            payloads: Mutex::new(Vec::new()),
        });
        let (pool, worker) = NotificationPool::start(notifier.clone(), 2, 16);
        let (queue, _rx) = ReplyQueue::channel();
        let watch = ChatWatch::new(
            &config(vec![entry("bad")], vec![entry("help")]),
            queue,
            Some(pool),
        );

        watch.handle_chat_at(&steve(), "bad \"stuff\"", 0).unwrap();
        watch.handle_chat_at(&steve(), "help", 0).unwrap();
        watch.handle_chat_at(&steve(), "fine", 0);
        drop(watch);
        worker.await.unwrap();

        let payloads = notifier.payloads.lock().await;
        assert_eq!(payloads.len(), 2);

        let mut titles: Vec<&str> = payloads.iter().map(|p| p.embeds[0].title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["ChatWatch Trigger: GENERAL", "ChatWatch Trigger: OBSCENE"]);

        let obscene = payloads
            .iter()
            .find(|p| p.embeds[0].color == Category::Obscene.color())
            .unwrap();
        assert_eq!(obscene.embeds[0].fields[3].value, "bad \"stuff\"");
    }
}
