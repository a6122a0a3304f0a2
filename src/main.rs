use anyhow::Result;
use log::{info, warn};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Stdout};

use chatwatch::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and initialize logging
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting ChatWatch v{}", chatwatch::VERSION);

    let config_manager = ConfigurationManager::from_env();
    let config = config_manager.load_or_create().await;

    // Replies are delivered by a single pump, the console stands in for the game server
    let server: Arc<dyn GameServer> = Arc::new(ConsoleServer::new(tokio::io::stdout()));
    let (reply_queue, reply_receiver) = ReplyQueue::channel();
    let reply_pump = tokio::spawn(ReplyPump::new(reply_receiver, server).run());

    let (notifications, notification_worker) = match config.webhook_target() {
        Some(url) => {
            let notifier = Arc::new(WebhookNotifier::new(url));
            let (pool, worker) = NotificationPool::start(
                notifier,
                config.max_concurrent_notifications,
                config.notification_queue_size,
            );
            (Some(pool), Some(worker))
        }
        None => (None, None),
    };

    let watch = ChatWatch::new(&config, reply_queue, notifications);

    info!("Reading chat from stdin as 'name: message' lines, Ctrl-C to stop");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if let Some(event) = ConsoleServer::<Stdout>::parse_line(&line) {
                            watch.handle_event(&event);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read chat input: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    let stats = watch.stats();
    info!(
        "Processed {} messages: {} obscene, {} general, {} replies",
        stats.messages_seen.load(Ordering::Relaxed),
        stats.obscene_matches.load(Ordering::Relaxed),
        stats.general_matches.load(Ordering::Relaxed),
        stats.replies_queued.load(Ordering::Relaxed)
    );

    // Dropping the watch closes the reply queue and the notification pool
    drop(watch);
    reply_pump.await?;
    if let Some(worker) = notification_worker {
        worker.await?;
    }

    info!("ChatWatch stopped");
    Ok(())
}
