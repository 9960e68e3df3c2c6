use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::command::{self, Command};
use crate::config::Config;
use crate::handlers::{self, move_members, poll, quote::QuoteClient, welcome};
use crate::message_log::MessageLog;
use crate::platform::{InboundMessage, MemberJoin, Platform};

/// Quiet time after which a channel's worker exits.
const LANE_IDLE: Duration = Duration::from_secs(600);

/// A message waiting in its channel's lane
struct Delivery {
    platform: Arc<dyn Platform>,
    msg: InboundMessage,
}

/// Shared bot state, constructed once at startup
pub struct Bot {
    config: RwLock<Config>,
    log: MessageLog,
    quotes: QuoteClient,
    // One sequential worker per active channel.
    lanes: Mutex<HashMap<u64, mpsc::UnboundedSender<Delivery>>>,
    lane_idle: Duration,
}

impl Bot {
    pub fn new(config: Config) -> Self {
        let log = MessageLog::new(config.log_path(), config.log_msg_limit());
        let quotes = QuoteClient::new(config.quote_url());
        Self {
            config: RwLock::new(config),
            log,
            quotes,
            lanes: Mutex::new(HashMap::new()),
            lane_idle: LANE_IDLE,
        }
    }

    #[cfg(test)]
    fn with_lane_idle(mut self, idle: Duration) -> Self {
        self.lane_idle = idle;
        self
    }

    #[cfg(test)]
    async fn lane_count(&self) -> usize {
        self.lanes.lock().await.len()
    }

    #[allow(dead_code)]
    pub async fn config_get(&self, section: &str, key: &str) -> Option<toml::Value> {
        self.config.read().await.get(section, key).cloned()
    }

    #[allow(dead_code)]
    pub async fn config_set(&self, section: &str, key: &str, value: impl Into<toml::Value>) {
        self.config.write().await.set(section, key, value);
    }

    #[allow(dead_code)]
    pub fn message_log(&self) -> &MessageLog {
        &self.log
    }

    /// Drain the message log; called on shutdown.
    pub async fn flush_log(&self) -> Result<usize> {
        self.log.flush().await
    }

    /// Queue a message behind earlier messages from the same channel.
    ///
    /// Lanes keep the order in which messages reach this call. serenity
    /// dispatches each gateway event on its own task, so two messages sent
    /// close together may already have swapped places before they get here.
    pub async fn enqueue(self: &Arc<Self>, platform: Arc<dyn Platform>, msg: InboundMessage) {
        let mut lanes = self.lanes.lock().await;
        let channel_id = msg.channel_id;
        let delivery = Delivery { platform, msg };

        let delivery = match lanes.get(&channel_id) {
            Some(tx) => match tx.send(delivery) {
                Ok(()) => return,
                // Worker is gone; start a fresh one below.
                Err(mpsc::error::SendError(d)) => d,
            },
            None => delivery,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Arc::clone(self).run_lane(channel_id, rx));
        if tx.send(delivery).is_err() {
            error!("Lane for channel {} closed before first message", channel_id);
        }
        lanes.insert(channel_id, tx);
    }

    async fn run_lane(self: Arc<Self>, channel_id: u64, mut rx: mpsc::UnboundedReceiver<Delivery>) {
        debug!("Started message lane for channel {}", channel_id);
        loop {
            let delivery = match tokio::time::timeout(self.lane_idle, rx.recv()).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => break,
                Err(_) => {
                    // `enqueue` sends while holding the map lock, so nothing
                    // can arrive between this check and the removal.
                    let mut lanes = self.lanes.lock().await;
                    match rx.try_recv() {
                        Ok(delivery) => delivery,
                        Err(_) => {
                            lanes.remove(&channel_id);
                            debug!("Closed idle message lane for channel {}", channel_id);
                            break;
                        }
                    }
                }
            };
            self.handle_message(delivery.platform.as_ref(), &delivery.msg)
                .await;
        }
    }

    /// Log the message, then run whichever command it carries.
    pub async fn handle_message(&self, platform: &dyn Platform, msg: &InboundMessage) {
        if let Err(e) = self.log.record(msg.to_logged()).await {
            error!("Message log flush failed: {:#}", e);
        }

        if msg.author_is_bot {
            return;
        }

        let Some(command) = command::classify(&msg.content) else {
            return;
        };

        info!(
            "Command {:?} from {} ({}) in channel {}",
            command, msg.author.name, msg.author.id, msg.channel_id
        );

        if let Err(e) = self.dispatch(platform, msg, command).await {
            error!("Error handling message {}: {:#}", msg.id, e);
            if let Err(send_err) = platform
                .send_message(msg.channel_id, &format!("Error: {}", e))
                .await
            {
                error!("Failed to report error: {:#}", send_err);
            }
        }
    }

    async fn dispatch(
        &self,
        platform: &dyn Platform,
        msg: &InboundMessage,
        command: Command,
    ) -> Result<()> {
        match command {
            Command::StartPoll => poll::start_poll(platform, msg).await,
            Command::Unrecognized(token) => {
                debug!("No handler for +{}", token);
                Ok(())
            }
            Command::Inspire => {
                let quote = self.quotes.fetch().await;
                platform.send_message(msg.channel_id, &quote).await
            }
            Command::Help => {
                platform
                    .send_message(msg.channel_id, &handlers::help_text())
                    .await
            }
            Command::MoveMembers => {
                if let Some(report) = move_members::move_members(platform, msg).await? {
                    info!(
                        "Move finished: {} moved, {} failed",
                        report.moved.len(),
                        report.failed.len()
                    );
                }
                Ok(())
            }
        }
    }

    pub async fn handle_member_join(&self, platform: &dyn Platform, join: &MemberJoin) {
        let channel_id = self.config.read().await.welcome_channel_id();
        welcome::welcome(platform, channel_id, join).await;
    }

    pub fn ready(&self, name: &str, guilds: usize) {
        info!("Client is online as {} ({} guild(s))", name, guilds);
        if self.log.capacity() == 0 {
            warn!("Message log is unbounded; entries are written only on shutdown");
        }
    }
}
