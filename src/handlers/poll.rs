use anyhow::Result;
use tracing::{info, warn};

use crate::platform::{InboundMessage, Platform};

const DELIMITER: &str = " !";
const PREFIX_CHARS: usize = 5;

pub const USAGE: &str = "Usage: +poll !Question !Option1 !Option2 ...";

/// A poll parsed from a single message; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDraft {
    pub question: String,
    pub options: Vec<String>,
}

impl PollDraft {
    /// Parse `+poll !Question !A !B`. Text before the first ` !` is discarded;
    /// returns None when no question segment follows it.
    pub fn parse(text: &str) -> Option<Self> {
        let body: String = text.chars().skip(PREFIX_CHARS).collect();
        let mut segments = body.split(DELIMITER).skip(1);
        let question = segments.next()?.to_string();
        let options = segments.map(str::to_string).collect();
        Some(Self { question, options })
    }

    pub fn render(&self) -> String {
        let mut msg = format!("@here\n-- POLL --\n{}", self.question);
        for (i, option) in self.options.iter().enumerate() {
            msg.push_str(&format!("\nVotes for {} [{}]", option, i));
        }
        msg
    }
}

/// Replace the command message with a poll announcement.
pub async fn start_poll(platform: &dyn Platform, msg: &InboundMessage) -> Result<()> {
    let Some(poll) = PollDraft::parse(&msg.content) else {
        platform.send_message(msg.channel_id, USAGE).await?;
        return Ok(());
    };

    if let Err(e) = platform.delete_message(msg.channel_id, msg.id).await {
        warn!("Failed to delete poll command {}: {:#}", msg.id, e);
    }

    info!(
        "Starting poll in channel {} with {} option(s)",
        msg.channel_id,
        poll.options.len()
    );
    platform.send_message(msg.channel_id, &poll.render()).await
}
