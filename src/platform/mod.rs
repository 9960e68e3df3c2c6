pub mod discord;
#[cfg(test)]
pub mod testing;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::message_log::LoggedMessage;

/// A guild member or user, as far as the bot cares about them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub id: u64,
    pub name: String,
}

impl MemberRef {
    /// Platform mention markup, e.g. `<@123>`.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    /// Voice and stage channels; members can be moved into these.
    Voice,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u64,
    pub name: String,
    pub kind: ChannelKind,
}

impl ChannelInfo {
    pub fn is_voice(&self) -> bool {
        self.kind == ChannelKind::Voice
    }
}

/// A message received from the platform
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: u64,
    pub channel_id: u64,
    /// None for direct messages
    pub guild_id: Option<u64>,
    pub author: MemberRef,
    pub author_is_bot: bool,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Mentioned users, in mention order
    pub mentions: Vec<MemberRef>,
    /// Mentioned channel ids, in mention order
    pub channel_mentions: Vec<u64>,
}

impl InboundMessage {
    pub fn to_logged(&self) -> LoggedMessage {
        LoggedMessage {
            id: self.id,
            author: self.author.id,
            content: self.content.clone(),
            created_at: self.created_at,
        }
    }
}

/// A member joining a guild
#[derive(Debug, Clone)]
pub struct MemberJoin {
    pub guild_id: u64,
    pub guild_name: String,
    pub member: MemberRef,
}

/// Everything the bot asks of the chat platform.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn send_message(&self, channel_id: u64, text: &str) -> Result<()>;

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<()>;

    async fn fetch_member(&self, guild_id: u64, user_id: u64) -> Result<MemberRef>;

    async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelInfo>;

    /// Move a member who is connected to voice into `channel_id`.
    async fn move_member(&self, guild_id: u64, user_id: u64, channel_id: u64) -> Result<()>;
}

/// Comma-separated display names, for replies that name several members.
pub fn member_names(members: &[MemberRef]) -> String {
    members
        .iter()
        .map(|m| m.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
