use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ChannelInfo, ChannelKind, InboundMessage, MemberRef, Platform};

/// A side effect the bot asked the platform for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send { channel_id: u64, text: String },
    Delete { channel_id: u64, message_id: u64 },
    Move { guild_id: u64, user_id: u64, channel_id: u64 },
}

/// In-memory platform that records every call.
#[derive(Default)]
pub struct RecordingPlatform {
    pub actions: Mutex<Vec<Action>>,
    pub channels: HashMap<u64, ChannelInfo>,
    pub members: HashMap<u64, MemberRef>,
    pub failing_moves: HashSet<u64>,
    pub fail_deletes: bool,
    pub fail_sends: bool,
    /// Reject only sends whose text contains this.
    pub fail_sends_containing: Option<String>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, id: u64, name: &str, kind: ChannelKind) -> Self {
        self.channels.insert(
            id,
            ChannelInfo {
                id,
                name: name.to_string(),
                kind,
            },
        );
        self
    }

    pub fn with_member(mut self, member: MemberRef) -> Self {
        self.members.insert(member.id, member);
        self
    }

    pub fn failing_move_for(mut self, user_id: u64) -> Self {
        self.failing_moves.insert(user_id);
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn moves(&self) -> Vec<(u64, u64)> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Move {
                    user_id,
                    channel_id,
                    ..
                } => Some((user_id, channel_id)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn send_message(&self, channel_id: u64, text: &str) -> Result<()> {
        let rejected = self.fail_sends
            || self
                .fail_sends_containing
                .as_deref()
                .is_some_and(|pattern| text.contains(pattern));
        if rejected {
            return Err(anyhow!("send rejected"));
        }
        self.push(Action::Send {
            channel_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<()> {
        if self.fail_deletes {
            return Err(anyhow!("missing permissions"));
        }
        self.push(Action::Delete {
            channel_id,
            message_id,
        });
        Ok(())
    }

    async fn fetch_member(&self, _guild_id: u64, user_id: u64) -> Result<MemberRef> {
        self.members
            .get(&user_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown member {}", user_id))
    }

    async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelInfo> {
        self.channels
            .get(&channel_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown channel {}", channel_id))
    }

    async fn move_member(&self, guild_id: u64, user_id: u64, channel_id: u64) -> Result<()> {
        // Record the attempt even when it fails so tests can check ordering.
        self.push(Action::Move {
            guild_id,
            user_id,
            channel_id,
        });
        if self.failing_moves.contains(&user_id) {
            return Err(anyhow!("member is not connected to voice"));
        }
        Ok(())
    }
}

pub fn member(id: u64, name: &str) -> MemberRef {
    MemberRef {
        id,
        name: name.to_string(),
    }
}

/// A guild text message from a human author.
pub fn inbound(content: &str) -> InboundMessage {
    InboundMessage {
        id: 900,
        channel_id: 10,
        guild_id: Some(1),
        author: member(500, "haru"),
        author_is_bot: false,
        content: content.to_string(),
        created_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        mentions: Vec::new(),
        channel_mentions: Vec::new(),
    }
}
