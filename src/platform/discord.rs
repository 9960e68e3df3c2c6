use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::builder::{CreateMessage, EditMember};
use serenity::client::{Client, Context, EventHandler};
use serenity::http::Http;
use serenity::model::channel::{Channel, ChannelType, Message};
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::model::guild::Member;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use tracing::{error, info};

use crate::bot::Bot;
use crate::platform::{ChannelInfo, ChannelKind, InboundMessage, MemberJoin, MemberRef, Platform};

/// Discord REST calls made on behalf of the bot.
pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Platform for DiscordPlatform {
    async fn send_message(&self, channel_id: u64, text: &str) -> Result<()> {
        ChannelId::new(channel_id)
            .send_message(&*self.http, CreateMessage::new().content(text))
            .await
            .with_context(|| format!("Failed to send message to channel {}", channel_id))?;
        Ok(())
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<()> {
        ChannelId::new(channel_id)
            .delete_message(&*self.http, MessageId::new(message_id))
            .await
            .with_context(|| format!("Failed to delete message {}", message_id))
    }

    async fn fetch_member(&self, guild_id: u64, user_id: u64) -> Result<MemberRef> {
        let member = GuildId::new(guild_id)
            .member(&*self.http, UserId::new(user_id))
            .await
            .with_context(|| format!("Member {} is not in this server", user_id))?;
        Ok(MemberRef {
            id: member.user.id.get(),
            name: member.display_name().to_string(),
        })
    }

    async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelInfo> {
        let channel = ChannelId::new(channel_id)
            .to_channel(&*self.http)
            .await
            .with_context(|| format!("Failed to fetch channel {}", channel_id))?;

        let info = match channel {
            Channel::Guild(gc) => ChannelInfo {
                id: channel_id,
                name: gc.name.clone(),
                kind: match gc.kind {
                    ChannelType::Voice | ChannelType::Stage => ChannelKind::Voice,
                    ChannelType::Text | ChannelType::News => ChannelKind::Text,
                    _ => ChannelKind::Other,
                },
            },
            _ => ChannelInfo {
                id: channel_id,
                name: format!("<#{}>", channel_id),
                kind: ChannelKind::Other,
            },
        };
        Ok(info)
    }

    async fn move_member(&self, guild_id: u64, user_id: u64, channel_id: u64) -> Result<()> {
        let edit = EditMember::new().voice_channel(ChannelId::new(channel_id));
        GuildId::new(guild_id)
            .edit_member(&*self.http, UserId::new(user_id), edit)
            .await
            .with_context(|| format!("Failed to move user {} to channel {}", user_id, channel_id))?;
        Ok(())
    }
}

/// Ids of `<@id>`/`<@!id>` (sigil `@`) or `<#id>` (sigil `#`) mentions in the
/// order they appear, first occurrence only.
fn scan_mentions(content: &str, sigil: char) -> Vec<u64> {
    let mut ids = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find('<') {
        rest = &rest[start + 1..];
        let Some(body) = rest.strip_prefix(sigil) else {
            continue;
        };
        let body = if sigil == '@' {
            body.strip_prefix('!').unwrap_or(body)
        } else {
            body
        };
        let Some(end) = body.find('>') else {
            break;
        };
        if let Ok(id) = body[..end].parse::<u64>() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

fn to_inbound(msg: &Message) -> InboundMessage {
    // Discord does not promise `mentions` in text order; rebuild it from content.
    let mentions = scan_mentions(&msg.content, '@')
        .into_iter()
        .filter_map(|id| {
            msg.mentions
                .iter()
                .find(|u| u.id.get() == id)
                .map(|u| MemberRef {
                    id,
                    name: u.global_name.clone().unwrap_or_else(|| u.name.clone()),
                })
        })
        .collect();

    InboundMessage {
        id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        guild_id: msg.guild_id.map(|g| g.get()),
        author: MemberRef {
            id: msg.author.id.get(),
            name: msg.author.name.clone(),
        },
        author_is_bot: msg.author.bot,
        content: msg.content.clone(),
        created_at: DateTime::from_timestamp(msg.timestamp.unix_timestamp(), 0)
            .unwrap_or_else(Utc::now),
        mentions,
        channel_mentions: scan_mentions(&msg.content, '#'),
    }
}

/// Gateway event handler; forwards events into the bot.
struct Handler {
    bot: Arc<Bot>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot.ready(&ready.user.name, ready.guilds.len());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let platform: Arc<dyn Platform> = Arc::new(DiscordPlatform::new(ctx.http.clone()));
        self.bot.enqueue(platform, to_inbound(&msg)).await;
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        let join = MemberJoin {
            guild_id: new_member.guild_id.get(),
            guild_name: new_member
                .guild_id
                .name(&ctx.cache)
                .unwrap_or_else(|| "the server".to_string()),
            member: MemberRef {
                id: new_member.user.id.get(),
                name: new_member.display_name().to_string(),
            },
        };
        let platform = DiscordPlatform::new(ctx.http.clone());
        self.bot.handle_member_join(&platform, &join).await;
    }
}

/// Connect to the gateway and process events until Ctrl-C.
pub async fn run(bot: Arc<Bot>, token: &str) -> Result<()> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(token, intents)
        .event_handler(Handler { bot })
        .await
        .context("Failed to create Discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown requested");
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord client...");
    client.start().await.context("Discord client error")?;
    Ok(())
}
