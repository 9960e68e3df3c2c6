use anyhow::Result;
use tracing::{info, warn};

use crate::platform::{member_names, InboundMessage, MemberRef, Platform};

/// Outcome of a move command whose preconditions passed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MoveReport {
    pub moved: Vec<MemberRef>,
    pub failed: Vec<(MemberRef, String)>,
}

/// `!haru-move @a @b #voice`: move every mentioned member into the first
/// mentioned channel. Precondition failures reply and return `Ok(None)`.
pub async fn move_members(
    platform: &dyn Platform,
    msg: &InboundMessage,
) -> Result<Option<MoveReport>> {
    let Some(guild_id) = msg.guild_id else {
        platform
            .send_message(msg.channel_id, "This command only works in a server.")
            .await?;
        return Ok(None);
    };

    let names = member_names(&msg.mentions);

    let Some(&channel_id) = msg.channel_mentions.first() else {
        let reply = if names.is_empty() {
            "No voice channel was specified.".to_string()
        } else {
            format!("{}: no voice channel was specified.", names)
        };
        platform.send_message(msg.channel_id, &reply).await?;
        return Ok(None);
    };

    if msg.mentions.is_empty() {
        platform
            .send_message(msg.channel_id, "No members were specified.")
            .await?;
        return Ok(None);
    }

    let channel = match platform.fetch_channel(channel_id).await {
        Ok(channel) if channel.is_voice() => channel,
        Ok(channel) => {
            let reply = format!(
                "Cannot move {} to {}: it is not a voice channel.",
                names, channel.name
            );
            platform.send_message(msg.channel_id, &reply).await?;
            return Ok(None);
        }
        Err(e) => {
            warn!("Failed to fetch channel {}: {:#}", channel_id, e);
            let reply = format!(
                "Cannot move {} to <#{}>: that channel could not be found.",
                names, channel_id
            );
            platform.send_message(msg.channel_id, &reply).await?;
            return Ok(None);
        }
    };

    let mut report = MoveReport::default();
    for mentioned in &msg.mentions {
        let result = async {
            let member = platform.fetch_member(guild_id, mentioned.id).await?;
            platform.move_member(guild_id, member.id, channel.id).await?;
            anyhow::Ok(member)
        }
        .await;

        match result {
            Ok(member) => {
                info!("Moved {} to {}", member.name, channel.name);
                report.moved.push(member);
            }
            Err(e) => {
                warn!("Failed to move {} to {}: {:#}", mentioned.name, channel.name, e);
                let reply = format!("Failed to move {}: {}", mentioned.name, e);
                if let Err(send_err) = platform.send_message(msg.channel_id, &reply).await {
                    warn!("Failed to report move failure: {:#}", send_err);
                }
                report.failed.push((mentioned.clone(), e.to_string()));
            }
        }
    }

    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::{inbound, member, RecordingPlatform};
    use crate::platform::ChannelKind;

    const VOICE: u64 = 77;
    const TEXT: u64 = 78;

    fn platform() -> RecordingPlatform {
        RecordingPlatform::new()
            .with_channel(VOICE, "Lounge", ChannelKind::Voice)
            .with_channel(TEXT, "general", ChannelKind::Text)
            .with_member(member(1, "alice"))
            .with_member(member(2, "bob"))
    }

    fn move_msg(members: &[MemberRef], channels: &[u64]) -> InboundMessage {
        let mut msg = inbound("!haru-move");
        msg.mentions = members.to_vec();
        msg.channel_mentions = channels.to_vec();
        msg
    }

    #[tokio::test]
    async fn test_no_channel_names_members_and_moves_nobody() {
        let platform = platform();
        let msg = move_msg(&[member(1, "alice"), member(2, "bob")], &[]);

        let report = move_members(&platform, &msg).await.unwrap();

        assert_eq!(report, None);
        assert_eq!(
            platform.sent(),
            vec!["alice, bob: no voice channel was specified."]
        );
        assert!(platform.moves().is_empty());
    }

    #[tokio::test]
    async fn test_no_members() {
        let platform = platform();
        let msg = move_msg(&[], &[VOICE]);

        assert_eq!(move_members(&platform, &msg).await.unwrap(), None);
        assert_eq!(platform.sent(), vec!["No members were specified."]);
        assert!(platform.moves().is_empty());
    }

    #[tokio::test]
    async fn test_channel_check_comes_before_member_check() {
        let platform = platform();
        let msg = move_msg(&[], &[]);

        move_members(&platform, &msg).await.unwrap();
        assert_eq!(platform.sent(), vec!["No voice channel was specified."]);
    }

    #[tokio::test]
    async fn test_text_channel_is_rejected() {
        let platform = platform();
        let msg = move_msg(&[member(1, "alice")], &[TEXT]);

        assert_eq!(move_members(&platform, &msg).await.unwrap(), None);
        assert_eq!(
            platform.sent(),
            vec!["Cannot move alice to general: it is not a voice channel."]
        );
        assert!(platform.moves().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_channel_is_rejected() {
        let platform = platform();
        let msg = move_msg(&[member(1, "alice")], &[12345]);

        assert_eq!(move_members(&platform, &msg).await.unwrap(), None);
        assert!(platform.moves().is_empty());
        assert_eq!(platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_moves_in_mention_order() {
        let platform = platform();
        let msg = move_msg(&[member(2, "bob"), member(1, "alice")], &[VOICE, TEXT]);

        let report = move_members(&platform, &msg).await.unwrap().unwrap();

        assert_eq!(platform.moves(), vec![(2, VOICE), (1, VOICE)]);
        assert_eq!(report.moved, vec![member(2, "bob"), member(1, "alice")]);
        assert!(report.failed.is_empty());
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_move_does_not_stop_the_next() {
        let platform = platform().failing_move_for(1);
        let msg = move_msg(&[member(1, "alice"), member(2, "bob")], &[VOICE]);

        let report = move_members(&platform, &msg).await.unwrap().unwrap();

        assert_eq!(platform.moves(), vec![(1, VOICE), (2, VOICE)]);
        assert_eq!(report.moved, vec![member(2, "bob")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, member(1, "alice"));
        assert_eq!(
            platform.sent(),
            vec!["Failed to move alice: member is not connected to voice"]
        );
    }

    #[tokio::test]
    async fn test_non_member_is_reported_per_member() {
        let platform = platform();
        let msg = move_msg(&[member(3, "carol"), member(2, "bob")], &[VOICE]);

        let report = move_members(&platform, &msg).await.unwrap().unwrap();

        assert_eq!(platform.moves(), vec![(2, VOICE)]);
        assert_eq!(report.failed[0].0.name, "carol");
    }

    #[tokio::test]
    async fn test_direct_message_is_rejected() {
        let platform = platform();
        let mut msg = move_msg(&[member(1, "alice")], &[VOICE]);
        msg.guild_id = None;

        assert_eq!(move_members(&platform, &msg).await.unwrap(), None);
        assert_eq!(platform.sent(), vec!["This command only works in a server."]);
    }
}
