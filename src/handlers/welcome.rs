use tracing::{debug, info, warn};

use crate::platform::{MemberJoin, Platform};

pub fn greeting(join: &MemberJoin) -> String {
    format!(
        "Welcome to {}, {}!",
        join.guild_name,
        join.member.mention()
    )
}

/// Greet a new member in the configured channel. Failures are logged only.
pub async fn welcome(platform: &dyn Platform, channel_id: Option<u64>, join: &MemberJoin) {
    let Some(channel_id) = channel_id else {
        debug!(
            "No welcome channel configured; not greeting {}",
            join.member.name
        );
        return;
    };

    match platform.send_message(channel_id, &greeting(join)).await {
        Ok(()) => info!(
            "Welcomed {} to {} ({})",
            join.member.name, join.guild_name, join.guild_id
        ),
        Err(e) => warn!("Failed to welcome {}: {:#}", join.member.name, e),
    }
}
