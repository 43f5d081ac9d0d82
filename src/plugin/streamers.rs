use crate::{
    event::*,
    live::{GuildActuator, SerenityActuator},
    plugin::*,
};
use anyhow::Result;
use std::sync::Arc;

/// Lists members holding the streamer role.
pub struct Streamers;

#[serenity::async_trait]
impl Plugin for Streamers {
    fn name(&self) -> &'static str {
        "streamers"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_line(ctx, self.name(), "", "list members with the streamer role").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let Some(guild_id) = msg.guild_id else {
            msg.channel_id
                .say(ctx.http, "```Guild Not Found!```")
                .await?;
            return Ok(EventHandled::Yes);
        };

        let typing = msg.channel_id.start_typing(ctx.http);
        let role_name = ctx.cfg.read().await.general.streamer_role_name.clone();
        let guild = SerenityActuator::new(Arc::clone(ctx.http));
        let streamers = match guild.find_role(guild_id, &role_name).await {
            Some(role_id) => guild.role_holders(guild_id, role_id).await?,
            None => Vec::new(),
        };
        typing.stop();

        let reply = if streamers.is_empty() {
            "```No members with Streamer role found```".to_owned()
        } else {
            let list = streamers
                .iter()
                .map(|member| format!("{} (ID: {})", member.display_name, member.id))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "**Streamer Role Members ({}):**\n```{}```",
                streamers.len(),
                list
            )
        };
        msg.channel_id.say(ctx.http, reply).await?;
        Ok(EventHandled::Yes)
    }
}
