use crate::{event::*, helper::UserHelper, plugin::*};
use anyhow::Result;

/// Who the live-sync loop currently believes is streaming.
pub struct LiveNow;

#[serenity::async_trait]
impl Plugin for LiveNow {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        ctx.live_sync?;
        Some(usage_line(ctx, self.name(), "", "list members who are live right now").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let Some(live_sync) = ctx.live_sync else {
            msg.reply(ctx.cache_http, "Live stream tracking is not running.")
                .await?;
            return Ok(EventHandled::Yes);
        };

        let mut names = Vec::new();
        for user_id in live_sync.live_set().await {
            let name = match user_id.to_user(ctx.cache_http).await {
                Ok(user) => user.nick_in_guild(ctx, msg.guild_id).await,
                Err(_) => format!("<unknown-user-{}>", user_id),
            };
            names.push(name);
        }

        let reply = if names.is_empty() {
            "Nobody is live right now.".to_owned()
        } else {
            format!("🔴 Live now: {}", names.join(", "))
        };
        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}
