use crate::{event::*, helper::MessageHelper, log_internal, plugin::*};
use anyhow::Result;

/// Re-reads the config file.  The background loops keep the settings they started with.
pub struct Reload;

#[serenity::async_trait]
impl Plugin for Reload {
    fn name(&self) -> &'static str {
        "reload"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_line(ctx, self.name(), "", "reload config (bot owner only)").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        if !msg.is_from_owner(ctx).await {
            msg.reply(ctx.cache_http, "❌ Only bot owners can reload the configuration.")
                .await?;
            return Ok(EventHandled::Yes);
        }

        ctx.cfg.write().await.reload().await?;
        log_internal!("Configuration reloaded by {}", msg.author.name);
        msg.reply(ctx.cache_http, "Configuration reloaded successfully")
            .await?;
        Ok(EventHandled::Yes)
    }
}
