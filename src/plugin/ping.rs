use crate::{event::*, plugin::*};
use anyhow::Result;

pub struct Ping;

#[serenity::async_trait]
impl Plugin for Ping {
    fn name(&self) -> &'static str {
        "ping"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_line(ctx, self.name(), "", "check that the bot is alive").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        msg.channel_id.say(ctx.http, "Pong!").await?;
        Ok(EventHandled::Yes)
    }
}
