use crate::{event::*, plugin::*};
use anyhow::Result;

pub struct Hello;

#[serenity::async_trait]
impl Plugin for Hello {
    fn name(&self) -> &'static str {
        "hello"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_line(ctx, self.name(), "", "say hello").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let greeting = format!("Hello, {}!", msg.author.name);
        msg.channel_id.say(ctx.http, greeting).await?;
        Ok(EventHandled::Yes)
    }
}
