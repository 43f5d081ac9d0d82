use crate::{event::*, plugin::*};
use anyhow::Result;

/// Answers any prefixed word that no other plugin claimed.
pub struct UnknownCommand;

#[serenity::async_trait]
impl Plugin for UnknownCommand {
    fn name(&self) -> &'static str {
        "unknown_command"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Message(msg) = event else {
            return Ok(EventHandled::No);
        };

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        if command_word(&msg.content, &prefix).is_none() {
            return Ok(EventHandled::No);
        }

        let reply = format!(
            "Unknown command! Use `{}help` for a list of commands.",
            prefix
        );
        msg.channel_id.say(ctx.http, reply).await?;
        Ok(EventHandled::Yes)
    }
}
