use crate::{
    event::*,
    gemini::{split_message, GenerateRequest, MESSAGE_CHUNK_CHARS},
    plugin::*,
};
use anyhow::Result;

/// Passes a question through to the text-generation API.
pub struct Ask;

#[serenity::async_trait]
impl Plugin for Ask {
    fn name(&self) -> &'static str {
        "ask"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_line(ctx, self.name(), " <question>", "ask the AI a question").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let question = args.join(" ");
        if question.is_empty() {
            let prefix = ctx.cfg.read().await.general.command_prefix.clone();
            let reply = format!("❌ Usage: `{}ask <your question>`", prefix);
            msg.channel_id.say(ctx.http, reply).await?;
            return Ok(EventHandled::Yes);
        }

        let Some(settings) = ctx.cfg.read().await.ask.clone() else {
            msg.channel_id
                .say(ctx.http, "```Error: Gemini API key not configured on the server.```")
                .await?;
            return Ok(EventHandled::Yes);
        };

        let typing = msg.channel_id.start_typing(ctx.http);
        let answer = GenerateRequest::new(&question).post(&settings).await;
        typing.stop();

        match answer {
            Ok(Some(answer)) => {
                for chunk in split_message(&answer, MESSAGE_CHUNK_CHARS) {
                    msg.channel_id.say(ctx.http, chunk).await?;
                }
            }
            Ok(None) => {
                msg.channel_id
                    .say(ctx.http, "I couldn't generate a response for that question.")
                    .await?;
            }
            Err(e) => {
                let reply = format!("```Failed to get response: {}```", e);
                msg.channel_id.say(ctx.http, reply).await?;
            }
        }
        Ok(EventHandled::Yes)
    }
}
