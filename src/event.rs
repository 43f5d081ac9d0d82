//! Serenity's callbacks are translated into a distinct Event enum so that the plugin chain can
//! treat every kind of event uniformly.

use crate::{context::Context, log_error};
use serenity::all::{Message, Ready};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message(Message),
}

impl Event {
    // When an event occurs, iterate over all the plugins to see if any can/should handle it.
    pub async fn handle(self, ctx: Context<'_>) {
        for plugin in crate::plugin::plugins() {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => {
                    log_error!("Error in plugin {}: {}", plugin.name(), err);
                    if let Event::Message(msg) = &self {
                        let reply = "There was an error trying to execute that command!";
                        if let Err(err) = msg.channel_id.say(ctx.http, reply).await {
                            log_error!("Could not report plugin error: {}", err);
                        }
                    }
                    return;
                }
            }
        }
    }

    // Check if a message should be interpreted as a bot command, e.g. `!cmd foo bar baz`.
    //
    // Returns the message and the whitespace separated arguments after the command.
    pub async fn is_bot_cmd<'a>(
        &'a self,
        ctx: &Context<'_>,
        cmd: &str,
    ) -> Option<(&'a Message, Vec<&'a str>)> {
        let Event::Message(msg) = self else {
            return None;
        };

        let cfg = ctx.cfg.read().await;
        let prefix = &cfg.general.command_prefix;
        if command_word(&msg.content, prefix)? != cmd.to_lowercase() {
            return None;
        }

        Some((msg, msg.content.split_whitespace().skip(1).collect()))
    }
}

pub enum EventHandled {
    Yes,
    No,
}

/// The command word of `content` if it starts with `prefix`, lowercased.
pub fn command_word(content: &str, prefix: &str) -> Option<String> {
    let name = content.split_whitespace().next()?.strip_prefix(prefix)?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_word_requires_prefix() {
        assert_eq!(command_word("!Ping", "!").as_deref(), Some("ping"));
        assert_eq!(command_word("  !time <@1>", "!").as_deref(), Some("time"));
        assert_eq!(command_word("ping", "!"), None);
        assert_eq!(command_word("! ping", "!"), None);
        assert_eq!(command_word("", "!"), None);
        assert_eq!(command_word(";Time <@1>", ";").as_deref(), Some("time"));
    }
}
