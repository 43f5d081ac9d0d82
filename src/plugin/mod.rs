use crate::event::{Event, EventHandled};
use anyhow::Result;

pub use crate::context::Context;

mod add;
mod ask;
mod birthday;
mod debug;
mod hello;
mod help;
mod ignore_bots;
mod live_now;
mod ping;
mod reload;
mod stream_link;
mod streamers;
mod timezone;
mod unknown_command;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  For commands, also the command word.
    fn name(&self) -> &'static str;
    /// Help message line.  None if no help message
    async fn usage(&self, ctx: &Context) -> Option<String>;
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled>;
}

/// Ordered list of available plugins
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        // Core bot operations
        Box::new(debug::Debug),
        Box::new(ignore_bots::IgnoreBots),
        Box::new(help::Help),
        Box::new(reload::Reload),
        // Small talk
        Box::new(ping::Ping),
        Box::new(hello::Hello),
        Box::new(add::Add),
        // Member records
        Box::new(birthday::SetBirthday),
        Box::new(birthday::Birthday),
        Box::new(timezone::SetTimezone),
        Box::new(timezone::Time),
        // Streaming
        Box::new(streamers::Streamers),
        Box::new(stream_link::SetTwitch),
        Box::new(stream_link::UnsetTwitch),
        Box::new(stream_link::StreamLinks),
        Box::new(live_now::LiveNow),
        Box::new(ask::Ask),
        // Catches any prefixed word no plugin above claimed.
        // Keep last.
        Box::new(unknown_command::UnknownCommand),
    ]
}

/// `{prefix}{name}{args} - {description}`, the format of every help line.
pub async fn usage_line(ctx: &Context<'_>, name: &str, args: &str, description: &str) -> String {
    let cfg = ctx.cfg.read().await;
    let prefix = &cfg.general.command_prefix;
    format!("{}{}{} - {}", prefix, name, args, description)
}
