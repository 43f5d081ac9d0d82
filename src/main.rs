mod birthday;
mod config;
mod context;
mod event;
mod gemini;
mod handler;
mod helper;
mod live;
mod logging;
mod persistent_state;
mod plugin;
mod scheduler;
mod twitch;

use serenity::{all::GatewayIntents, Client};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    let token = cfg.general.discord_token.clone();
    let pstate = crate::persistent_state::PersistentState::load().await?;
    let handler = handler::Handler::new(cfg, pstate);

    // Things we want discord to tell us about.  Member events are needed to enumerate role
    // holders and resolve members for the live role.
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    Client::builder(&token, intents)
        .event_handler(handler)
        .await?
        .start()
        .await
        .map_err(Into::into)
}
