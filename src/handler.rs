use crate::{
    birthday::BirthdayJob,
    config::Config,
    context::Context,
    event::Event,
    live::{LiveSync, LiveSyncSettings, SerenityActuator},
    log_error, log_internal,
    persistent_state::PersistentState,
    scheduler::Scheduler,
    twitch::TwitchClient,
};
use serenity::all::{ChannelId, Http, Message, Ready};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
    time::Duration,
};
use tokio::sync::{Mutex, RwLock};

/// Discord event handler
pub struct Handler {
    cfg: RwLock<Config>,
    pstate: Arc<RwLock<PersistentState>>,
    live_sync: OnceLock<Arc<LiveSync>>,
    loops_started: AtomicBool,
    schedulers: Mutex<Vec<Scheduler>>,
}

impl<'a> Handler {
    pub fn new(cfg: Config, pstate: PersistentState) -> Self {
        Self {
            cfg: RwLock::new(cfg),
            pstate: Arc::new(RwLock::new(pstate)),
            live_sync: OnceLock::new(),
            loops_started: AtomicBool::new(false),
            schedulers: Mutex::new(Vec::new()),
        }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            pstate: &self.pstate,
            live_sync: self.live_sync.get().map(Arc::as_ref),
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }

    /// Start the background loops.  Ready fires again on every reconnect; only the first one
    /// starts anything.
    async fn start_loops(&self, http: &Arc<Http>) {
        if self.loops_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let cfg = self.cfg.read().await;
        let mut schedulers = self.schedulers.lock().await;

        match LiveSyncSettings::from_config(&cfg) {
            Ok(settings) => {
                log_internal!(
                    "Live sync: guild {}, role \"{}\", {} notification channel(s)",
                    settings.guild_id,
                    settings.role_name,
                    settings.notification_channels.len()
                );
                let platform = TwitchClient::new(
                    &settings.twitch_client_id,
                    &settings.twitch_client_secret,
                    &settings.twitch_auth_url,
                    &settings.twitch_api_url,
                );
                let interval = settings.interval;
                let engine = Arc::new(LiveSync::new(
                    settings,
                    Box::new(platform),
                    Box::new(SerenityActuator::new(Arc::clone(http))),
                    Box::new(Arc::clone(&self.pstate)),
                ));
                // Only ever set here, behind `loops_started`
                let _ = self.live_sync.set(Arc::clone(&engine));
                schedulers.push(Scheduler::start(engine, interval));
            }
            Err(e) => log_error!("Live sync will not start: {}", e),
        }

        match &cfg.birthday {
            Some(birthday) => {
                let job = BirthdayJob::new(
                    Arc::clone(http),
                    Arc::clone(&self.pstate),
                    ChannelId::new(birthday.channel_id),
                );
                let period = Duration::from_secs(birthday.check_interval_minutes.max(1) * 60);
                schedulers.push(Scheduler::start(Arc::new(job), period));
            }
            None => log_internal!("No [birthday] configuration, birthday announcements disabled"),
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        Event::Ready(ready).handle(self.ctx(&discord_ctx)).await;
        self.start_loops(&discord_ctx.http).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        Event::Message(msg).handle(self.ctx(&discord_ctx)).await;
    }
}
