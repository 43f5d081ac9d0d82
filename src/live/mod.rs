//! Mirrors "is this member live on Twitch" into a managed guild role plus a go-live
//! announcement.
//!
//! The [`LiveSync`] engine owns the live set.  Each pass reads the stored links, asks the
//! [`StreamPlatform`] who is broadcasting, and converges the guild through a
//! [`GuildActuator`].

mod actuator;
mod engine;
mod notification;

pub use actuator::{ActuatorError, GuildActuator, LiveMember, SerenityActuator};
pub use engine::{FailedAction, LiveSync, PassFailure, PassOutcome, PassReport, ResetReason};
pub use notification::{LiveNotification, NotificationField};

use crate::{config::Config, persistent_state::PersistentState};
use serenity::all::{ChannelId, GuildId, UserId};
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::RwLock;

/// A member's link to a streaming-platform login, as read from the link store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveLink {
    pub member_id: UserId,
    pub platform_login: String,
}

/// A user that exists on the streaming platform.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub struct PlatformUser {
    #[serde(rename = "id")]
    pub platform_user_id: String,
    pub login: String,
}

/// A stream that is currently broadcasting.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub struct LiveStream {
    #[serde(rename = "user_id")]
    pub platform_user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "game_name", default)]
    pub category: String,
    pub viewer_count: Option<u64>,
    #[serde(rename = "thumbnail_url")]
    pub thumbnail_url_template: Option<String>,
}

#[derive(Debug)]
pub enum PlatformError {
    /// The client-credentials grant failed.
    Auth(String),
    /// A platform call returned a non-success status or could not be completed.
    Upstream(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::Auth(msg) => write!(f, "platform auth error: {msg}"),
            PlatformError::Upstream(msg) => write!(f, "platform upstream error: {msg}"),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Read side of the streaming platform that a pass needs.
#[serenity::async_trait]
pub trait StreamPlatform: Send + Sync {
    /// Users for the given logins.  Unknown logins are left out.
    async fn resolve_users(&self, logins: &[String]) -> Result<Vec<PlatformUser>, PlatformError>;

    /// Streams currently broadcasting among `platform_user_ids`.  Failed batches are left out
    /// rather than failing the call.
    async fn query_live_streams(
        &self,
        platform_user_ids: &[String],
    ) -> Result<Vec<LiveStream>, PlatformError>;
}

/// Where a pass reads links from.
#[serenity::async_trait]
pub trait LinkStore: Send + Sync {
    async fn live_links(&self) -> anyhow::Result<Vec<LiveLink>>;
}

#[serenity::async_trait]
impl LinkStore for Arc<RwLock<PersistentState>> {
    async fn live_links(&self) -> anyhow::Result<Vec<LiveLink>> {
        Ok(self
            .read()
            .await
            .stream_links
            .all()
            .iter()
            .map(|link| LiveLink {
                member_id: link.user_id,
                platform_login: link.login.clone(),
            })
            .collect())
    }
}

/// Required configuration is missing or unusable.  The live loop does not start.
#[derive(Debug, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Validated settings for the live sync loop.
#[derive(Clone, Debug)]
pub struct LiveSyncSettings {
    pub guild_id: GuildId,
    pub role_name: String,
    /// Destinations for go-live announcements, in configuration order.
    pub notification_channels: Vec<ChannelId>,
    pub interval: Duration,
    pub twitch_client_id: String,
    pub twitch_client_secret: String,
    pub twitch_auth_url: String,
    pub twitch_api_url: String,
}

impl LiveSyncSettings {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let live = cfg
            .live
            .as_ref()
            .ok_or_else(|| ConfigError("missing [live] section".to_owned()))?;
        let guild_id = live
            .guild_id
            .filter(|id| *id != 0)
            .ok_or_else(|| ConfigError("missing live.guild_id".to_owned()))?;
        let twitch = cfg
            .twitch
            .as_ref()
            .ok_or_else(|| ConfigError("missing [twitch] section".to_owned()))?;
        if twitch.client_id.trim().is_empty() || twitch.client_secret.trim().is_empty() {
            return Err(ConfigError(
                "twitch.client_id and twitch.client_secret must both be set".to_owned(),
            ));
        }
        if live.interval_minutes == 0 {
            return Err(ConfigError(
                "live.interval_minutes must be at least 1".to_owned(),
            ));
        }

        let mut notification_channels = Vec::new();
        for id in [
            live.notification_channel_id,
            live.additional_notification_channel_id,
        ]
        .into_iter()
        .flatten()
        .filter(|id| *id != 0)
        {
            let channel_id = ChannelId::new(id);
            if !notification_channels.contains(&channel_id) {
                notification_channels.push(channel_id);
            }
        }

        Ok(Self {
            guild_id: GuildId::new(guild_id),
            role_name: live.role_name.clone(),
            notification_channels,
            interval: Duration::from_secs(live.interval_minutes * 60),
            twitch_client_id: twitch.client_id.clone(),
            twitch_client_secret: twitch.client_secret.clone(),
            twitch_auth_url: twitch.auth_url.clone(),
            twitch_api_url: twitch.api_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(extra: &str) -> Config {
        Config::parse(&format!(
            "[general]\ndiscord_token = \"t\"\n{}",
            extra
        ))
        .unwrap()
    }

    const TWITCH: &str = "[twitch]\nclient_id = \"id\"\nclient_secret = \"secret\"\n";

    #[test]
    fn settings_from_complete_config() {
        let cfg = config(&format!(
            "[live]\nguild_id = 5\nnotification_channel_id = 7\n\
             additional_notification_channel_id = 8\ninterval_minutes = 3\n{}",
            TWITCH
        ));
        let settings = LiveSyncSettings::from_config(&cfg).unwrap();
        assert_eq!(settings.guild_id, GuildId::new(5));
        assert_eq!(
            settings.notification_channels,
            [ChannelId::new(7), ChannelId::new(8)]
        );
        assert_eq!(settings.interval, Duration::from_secs(180));
        assert_eq!(settings.role_name, "🔴 Live Now!");
    }

    #[test]
    fn notification_channels_are_optional_and_deduplicated() {
        let cfg = config(&format!(
            "[live]\nguild_id = 5\nnotification_channel_id = 7\n\
             additional_notification_channel_id = 7\n{}",
            TWITCH
        ));
        let settings = LiveSyncSettings::from_config(&cfg).unwrap();
        assert_eq!(settings.notification_channels, [ChannelId::new(7)]);

        let cfg = config(&format!("[live]\nguild_id = 5\n{}", TWITCH));
        let settings = LiveSyncSettings::from_config(&cfg).unwrap();
        assert!(settings.notification_channels.is_empty());
    }

    #[test]
    fn missing_guild_is_a_config_error() {
        let cfg = config(&format!("[live]\n{}", TWITCH));
        assert!(LiveSyncSettings::from_config(&cfg).is_err());
        let cfg = config(TWITCH);
        assert!(LiveSyncSettings::from_config(&cfg).is_err());
    }

    #[test]
    fn missing_credentials_are_a_config_error() {
        let cfg = config("[live]\nguild_id = 5\n");
        assert!(LiveSyncSettings::from_config(&cfg).is_err());
        let cfg = config("[live]\nguild_id = 5\n[twitch]\nclient_id = \"id\"\nclient_secret = \" \"\n");
        assert!(LiveSyncSettings::from_config(&cfg).is_err());
    }

    #[test]
    fn zero_interval_is_a_config_error() {
        let cfg = config(&format!("[live]\nguild_id = 5\ninterval_minutes = 0\n{}", TWITCH));
        assert_eq!(
            LiveSyncSettings::from_config(&cfg).unwrap_err(),
            ConfigError("live.interval_minutes must be at least 1".to_owned())
        );
    }

    #[test]
    fn stream_record_from_helix_json() {
        let stream: LiveStream = serde_json::from_value(serde_json::json!({
            "id": "1",
            "user_id": "141981764",
            "user_login": "alice",
            "game_name": "Chess",
            "title": "blitz",
            "viewer_count": 12,
            "thumbnail_url": "https://x/{width}x{height}.jpg"
        }))
        .unwrap();
        assert_eq!(stream.platform_user_id, "141981764");
        assert_eq!(stream.category, "Chess");
        assert_eq!(stream.viewer_count, Some(12));
    }

    #[tokio::test]
    async fn state_file_links_keep_stored_order() {
        let mut pstate = PersistentState::default();
        pstate.stream_links.set(UserId::new(2), "bob").unwrap();
        pstate.stream_links.set(UserId::new(1), "alice").unwrap();
        let store = Arc::new(RwLock::new(pstate));

        let links = store.live_links().await.unwrap();
        assert_eq!(
            links,
            [
                LiveLink {
                    member_id: UserId::new(2),
                    platform_login: "bob".to_owned()
                },
                LiveLink {
                    member_id: UserId::new(1),
                    platform_login: "alice".to_owned()
                },
            ]
        );
    }
}
