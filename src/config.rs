use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/synbot/config.toml";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    pub live: Option<Live>,
    pub twitch: Option<Twitch>,
    pub birthday: Option<Birthday>,
    pub ask: Option<Ask>,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    #[serde(default)]
    pub bot_owners: Vec<String>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Members with this role may edit other members' records
    #[serde(default = "default_mod_role_name")]
    pub mod_role_name: String,
    #[serde(default = "default_streamer_role_name")]
    pub streamer_role_name: String,
}

/// Live-stream role sync
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Live {
    pub guild_id: Option<u64>,
    #[serde(default = "default_live_role_name")]
    pub role_name: String,
    pub notification_channel_id: Option<u64>,
    pub additional_notification_channel_id: Option<u64>,
    #[serde(default = "default_live_interval_minutes")]
    pub interval_minutes: u64,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Twitch {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_twitch_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_twitch_api_url")]
    pub api_url: String,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Birthday {
    pub channel_id: u64,
    #[serde(default = "default_birthday_interval_minutes")]
    pub check_interval_minutes: u64,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Ask {
    pub api_key: String,
    #[serde(default = "default_ask_model")]
    pub model: String,
    #[serde(default = "default_ask_api_url")]
    pub api_url: String,
}

fn default_command_prefix() -> String {
    "!".to_owned()
}

fn default_mod_role_name() -> String {
    "💥 Mod".to_owned()
}

fn default_streamer_role_name() -> String {
    "🎬 Streamer".to_owned()
}

fn default_live_role_name() -> String {
    "🔴 Live Now!".to_owned()
}

fn default_live_interval_minutes() -> u64 {
    1
}

fn default_twitch_auth_url() -> String {
    "https://id.twitch.tv/oauth2/token".to_owned()
}

fn default_twitch_api_url() -> String {
    "https://api.twitch.tv/helix".to_owned()
}

fn default_birthday_interval_minutes() -> u64 {
    60
}

fn default_ask_model() -> String {
    "gemini-2.0-flash".to_owned()
}

fn default_ask_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_owned()
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Self::parse(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }

    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(Into::into)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let new = Self::load().await?;
        *self = new;
        Ok(())
    }
}
