use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::NHL_API_BASE;
use crate::state::CursorSeed;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variable that overrides `discord.token`.
pub const DISCORD_TOKEN_ENV: &str = "DISCORD_TOKEN";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub team: TeamConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    /// Initial destination registry entries.
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

/// The tracked team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Three-letter team code, e.g. `TOR`.
    pub abbrev: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token. Prefer the `DISCORD_TOKEN` environment variable.
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub guild_id: String,
    pub channel_id: String,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Polling interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on how long after its start a game can still be live.
    #[serde(default = "default_max_game_duration_hours")]
    pub max_game_duration_hours: u64,
    /// Timeout applied to every upstream and Discord request.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub cursor_seed: CursorSeed,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_poll_interval_ms() -> u64 {
    60_000
}

fn default_max_game_duration_hours() -> u64 {
    6
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_api_base() -> String {
    NHL_API_BASE.to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_game_duration_hours: default_max_game_duration_hours(),
            http_timeout_secs: default_http_timeout_secs(),
            cursor_seed: CursorSeed::default(),
            api_base: default_api_base(),
        }
    }
}

impl SettingsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn max_game_duration(&self) -> chrono::Duration {
        chrono::Duration::hours(self.max_game_duration_hours as i64)
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        if config.team.abbrev.trim().is_empty() {
            anyhow::bail!("team.abbrev must not be empty");
        }
        if config.settings.poll_interval_ms == 0 {
            anyhow::bail!("settings.poll_interval_ms must be positive");
        }
        Ok(config)
    }

    /// Bot token from the environment, falling back to the config file.
    pub fn discord_token(&self) -> Option<String> {
        std::env::var(DISCORD_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| Some(self.discord.token.clone()).filter(|t| !t.trim().is_empty()))
    }
}
