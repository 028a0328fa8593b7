//! # Configuration Management Module
//!
//! Loads, validates and writes the bot's TOML configuration.
//!
//! ## Configuration Structure
//!
//! - [`BotConfig`] - bot identity and gateway token
//! - [`BattleConfig`] - battle thread and session housekeeping settings
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use battlebot::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration from file
//!     let config = Config::load("config.toml").await?;
//!     println!("Bot: {}", config.bot.name);
//!
//!     // Create default configuration
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bot]
//! name = "Battle Bot"
//!
//! [battle]
//! idle_timeout_minutes = 120
//! remove_finished = true
//! thread_auto_archive_minutes = 60
//!
//! [logging]
//! level = "info"
//! file = "battlebot.log"
//! ```
//!
//! The gateway token is never written by `init`; set `token` under `[bot]` or
//! export `BATTLEBOT_TOKEN` (the environment wins).

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Environment variable overriding `bot.token`.
pub const TOKEN_ENV: &str = "BATTLEBOT_TOKEN";

/// Auto-archive durations accepted by the chat platform, in minutes.
pub const ALLOWED_AUTO_ARCHIVE: [u32; 4] = [60, 1440, 4320, 10080];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    #[serde(default)]
    pub battle: BattleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Sessions with no events for this many minutes are evicted. 0 disables eviction.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_minutes: u32,
    /// Drop a session from the registry as soon as one side is defeated.
    #[serde(default = "default_remove_finished")]
    pub remove_finished: bool,
    /// Auto-archive duration for threads created by `/thread`.
    #[serde(default = "default_auto_archive")]
    pub thread_auto_archive_minutes: u32,
}

fn default_idle_timeout() -> u32 {
    120
}

fn default_remove_finished() -> bool {
    true
}

fn default_auto_archive() -> u32 {
    60
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: default_idle_timeout(),
            remove_finished: default_remove_finished(),
            thread_auto_archive_minutes: default_auto_archive(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl LoggingConfig {
    /// Configured level as a filter; unknown names fall back to `Info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    /// Load configuration from a file, apply the token environment override and validate.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                config.bot.token = Some(token);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot.name.trim().is_empty() {
            return Err(anyhow!("bot.name must not be empty"));
        }
        if !ALLOWED_AUTO_ARCHIVE.contains(&self.battle.thread_auto_archive_minutes) {
            return Err(anyhow!(
                "battle.thread_auto_archive_minutes must be one of {:?}, got {}",
                ALLOWED_AUTO_ARCHIVE,
                self.battle.thread_auto_archive_minutes
            ));
        }
        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            return Err(anyhow!("logging.level '{}' is not a log level", self.logging.level));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot: BotConfig {
                name: "Battle Bot".to_string(),
                token: None,
            },
            battle: BattleConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("battlebot.log".to_string()),
            },
        }
    }
}
