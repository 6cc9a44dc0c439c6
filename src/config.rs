//! Runtime configuration, read from the environment (after `.env` is loaded).

use std::path::PathBuf;
use std::time::Duration;

use humantime_serde::re::humantime;
use poise::serenity_prelude::UserId;
use thiserror::Error;

/// Errors raised while reading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub command_prefix: String,
    pub admin_user_id: Option<UserId>,
    /// Initial per-guild gain, 0.0 to 1.0
    pub default_volume: f32,
    /// `None` keeps an idle guild connected forever
    pub idle_timeout: Option<Duration>,
    /// Lifetime of a "now playing" card's buttons; `None` keeps them live
    pub control_timeout: Option<Duration>,
    pub ytdlp_path: String,
    pub max_playlist_entries: usize,
    pub database_path: PathBuf,
    pub history_turns: usize,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let admin_user_id = match get("ADMIN_USER_ID") {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .ok()
                    .filter(|id| *id != 0)
                    .map(UserId::new)
                    .ok_or_else(|| ConfigError::Invalid {
                        key: "ADMIN_USER_ID",
                        reason: format!("`{raw}` is not a user id"),
                    })?,
            ),
            None => None,
        };

        let default_volume = match get("DEFAULT_VOLUME") {
            Some(raw) => match raw.parse::<u8>() {
                Ok(percent) if percent <= 100 => f32::from(percent) / 100.0,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "DEFAULT_VOLUME",
                        reason: format!("`{raw}` is not a percentage between 0 and 100"),
                    });
                }
            },
            None => 0.5,
        };

        let idle_timeout = parse_timeout(
            get("IDLE_TIMEOUT"),
            "IDLE_TIMEOUT",
            Some(Duration::from_secs(300)),
        )?;
        let control_timeout = parse_timeout(get("CONTROL_TIMEOUT"), "CONTROL_TIMEOUT", None)?;

        Ok(Self {
            discord_token,
            command_prefix: get("COMMAND_PREFIX").unwrap_or_else(|| "!".to_string()),
            admin_user_id,
            default_volume,
            idle_timeout,
            control_timeout,
            ytdlp_path: get("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            max_playlist_entries: parse_count(get("MAX_PLAYLIST_ENTRIES"), "MAX_PLAYLIST_ENTRIES", 50)?,
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("application_data.db")),
            history_turns: parse_count(get("HISTORY_LENGTH"), "HISTORY_LENGTH", 10)?,
        })
    }
}

/// A humantime duration, or `off` for none.
fn parse_timeout(
    raw: Option<String>,
    key: &'static str,
    default: Option<Duration>,
) -> Result<Option<Duration>, ConfigError> {
    match raw {
        Some(raw) if raw.eq_ignore_ascii_case("off") => Ok(None),
        Some(raw) => humantime::parse_duration(&raw)
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

fn parse_count(raw: Option<String>, key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match raw {
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ConfigError::Invalid {
                key,
                reason: format!("`{raw}` is not a positive number"),
            }),
        None => Ok(default),
    }
}
