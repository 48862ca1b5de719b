use std::{env, fmt::Display, str::FromStr};

use log::{info, warn};
use thiserror::Error;

use crate::db::DEFAULT_DATABASE_URL;
use crate::election::ElectionConfig;
use crate::election::identifiers::DEFAULT_MAX_ATTEMPTS;
use crate::election::session::DEFAULT_VOTER_COUNT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    Missing(&'static str),
}

pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub election: ElectionConfig,
    /// Channel that receives a snapshot after each state change.
    pub announce_channel: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let discord_token = var("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        Ok(Self {
            discord_token,
            database_url: try_load("DATABASE_URL", DEFAULT_DATABASE_URL.to_string()),
            election: ElectionConfig {
                voter_count: try_load("ELECTION_VOTER_COUNT", DEFAULT_VOTER_COUNT),
                max_attempts: try_load("ELECTION_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
                seed: load_optional("ELECTION_SEED"),
            },
            announce_channel: load_optional("ANNOUNCE_CHANNEL_ID"),
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Option<T>
where
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value '{value}': {e}");
        })
        .ok()
}

fn try_load<T: FromStr + Display>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    match var(key) {
        Some(value) => parse(key, &value).unwrap_or_else(|| {
            warn!("Falling back to default {key}: {default}");
            default
        }),
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

fn load_optional<T: FromStr>(key: &str) -> Option<T>
where
    T::Err: Display,
{
    var(key).and_then(|value| parse(key, &value))
}
