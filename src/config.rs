use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::layout::{MAX_STAGE_PARTICIPANTS, MIN_STAGE_PARTICIPANTS};

const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub access_token: Option<String>,
    /// Used when the join response does not name a media server itself.
    pub livekit_url: Option<String>,
    pub connect_timeout: Duration,
    /// How many roster entries enter the primary stage.
    pub stage_capacity: usize,
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            access_token: None,
            livekit_url: None,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            stage_capacity: MAX_STAGE_PARTICIPANTS,
            log_file: None,
        }
    }
}

impl Config {
    pub fn from_env_variables() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Config {
            backend_url: lookup("COHOST_BACKEND_URL")
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            access_token: lookup("COHOST_ACCESS_TOKEN"),
            livekit_url: lookup("COHOST_LIVEKIT_URL"),
            connect_timeout: Duration::from_millis(parse_or(
                "COHOST_CONNECT_TIMEOUT_MS",
                lookup("COHOST_CONNECT_TIMEOUT_MS"),
                DEFAULT_CONNECT_TIMEOUT_MS,
            )),
            stage_capacity: stage_capacity(parse_or(
                "COHOST_STAGE_CAPACITY",
                lookup("COHOST_STAGE_CAPACITY"),
                MAX_STAGE_PARTICIPANTS,
            )),
            log_file: lookup("COHOST_LOG_FILE"),
        }
    }
}

fn stage_capacity(requested: usize) -> usize {
    let capacity = requested.clamp(MIN_STAGE_PARTICIPANTS, MAX_STAGE_PARTICIPANTS);
    if capacity != requested {
        warn!(
            "COHOST_STAGE_CAPACITY must be between {} and {}, using {}",
            MIN_STAGE_PARTICIPANTS, MAX_STAGE_PARTICIPANTS, capacity
        );
    }
    capacity
}

fn parse_or<T: FromStr + Copy>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} must be a number, got {:?}; using the default", key, raw);
            default
        }),
    }
}
