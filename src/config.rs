use std::path::PathBuf;
use std::time::Duration;

use log::warn;

use crate::api::DEFAULT_REQUEST_TIMEOUT;
use crate::poller::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const PROFILE_FILE: &str = "profile.json";

/// Runtime configuration, environment-driven: `WN_BASE_URL`,
/// `WN_POLL_SEC`, `WN_TIMEOUT_SEC`, `WN_DATA_DIR`. Unparseable values
/// fall back to the defaults with a warning.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            data_dir: PathBuf::from(".webnotify"),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("WN_BASE_URL") {
            if !base_url.is_empty() {
                config.base_url = base_url;
            }
        }
        if let Some(secs) = env_secs("WN_POLL_SEC") {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_secs("WN_TIMEOUT_SEC") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(dir) = std::env::var("WN_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        config
    }

    pub fn profile_path(&self) -> PathBuf {
        self.data_dir.join(PROFILE_FILE)
    }
}

fn env_secs(name: &str) -> Option<u64> {
    let value = std::env::var(name).ok()?;
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            warn!("ignoring {name}={value:?}, expected a positive integer");
            None
        }
    }
}
