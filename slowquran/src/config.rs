//! Runtime configuration from the environment

use slowcore::storage::{cache_dir, config_dir};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const APP_NAME: &str = "slowquran";

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_AUDIO_URL: &str = "https://verses.quran.com/";
const DEFAULT_POLL_MS: u64 = 200;

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the content API (no trailing slash).
    pub api_url: String,
    /// Host that relative recitation locators are resolved against.
    pub audio_url: String,
    /// Where cached chapter and verse payloads live.
    pub cache_dir: PathBuf,
    /// Where `settings.json` (preferences, bookmark) lives.
    pub config_dir: PathBuf,
    /// How often the audio session is checked for a finished verse.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            audio_url: DEFAULT_AUDIO_URL.into(),
            cache_dir: cache_dir(APP_NAME),
            config_dir: config_dir(APP_NAME),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = value("SLOWQURAN_API_URL") {
            config.api_url = url;
        }
        config.api_url = config.api_url.trim_end_matches('/').to_string();
        if let Some(url) = value("SLOWQURAN_AUDIO_URL") {
            config.audio_url = url;
        }
        if let Some(dir) = value("SLOWQURAN_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(dir) = value("SLOWQURAN_CONFIG_DIR") {
            config.config_dir = PathBuf::from(dir);
        }
        if let Some(ms) = value("SLOWQURAN_POLL_MS") {
            match ms.parse::<u64>() {
                Ok(ms) if ms > 0 => config.poll_interval = Duration::from_millis(ms),
                _ => warn!("ignoring invalid SLOWQURAN_POLL_MS={ms:?}"),
            }
        }
        config
    }

    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}
