//! Engine configuration, loaded once at startup.
//!
//! Stored as a JSON file on disk:
//! ```json
//! {
//!   "station_ids": ["4116", "4118"],
//!   "elevator_station_ids": ["60201040"],
//!   "incident_line_ids": ["U1", "U3"],
//!   "use_short_incident_text": false,
//!   "poll_interval_ms": 300000
//! }
//! ```
//! The field names of the original MagicMirror module (`stations`,
//! `elevatorStations`, `incidentLines`, `incidentShort`, `updateInterval`,
//! `api_key`) are accepted too.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use indexmap::IndexSet;
use reqwest::Url;
use serde::Deserialize;

/// Environment variable consulted when the file carries no credential.
pub const API_KEY_ENV: &str = "WIENERLINIEN_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://www.wienerlinien.at/ogd_realtime/";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PollConfig {
    #[serde(alias = "stations")]
    pub station_ids: IndexSet<String>,

    #[serde(default, alias = "elevatorStations")]
    pub elevator_station_ids: IndexSet<String>,

    #[serde(default, alias = "incidentLines")]
    pub incident_line_ids: IndexSet<String>,

    #[serde(default, alias = "incidentShort")]
    pub use_short_incident_text: bool,

    #[serde(default = "default_poll_interval_ms", alias = "updateInterval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default, alias = "apiKey")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_poll_interval_ms() -> u64 {
    5 * 60 * 1000
}

fn default_request_timeout_ms() -> u64 {
    10 * 1000
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl PollConfig {
    /// A config polling `station_ids` with every optional setting at its default.
    pub fn new<I, S>(station_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            station_ids: station_ids.into_iter().map(Into::into).collect(),
            elevator_station_ids: IndexSet::new(),
            incident_line_ids: IndexSet::new(),
            use_short_incident_text: false,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            api_key: None,
            base_url: default_base_url(),
        }
    }

    /// Loads and validates the config at `path`, falling back to
    /// [`API_KEY_ENV`] for the credential.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        let mut config = Self::from_json(&content)
            .with_context(|| format!("invalid config file {path:?}"))?;

        if config.api_key.is_none() {
            config.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }

        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: PollConfig = serde_json::from_str(content)?;
        config.validate()
    }

    /// Checks invariants and normalizes `base_url` to end in `/`.
    pub fn validate(mut self) -> Result<Self> {
        if self.station_ids.is_empty() {
            bail!("at least one station id is required");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }
        if self.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be greater than zero");
        }

        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
        Url::parse(&self.base_url)
            .with_context(|| format!("invalid base_url {:?}", self.base_url))?;

        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
