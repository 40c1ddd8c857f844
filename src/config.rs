//! Configuration for matchdex.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::retry::BackoffConfig;
use crate::types::{CompetitionEntry, CompetitionSpec};

/// Upstream API endpoint and the header set sent with every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sport segment of the daily schedule endpoint
    #[serde(default = "default_sport")]
    pub sport: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept")]
    pub accept: String,
    #[serde(default = "default_referer")]
    pub referer: String,
}

fn default_base_url() -> String {
    "https://api.sofascore.com/api/v1".to_string()
}

fn default_sport() -> String {
    "football".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_accept() -> String {
    "application/json".to_string()
}

fn default_referer() -> String {
    "https://www.sofascore.com/".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            sport: default_sport(),
            user_agent: default_user_agent(),
            accept: default_accept(),
            referer: default_referer(),
        }
    }
}

/// Socket-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connect and read timeout per request, independent of retries
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
}

fn default_timeout_secs() -> f64 {
    15.0
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Backoff tiers in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffSettings {
    #[serde(default = "default_challenge_secs")]
    pub challenge_secs: Vec<f64>,
    #[serde(default = "default_throttle_secs")]
    pub throttle_secs: Vec<f64>,
}

fn default_challenge_secs() -> Vec<f64> {
    vec![5.0, 15.0, 45.0]
}

fn default_throttle_secs() -> Vec<f64> {
    vec![3.0, 8.0, 20.0]
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            challenge_secs: default_challenge_secs(),
            throttle_secs: default_throttle_secs(),
        }
    }
}

impl BackoffSettings {
    pub fn to_backoff(&self) -> BackoffConfig {
        BackoffConfig::from_secs(&self.challenge_secs, &self.throttle_secs)
    }
}

/// Discovery run behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Minimum seconds between consecutive requests
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
    #[serde(default = "default_seasons")]
    pub default_seasons: Vec<String>,
    /// Date scan gives up on a season after this many challenges in a row
    #[serde(default = "default_max_consecutive_challenges")]
    pub max_consecutive_challenges: u32,
    /// Halt the remaining seasons once one season ends in a persistent challenge
    #[serde(default)]
    pub abort_on_challenge: bool,
}

fn default_delay_secs() -> f64 {
    0.5
}

fn default_seasons() -> Vec<String> {
    ["2022-23", "2023-24", "2024-25", "2025-26"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_consecutive_challenges() -> u32 {
    5
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            default_seasons: default_seasons(),
            max_consecutive_challenges: default_max_consecutive_challenges(),
            abort_on_challenge: false,
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_index_path")]
    pub index_path: String,
    #[serde(default = "default_competitions_file")]
    pub competitions_file: String,
    /// Directory holding out-of-band `<slug>_seasons.json` mappings
    #[serde(default = "default_seasons_dir")]
    pub seasons_dir: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

fn default_index_path() -> String {
    "data/index/matches.csv".to_string()
}

fn default_competitions_file() -> String {
    "config/competitions.yaml".to_string()
}

fn default_seasons_dir() -> String {
    "config".to_string()
}

fn default_cache_dir() -> String {
    "data/cache/discovery".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            competitions_file: default_competitions_file(),
            seasons_dir: default_seasons_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub backoff: BackoffSettings,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (MATCHDEX_HTTP__TIMEOUT_SECS, etc.)
            .add_source(
                config::Environment::with_prefix("MATCHDEX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject second values that cannot become a `Duration`
    pub fn validate(&self) -> anyhow::Result<()> {
        let timeout = self.http.timeout_secs;
        if !(timeout.is_finite() && timeout > 0.0) {
            anyhow::bail!("http.timeout_secs must be a positive number of seconds, got {}", timeout);
        }

        let delay = self.discovery.delay_secs;
        if !(delay.is_finite() && delay >= 0.0) {
            anyhow::bail!("discovery.delay_secs must be zero or more seconds, got {}", delay);
        }

        let tiers = self
            .backoff
            .challenge_secs
            .iter()
            .chain(&self.backoff.throttle_secs);
        for secs in tiers {
            if !(secs.is_finite() && *secs >= 0.0) {
                anyhow::bail!("backoff delays must be zero or more seconds, got {}", secs);
            }
        }
        Ok(())
    }
}

/// Load competition definitions, keyed by competition slug
pub fn load_competitions(path: &Path) -> anyhow::Result<BTreeMap<String, CompetitionSpec>> {
    if !path.exists() {
        anyhow::bail!("competitions file not found: {}", path.display());
    }

    let raw = config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .with_context(|| format!("failed to read {}", path.display()))?;

    let entries: BTreeMap<String, CompetitionEntry> = raw
        .try_deserialize()
        .with_context(|| format!("invalid competition definitions in {}", path.display()))?;

    Ok(entries
        .into_iter()
        .map(|(key, entry)| {
            let spec = CompetitionSpec::from_entry(&key, entry);
            (key, spec)
        })
        .collect())
}

/// Look up a competition by its config key or canonical slug
pub fn find_competition<'a>(
    competitions: &'a BTreeMap<String, CompetitionSpec>,
    name: &str,
) -> Option<&'a CompetitionSpec> {
    competitions
        .get(name)
        .or_else(|| competitions.values().find(|c| c.slug == name))
}
