use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub matching: MatchConfig,
    /// Keyed by source name ("ofac", "un", "eu", "uk").
    pub sources: BTreeMap<String, SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Remote list URL. Ignored when `mock_path` (or a run-level mock
    /// directory override) is set.
    pub url: Option<String>,
    /// Local payload file for offline/mock mode.
    pub mock_path: Option<PathBuf>,
    #[serde(default = "default_rate_limit_secs")]
    pub rate_limit_secs: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Lower number wins ties in merge ordering and canonical-name choice.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_rate_limit_secs() -> f64 {
    2.0
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_priority() -> u32 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Uniform jitter added to each backoff delay, as a fraction of it.
    #[serde(default = "default_backoff_jitter")]
    pub backoff_jitter: f64,
    /// Whole-run deadline. Unfinished sources are recorded Failed("timeout").
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            backoff_max_ms: default_backoff_max_ms(),
            backoff_jitter: default_backoff_jitter(),
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_backoff_max_ms() -> u64 {
    30_000
}
fn default_backoff_jitter() -> f64 {
    0.2
}
fn default_run_timeout_secs() -> u64 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchConfig {
    /// Score at or above which a pair is auto-merged.
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    /// Score at or above which (but below high) a pair is flagged for review.
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
    #[serde(default = "default_identifier_weight")]
    pub identifier_weight: f64,
    #[serde(default = "default_name_weight")]
    pub name_weight: f64,
    #[serde(default = "default_country_weight")]
    pub country_weight: f64,
    #[serde(default = "default_date_weight")]
    pub date_weight: f64,
    /// Multiplier applied when both sides have known, disjoint countries.
    #[serde(default = "default_country_conflict_penalty")]
    pub country_conflict_penalty: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            low_threshold: default_low_threshold(),
            identifier_weight: default_identifier_weight(),
            name_weight: default_name_weight(),
            country_weight: default_country_weight(),
            date_weight: default_date_weight(),
            country_conflict_penalty: default_country_conflict_penalty(),
        }
    }
}

fn default_high_threshold() -> f64 {
    0.85
}
fn default_low_threshold() -> f64 {
    0.60
}
fn default_identifier_weight() -> f64 {
    0.40
}
fn default_name_weight() -> f64 {
    0.40
}
fn default_country_weight() -> f64 {
    0.10
}
fn default_date_weight() -> f64 {
    0.10
}
fn default_country_conflict_penalty() -> f64 {
    0.25
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.sources.is_empty() {
        anyhow::bail!("at least one [sources.<name>] table is required");
    }

    for (name, source) in &config.sources {
        if source.url.is_none() && source.mock_path.is_none() {
            anyhow::bail!("sources.{}: either url or mock_path must be set", name);
        }
        if source.rate_limit_secs < 0.0 {
            anyhow::bail!("sources.{}: rate_limit_secs must be >= 0", name);
        }
    }

    if config.fetch.concurrency == 0 {
        anyhow::bail!("fetch.concurrency must be >= 1");
    }
    if config.fetch.max_attempts == 0 {
        anyhow::bail!("fetch.max_attempts must be >= 1");
    }
    if config.fetch.backoff_multiplier < 1.0 {
        anyhow::bail!("fetch.backoff_multiplier must be >= 1.0");
    }
    if !(0.0..=1.0).contains(&config.fetch.backoff_jitter) {
        anyhow::bail!("fetch.backoff_jitter must be in [0.0, 1.0]");
    }

    let m = &config.matching;
    for (key, value) in [
        ("high_threshold", m.high_threshold),
        ("low_threshold", m.low_threshold),
        ("country_conflict_penalty", m.country_conflict_penalty),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("matching.{} must be in [0.0, 1.0]", key);
        }
    }
    if m.low_threshold > m.high_threshold {
        anyhow::bail!("matching.low_threshold must be <= matching.high_threshold");
    }
    let weight_sum = m.identifier_weight + m.name_weight + m.country_weight + m.date_weight;
    if weight_sum <= 0.0 {
        anyhow::bail!("matching weights must sum to a positive value");
    }

    Ok(())
}
