use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ion_crawler_core::models::CrawlerConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub crawler: CrawlerSection,
    pub feed: FeedConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/crawler.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlerSection {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default)]
    pub restart_from_genesis: bool,
    #[serde(default = "default_page_budget")]
    pub page_budget: usize,
}

impl Default for CrawlerSection {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            restart_from_genesis: false,
            page_budget: default_page_budget(),
        }
    }
}

const MAX_INTERVAL_MINUTES: u64 = 525_600;

fn default_interval_minutes() -> u64 {
    30
}
fn default_page_budget() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub endpoint: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_feed_retries")]
    pub max_retries: u32,
}

fn default_page_size() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_feed_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    #[serde(default = "default_accepted_types")]
    pub accepted_types: BTreeSet<String>,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            accepted_types: default_accepted_types(),
            sampling_rate: default_sampling_rate(),
        }
    }
}

fn default_accepted_types() -> BTreeSet<String> {
    // "gxi" is the GaiaX identity type tag.
    BTreeSet::from(["gxi".to_string()])
}
fn default_sampling_rate() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct PublisherConfig {
    #[serde(default = "default_publisher_kind")]
    pub kind: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the sink access key.
    #[serde(default)]
    pub key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_publisher_retries")]
    pub max_retries: u32,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            kind: default_publisher_kind(),
            endpoint: None,
            key_env: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_publisher_retries(),
        }
    }
}

fn default_publisher_kind() -> String {
    "log".to_string()
}
fn default_publisher_retries() -> u32 {
    5
}

impl Config {
    /// Build the immutable snapshot handed to one crawl cycle.
    pub fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig {
            feed_endpoint: self.feed.endpoint.clone(),
            accepted_types: self.filter.accepted_types.clone(),
            sampling_rate: self.filter.sampling_rate,
            page_size: self.feed.page_size,
            page_budget: self.crawler.page_budget,
            restart_from_genesis: self.crawler.restart_from_genesis,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.crawler.interval_minutes.saturating_mul(60))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.feed.endpoint.trim().is_empty() {
        anyhow::bail!("feed.endpoint must not be empty");
    }
    if config.feed.page_size == 0 {
        anyhow::bail!("feed.page_size must be > 0");
    }

    if config.crawler.interval_minutes == 0 {
        anyhow::bail!("crawler.interval_minutes must be >= 1");
    }
    if config.crawler.interval_minutes > MAX_INTERVAL_MINUTES {
        anyhow::bail!(
            "crawler.interval_minutes must be <= {} (one year)",
            MAX_INTERVAL_MINUTES
        );
    }
    if config.crawler.page_budget == 0 {
        anyhow::bail!("crawler.page_budget must be >= 1");
    }

    if config.filter.accepted_types.is_empty() {
        anyhow::bail!("filter.accepted_types must name at least one type");
    }
    if !(0.0..=1.0).contains(&config.filter.sampling_rate) {
        anyhow::bail!("filter.sampling_rate must be in [0.0, 1.0]");
    }

    match config.publisher.kind.as_str() {
        "http" => {
            if config.publisher.endpoint.as_deref().map_or(true, |e| e.trim().is_empty()) {
                anyhow::bail!("publisher.endpoint must be set when publisher.kind is 'http'");
            }
        }
        "log" => {}
        other => anyhow::bail!(
            "Unknown publisher kind: '{}'. Must be http or log.",
            other
        ),
    }

    Ok(())
}
