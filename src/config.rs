use std::path::Path;

use serde::Deserialize;

use crate::scheduler::SchedulerMode;

/// Errors that make a run impossible before it starts. Everything else
/// (transport failures, unparseable pages) is recorded per URL and never
/// aborts the crawl.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("thread count must be greater than 0, got {0}")]
    InvalidThreadCount(usize),

    #[error("request timeout must be greater than 0 seconds, got {0}")]
    InvalidTimeout(u64),

    #[error("delay must not be negative, got {0}")]
    NegativeDelay(f64),

    #[error("cache capacity must be greater than 0, got {0}")]
    InvalidCacheCapacity(usize),

    #[error("domain allowlist is empty but link extraction is enabled")]
    EmptyAllowlist,

    #[error("failed to read config file '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Unparseable {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    None,
    Lru,
}

impl CacheMode {
    pub fn label(self) -> &'static str {
        match self {
            CacheMode::None => "none",
            CacheMode::Lru => "lru",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub treat_redirect_as_ok: bool,
    /// Case-insensitive substrings that flag a link as a cascade-login
    /// policy violation without any network call.
    pub cascade_login_patterns: Vec<String>,
    pub max_links_per_page: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            treat_redirect_as_ok: true,
            cascade_login_patterns: Vec::new(),
            max_links_per_page: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub mode: CacheMode,
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::None,
            max_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub threads: usize,
    /// Minimum seconds between requests issued by one worker.
    pub delay: f64,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub user_agent: String,
    /// Domain suffixes considered in scope for extraction and checking.
    pub domain_allowlist: Vec<String>,
    pub extract_links: bool,
    /// Count repeated link targets once or per occurrence.
    pub count_duplicates: bool,
    /// 0 means unlimited.
    pub max_urls: usize,
    pub scheduler: SchedulerMode,
    pub checker: CheckerConfig,
    pub cache: CacheConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            threads: 12,
            delay: 0.0,
            timeout: 10,
            user_agent: format!("linkpatrol/{}", env!("CARGO_PKG_VERSION")),
            domain_allowlist: Vec::new(),
            extract_links: true,
            count_duplicates: true,
            max_urls: 0,
            scheduler: SchedulerMode::Fifo,
            checker: CheckerConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl CrawlConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: CrawlConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Unparseable {
                path: path.display().to_string(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on values that would otherwise surface as silent misbehavior
    /// deep in the worker loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidThreadCount(self.threads));
        }
        if self.timeout == 0 {
            return Err(ConfigError::InvalidTimeout(self.timeout));
        }
        if self.delay < 0.0 {
            return Err(ConfigError::NegativeDelay(self.delay));
        }
        if self.cache.mode == CacheMode::Lru && self.cache.max_size == 0 {
            return Err(ConfigError::InvalidCacheCapacity(self.cache.max_size));
        }
        if self.extract_links && self.domain_allowlist.is_empty() {
            return Err(ConfigError::EmptyAllowlist);
        }
        Ok(())
    }
}
