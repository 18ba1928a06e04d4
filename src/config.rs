use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

/// Sliding-window admission limits for the write path.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

fn default_max_requests() -> usize {
    5
}
fn default_window_secs() -> u64 {
    60
}
fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: u64,
    /// Upper bound on a single backend call before the cache is bypassed.
    #[serde(default = "default_cache_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
            timeout_ms: default_cache_timeout_ms(),
        }
    }
}

impl CacheConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_cache_ttl() -> u64 {
    60
}
fn default_cache_max_entries() -> u64 {
    10_000
}
fn default_cache_timeout_ms() -> u64 {
    250
}

impl AppConfig {
    /// Reject settings that would make the limiter or the cache meaningless.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_limit.max_requests == 0 {
            return Err("rate_limit.max_requests must be at least 1".to_string());
        }
        if self.rate_limit.window_secs == 0 {
            return Err("rate_limit.window_secs must be at least 1".to_string());
        }
        if self.rate_limit.cleanup_interval_secs == 0 {
            return Err("rate_limit.cleanup_interval_secs must be at least 1".to_string());
        }
        if self.cache.ttl_secs == 0 {
            return Err("cache.ttl_secs must be at least 1".to_string());
        }
        if self.cache.timeout_ms == 0 {
            return Err("cache.timeout_ms must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        let path = config_path.unwrap_or("config.toml");
        builder = builder.add_source(File::with_name(path).required(false));

        // VIEWSTATS__SERVER__PORT=3001, VIEWSTATS__RATE_LIMIT__MAX_REQUESTS=10, ...
        builder = builder.add_source(
            Environment::with_prefix("VIEWSTATS")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
