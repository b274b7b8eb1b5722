//! Service configuration
//!
//! Defaults are layered under `HUB_*` environment variables with the
//! `config` crate, e.g. `HUB_BIND_ADDR=127.0.0.1:9000`.

use anyhow::Result;
use common::retry::RetryPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// HTTP server and catalog tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    pub bind_addr: String,
    /// Directory holding uploaded file bytes
    pub upload_dir: PathBuf,
    /// Largest accepted upload request body, in bytes
    pub max_upload_bytes: usize,
    /// Entries per dashboard list
    pub dashboard_limit: u32,
    /// Maximum age of a served dashboard, in seconds (0 disables caching)
    pub dashboard_cache_ttl_secs: u64,
    /// Wait for a per-resource lock before giving up, in milliseconds
    pub lock_timeout_ms: u64,
    /// Attempts for an aggregate update hitting a transient storage error
    pub max_retries: u32,
    /// Base delay between those attempts, in milliseconds
    pub retry_backoff_ms: u64,
    /// Upper bound on handling a single request, in seconds
    pub request_timeout_secs: u64,
    /// Comma-separated browser origins allowed by CORS, or `*` for any
    pub cors_origins: String,
}

impl ServerConfig {
    /// Load defaults overridden by `HUB_*` environment variables
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("bind_addr", "0.0.0.0:8000")?
            .set_default("upload_dir", "uploads")?
            .set_default("max_upload_bytes", 25_i64 * 1024 * 1024)?
            .set_default("dashboard_limit", 5_i64)?
            .set_default("dashboard_cache_ttl_secs", 5_i64)?
            .set_default("lock_timeout_ms", 2_000_i64)?
            .set_default("max_retries", 3_i64)?
            .set_default("retry_backoff_ms", 25_i64)?
            .set_default("request_timeout_secs", 30_i64)?
            .set_default("cors_origins", "http://localhost:3000")?
            .add_source(config::Environment::with_prefix("HUB"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn dashboard_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dashboard_cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured CORS origins, trimmed and without blanks
    pub fn cors_origins(&self) -> Vec<&str> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .collect()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}
