use std::time::Duration;

use anyhow::{Context, Result};

use crate::export::EngineTuning;
use crate::fitting::SearchTuning;

/// Application configuration loaded from environment variables.
/// Every variable is optional; unparsable values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Upper bound on a single PDF conversion, primary or fallback.
    pub conversion_timeout_ms: u64,
    /// Wait after the export overrides are applied, before measuring.
    pub layout_settle_ms: u64,
    pub candidate_settle_ms: u64,
    pub candidate_settle_step_ms: u64,
    pub buffer_scale_divisor: f32,
    /// Number of rendered PDFs kept in memory. 0 disables the cache.
    pub export_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            rust_log: "info".to_string(),
            conversion_timeout_ms: 30_000,
            layout_settle_ms: 150,
            candidate_settle_ms: 50,
            candidate_settle_step_ms: 10,
            buffer_scale_divisor: 1.15,
            export_cache_capacity: 32,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        let config = Config {
            port: env_or("PORT", defaults.port)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            conversion_timeout_ms: env_or("CONVERSION_TIMEOUT_MS", defaults.conversion_timeout_ms)?,
            layout_settle_ms: env_or("LAYOUT_SETTLE_MS", defaults.layout_settle_ms)?,
            candidate_settle_ms: env_or("CANDIDATE_SETTLE_MS", defaults.candidate_settle_ms)?,
            candidate_settle_step_ms: env_or(
                "CANDIDATE_SETTLE_STEP_MS",
                defaults.candidate_settle_step_ms,
            )?,
            buffer_scale_divisor: env_or("BUFFER_SCALE_DIVISOR", defaults.buffer_scale_divisor)?,
            export_cache_capacity: env_or("EXPORT_CACHE_CAPACITY", defaults.export_cache_capacity)?,
        };

        if !(config.buffer_scale_divisor.is_finite() && config.buffer_scale_divisor >= 1.0) {
            anyhow::bail!(
                "BUFFER_SCALE_DIVISOR must be at least 1.0, got {}",
                config.buffer_scale_divisor
            );
        }
        if config.conversion_timeout_ms == 0 {
            anyhow::bail!("CONVERSION_TIMEOUT_MS must be greater than zero");
        }
        Ok(config)
    }

    pub fn engine_tuning(&self) -> EngineTuning {
        EngineTuning {
            layout_settle: Duration::from_millis(self.layout_settle_ms),
            search: SearchTuning {
                settle_base: Duration::from_millis(self.candidate_settle_ms),
                settle_step: Duration::from_millis(self.candidate_settle_step_ms),
            },
            buffer_divisor: self.buffer_scale_divisor,
            conversion_timeout: Duration::from_millis(self.conversion_timeout_ms),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
