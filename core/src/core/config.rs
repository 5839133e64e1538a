//! Configuration
//!
//! Settings are read from an optional JSON file, then overridden by
//! TRACEDECK_* environment variables. Everything has a working default so a
//! bare `Config::load(None)` is always valid.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::buffer::{DequeueParams, EnqueueLimits};

use super::constants;

// =============================================================================
// Config Sections
// =============================================================================

/// Buffer admission limits
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    pub max_items: usize,
    pub max_bytes: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_items: constants::BUFFER_MAX_ITEMS,
            max_bytes: constants::BUFFER_MAX_BYTES,
        }
    }
}

/// Flush batch shaping
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FlushConfig {
    pub batch_max_items: usize,
    pub batch_max_bytes: usize,
    pub batch_max_age_ms: u64,
    pub batch_min_age_ms: u64,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            batch_max_items: constants::FLUSH_BATCH_MAX_ITEMS,
            batch_max_bytes: constants::FLUSH_BATCH_MAX_BYTES,
            batch_max_age_ms: constants::FLUSH_BATCH_MAX_AGE_MS,
            batch_min_age_ms: constants::FLUSH_BATCH_MIN_AGE_MS,
        }
    }
}

/// Pricing data source
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Optional path to a LiteLLM-format pricing file; embedded data is used
    /// when unset
    pub prices_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub buffer: BufferConfig,
    pub flush: FlushConfig,
    pub pricing: PricingConfig,
}

// =============================================================================
// Loading
// =============================================================================

impl Config {
    /// Load configuration from an optional JSON file, then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config file");
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        override_usize("BUFFER_MAX_ITEMS", &mut self.buffer.max_items)?;
        override_usize("BUFFER_MAX_BYTES", &mut self.buffer.max_bytes)?;
        override_usize("FLUSH_BATCH_MAX_ITEMS", &mut self.flush.batch_max_items)?;
        override_usize("FLUSH_BATCH_MAX_BYTES", &mut self.flush.batch_max_bytes)?;
        override_u64("FLUSH_BATCH_MAX_AGE_MS", &mut self.flush.batch_max_age_ms)?;
        override_u64("FLUSH_BATCH_MIN_AGE_MS", &mut self.flush.batch_min_age_ms)?;

        if let Ok(path) = std::env::var(format!("{}PRICES_PATH", constants::ENV_PREFIX)) {
            self.pricing.prices_path = Some(PathBuf::from(path));
        }
        Ok(())
    }
}

fn override_usize(name: &str, target: &mut usize) -> Result<()> {
    let key = format!("{}{}", constants::ENV_PREFIX, name);
    if let Ok(value) = std::env::var(&key) {
        *target = value
            .parse()
            .with_context(|| format!("Invalid value for {key}: {value}"))?;
    }
    Ok(())
}

fn override_u64(name: &str, target: &mut u64) -> Result<()> {
    let key = format!("{}{}", constants::ENV_PREFIX, name);
    if let Ok(value) = std::env::var(&key) {
        *target = value
            .parse()
            .with_context(|| format!("Invalid value for {key}: {value}"))?;
    }
    Ok(())
}

// =============================================================================
// Conversions
// =============================================================================

impl From<&BufferConfig> for EnqueueLimits {
    fn from(config: &BufferConfig) -> Self {
        Self {
            max_size: config.max_items,
            max_bytes: config.max_bytes,
        }
    }
}

impl From<&FlushConfig> for DequeueParams {
    fn from(config: &FlushConfig) -> Self {
        Self {
            max_size: config.batch_max_items,
            max_bytes: config.batch_max_bytes,
            max_age: Duration::from_millis(config.batch_max_age_ms),
            min_age: Duration::from_millis(config.batch_min_age_ms),
        }
    }
}
