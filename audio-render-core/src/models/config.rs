use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::RenderError;

/// Tuning for one output stream.
///
/// Every field has a default, so a partial JSON document is enough:
/// ```json
/// { "drain_timeout_ms": 250 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfiguration {
    /// How long `stop()` waits for the driver to drain buffered audio (default: 500).
    pub drain_timeout_ms: u64,

    /// Audio duration the buffer may hold at most (default: 500).
    pub buffer_ceiling_ms: u64,

    /// Sleep between backpressure retries in `write_blocking` (default: 10).
    pub retry_interval_ms: u64,

    /// Retry cap for `write_blocking` (None = retry until accepted).
    pub max_write_retries: Option<u32>,

    /// Chunks of headroom a write reserves so growth happens early (default: 2).
    pub headroom_chunks: usize,
}

impl RenderConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_ceiling_ms == 0 {
            return Err("buffer ceiling must be positive".into());
        }
        if self.retry_interval_ms == 0 {
            return Err("retry interval must be positive".into());
        }
        if self.headroom_chunks == 0 {
            return Err("headroom must cover at least one chunk".into());
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, RenderError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RenderError::ConfigurationFailed(format!("failed to parse configuration: {}", e)))?;
        config.validate().map_err(RenderError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn buffer_ceiling(&self) -> Duration {
        Duration::from_millis(self.buffer_ceiling_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Default for RenderConfiguration {
    fn default() -> Self {
        Self {
            drain_timeout_ms: 500,
            buffer_ceiling_ms: 500,
            retry_interval_ms: 10,
            max_write_retries: Some(50),
            headroom_chunks: 2,
        }
    }
}
