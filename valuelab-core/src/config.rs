//! Pipeline configuration: rolling window sizes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("fast_window must be >= 1 (got {0})")]
    FastWindow(usize),

    #[error("slow_window ({slow}) must be greater than fast_window ({fast})")]
    SlowWindow { fast: usize, slow: usize },

    #[error("high_window must be >= 1 (got {0})")]
    HighWindow(usize),
}

/// Window sizes for one pipeline run.
///
/// Missing fields take their defaults, so a partial `[pipeline]` table in a
/// config file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fast SMA window. Default 50.
    pub fast_window: usize,
    /// Slow SMA window. Default 200.
    pub slow_window: usize,
    /// Trailing-high window (one trading year). Default 252.
    pub high_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fast_window: 50,
            slow_window: 200,
            high_window: 252,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_window < 1 {
            return Err(ConfigError::FastWindow(self.fast_window));
        }
        if self.slow_window <= self.fast_window {
            return Err(ConfigError::SlowWindow {
                fast: self.fast_window,
                slow: self.slow_window,
            });
        }
        if self.high_window < 1 {
            return Err(ConfigError::HighWindow(self.high_window));
        }
        Ok(())
    }
}
