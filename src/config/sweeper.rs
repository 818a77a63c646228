//! Reconciliation sweeper configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::handlers::contract::SweeperSettings;

/// Background reconciliation against the payment gateway
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Run the sweeper loop in this process
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Page size; each sweep walks every candidate page by page
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Gateway lookups in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl SweeperConfig {
    pub fn settings(&self) -> SweeperSettings {
        SweeperSettings {
            interval: Duration::from_secs(self.interval_secs),
            batch_size: self.batch_size,
            concurrency: self.concurrency,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::InvalidSweeper("interval_secs must be positive"));
        }
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidSweeper("batch_size must be positive"));
        }
        if self.concurrency == 0 || self.concurrency > 64 {
            return Err(ValidationError::InvalidSweeper("concurrency must be in 1..=64"));
        }
        Ok(())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    300
}

fn default_batch_size() -> u32 {
    100
}

fn default_concurrency() -> usize {
    8
}
