//! Document service configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Licence document service (external collaborator)
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsConfig {
    /// Base URL of the document-generation service
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Total attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl DocumentsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingRequired("DOCUMENTS_BASE_URL"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidUrl("DOCUMENTS_BASE_URL"));
        }
        if self.timeout_secs == 0 || self.max_attempts == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}
