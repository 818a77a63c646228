//! Pricing engine configuration

use serde::Deserialize;
use std::sync::Arc;

use super::error::ValidationError;
use crate::domain::pricing::{
    NicheCatalog, PricingEngine, TimeFactorKind, DEFAULT_FALLBACK_BASELINE_VIEWS,
};

/// Pricing engine tuning
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    /// Content-age multiplier rule
    #[serde(default)]
    pub time_factor: TimeFactorKind,

    /// Baseline views used when neither the licensor's category average
    /// nor their own view count is usable
    #[serde(default = "default_fallback_baseline_views")]
    pub fallback_baseline_views: f64,
}

impl PricingConfig {
    pub fn engine(&self) -> PricingEngine {
        PricingEngine::new(
            Arc::new(NicheCatalog::builtin().clone()),
            self.time_factor.strategy(),
            self.fallback_baseline_views,
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.fallback_baseline_views.is_finite() || self.fallback_baseline_views <= 0.0 {
            return Err(ValidationError::InvalidBaselineViews);
        }
        Ok(())
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            time_factor: TimeFactorKind::default(),
            fallback_baseline_views: default_fallback_baseline_views(),
        }
    }
}

fn default_fallback_baseline_views() -> f64 {
    DEFAULT_FALLBACK_BASELINE_VIEWS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PricingConfig::default();
        assert_eq!(config.time_factor, TimeFactorKind::LinearDecay);
        assert_eq!(config.fallback_baseline_views, 10_000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_baseline_rejected() {
        let config = PricingConfig {
            fallback_baseline_views: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
