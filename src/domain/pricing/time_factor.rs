//! Content-age multipliers for the fair-share calculation.
//!
//! Two rules exist: a step function and a linear decay over the first
//! week. Both share the evergreen tail (`> 30` days => 0.8).

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Multiplier applied to fresh content.
pub const FRESH_FACTOR: f64 = 1.5;

/// Multiplier applied past the evergreen threshold.
pub const EVERGREEN_FACTOR: f64 = 0.8;

/// Days after upload beyond which content is considered evergreen.
pub const EVERGREEN_THRESHOLD_DAYS: f64 = 30.0;

/// Maps content age in days to a time multiplier.
pub trait TimeFactorStrategy: Send + Sync + Debug {
    /// Returns the multiplier for content uploaded `days_since_upload` days ago.
    fn factor(&self, days_since_upload: f64) -> f64;

    /// Short identifier used in logs and configuration.
    fn name(&self) -> &'static str;
}

/// Interpolates from 1.5 at day 0 to 1.0 at day 7.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearDecayTimeFactor;

impl LinearDecayTimeFactor {
    const DECAY_DAYS: f64 = 7.0;
}

impl TimeFactorStrategy for LinearDecayTimeFactor {
    fn factor(&self, days_since_upload: f64) -> f64 {
        let days = days_since_upload.max(0.0);
        if days < Self::DECAY_DAYS {
            FRESH_FACTOR - (FRESH_FACTOR - 1.0) * days / Self::DECAY_DAYS
        } else if days > EVERGREEN_THRESHOLD_DAYS {
            EVERGREEN_FACTOR
        } else {
            1.0
        }
    }

    fn name(&self) -> &'static str {
        "linear_decay"
    }
}

/// 1.5 for the first two days, 1.0 until day 30, then 0.8.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepTimeFactor;

impl StepTimeFactor {
    const FRESH_DAYS: f64 = 2.0;
}

impl TimeFactorStrategy for StepTimeFactor {
    fn factor(&self, days_since_upload: f64) -> f64 {
        let days = days_since_upload.max(0.0);
        if days <= Self::FRESH_DAYS {
            FRESH_FACTOR
        } else if days > EVERGREEN_THRESHOLD_DAYS {
            EVERGREEN_FACTOR
        } else {
            1.0
        }
    }

    fn name(&self) -> &'static str {
        "step"
    }
}

/// Configurable selector for the time-factor rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFactorKind {
    #[default]
    LinearDecay,
    Step,
}

impl TimeFactorKind {
    /// Builds the strategy for this kind.
    pub fn strategy(self) -> Arc<dyn TimeFactorStrategy> {
        match self {
            TimeFactorKind::LinearDecay => Arc::new(LinearDecayTimeFactor),
            TimeFactorKind::Step => Arc::new(StepTimeFactor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn linear_decay_interpolates_first_week() {
        let tf = LinearDecayTimeFactor;
        assert!(approx(tf.factor(0.0), 1.5));
        assert!(approx(tf.factor(3.5), 1.25));
        assert!(approx(tf.factor(7.0), 1.0));
    }

    #[test]
    fn linear_decay_evergreen_tail() {
        let tf = LinearDecayTimeFactor;
        assert!(approx(tf.factor(30.0), 1.0));
        assert!(approx(tf.factor(30.5), 0.8));
        assert!(approx(tf.factor(400.0), 0.8));
    }

    #[test]
    fn negative_age_is_treated_as_fresh() {
        assert!(approx(LinearDecayTimeFactor.factor(-5.0), 1.5));
        assert!(approx(StepTimeFactor.factor(-5.0), 1.5));
    }

    #[test]
    fn step_boundaries() {
        let tf = StepTimeFactor;
        assert!(approx(tf.factor(2.0), 1.5));
        assert!(approx(tf.factor(2.1), 1.0));
        assert!(approx(tf.factor(30.0), 1.0));
        assert!(approx(tf.factor(31.0), 0.8));
    }

    #[test]
    fn kind_defaults_to_linear_decay() {
        assert_eq!(TimeFactorKind::default(), TimeFactorKind::LinearDecay);
        assert_eq!(TimeFactorKind::default().strategy().name(), "linear_decay");
        assert_eq!(TimeFactorKind::Step.strategy().name(), "step");
    }

    #[test]
    fn kind_deserializes_snake_case() {
        let kind: TimeFactorKind = serde_json::from_str(r#""step""#).unwrap();
        assert_eq!(kind, TimeFactorKind::Step);
        let kind: TimeFactorKind = serde_json::from_str(r#""linear_decay""#).unwrap();
        assert_eq!(kind, TimeFactorKind::LinearDecay);
    }
}
