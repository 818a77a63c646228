//! Fair-share pricing engine.
//!
//! Pure and deterministic: given reach metrics, durations, usage and
//! content age it produces the share of reach-derived revenue owed to
//! the licensor and the resulting FIXED or METERED price. Internal
//! failures never propagate; they yield zeroed terms and an error log.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::foundation::Price;

use super::{NicheCatalog, PricingModel, TimeFactorKind, TimeFactorStrategy};

/// Baseline views used when neither the licensor's category average nor
/// current views are known.
pub const DEFAULT_FALLBACK_BASELINE_VIEWS: f64 = 10_000.0;

const MIN_LICENSEE_DURATION_SECS: f64 = 0.1;
const MIN_LICENSOR_VIEWS: f64 = 1.0;
const CONTENT_WEIGHT: f64 = 0.5;

/// Inputs to a single quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingInput {
    pub views_licensee: f64,
    pub views_licensor: f64,
    pub duration_licensee_secs: f64,
    pub duration_licensor_secs: f64,
    /// Fraction of the original used in the reaction, in [0, 1].
    pub usage_fraction: f64,
    pub days_since_upload: f64,
    pub category_id: String,
    /// Licensor's average views for the category, if known.
    #[serde(default)]
    pub baseline_views: Option<f64>,
    /// Zero-based month used for seasonality.
    pub month0: u32,
}

/// Result of a quote. Stored on the contract for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTerms {
    pub pricing_model: PricingModel,
    pub share: f64,
    pub content_score: f64,
    pub discount_factor: f64,
    pub time_factor: f64,
    pub effective_rpm: f64,
    pub price_value: Price,
}

impl PriceTerms {
    /// All-zero terms, returned when computation fails.
    pub fn zeroed(pricing_model: PricingModel) -> Self {
        Self {
            pricing_model,
            share: 0.0,
            content_score: 0.0,
            discount_factor: 0.0,
            time_factor: 0.0,
            effective_rpm: 0.0,
            price_value: Price::ZERO,
        }
    }

    /// Audit reference recording the factors behind `share`.
    pub fn audit_ref(&self, category_id: &str) -> String {
        format!(
            "fair-share/v1?category={}&content={:.6}&discount={:.6}&time={:.6}&rpm={:.6}",
            category_id, self.content_score, self.discount_factor, self.time_factor, self.effective_rpm
        )
    }
}

#[derive(Debug, Error, PartialEq)]
enum PricingError {
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct ShareBreakdown {
    share: f64,
    content_score: f64,
    discount_factor: f64,
    time_factor: f64,
}

/// Computes price terms from reach metrics.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    catalog: Arc<NicheCatalog>,
    time_factor: Arc<dyn TimeFactorStrategy>,
    fallback_baseline_views: f64,
}

impl PricingEngine {
    pub fn new(
        catalog: Arc<NicheCatalog>,
        time_factor: Arc<dyn TimeFactorStrategy>,
        fallback_baseline_views: f64,
    ) -> Self {
        Self {
            catalog,
            time_factor,
            fallback_baseline_views,
        }
    }

    /// Engine over the embedded catalog with the default time-factor rule.
    pub fn with_builtin_catalog(kind: TimeFactorKind) -> Self {
        Self::new(
            Arc::new(NicheCatalog::builtin().clone()),
            kind.strategy(),
            DEFAULT_FALLBACK_BASELINE_VIEWS,
        )
    }

    pub fn time_factor_name(&self) -> &'static str {
        self.time_factor.name()
    }

    /// Quotes terms for `model`. FIXED prices are raised to `floor`.
    pub fn quote(&self, input: &PricingInput, model: PricingModel, floor: Price) -> PriceTerms {
        match self.compute(input, model, floor) {
            Ok(terms) => terms,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    category = %input.category_id,
                    "Pricing computation failed; returning zeroed terms"
                );
                PriceTerms::zeroed(model)
            }
        }
    }

    fn compute(
        &self,
        input: &PricingInput,
        model: PricingModel,
        floor: Price,
    ) -> Result<PriceTerms, PricingError> {
        let breakdown = self.share(input)?;
        let effective_rpm = self.catalog.effective_rpm(&input.category_id, input.month0);
        finite("effective_rpm", effective_rpm)?;

        let raw = match model {
            PricingModel::Fixed => {
                let baseline = self.baseline_views(input);
                baseline * breakdown.share * effective_rpm / 1000.0
            }
            PricingModel::Metered => breakdown.share * effective_rpm,
        };
        finite("price_value", raw)?;

        let price = Price::try_new(raw.max(0.0)).map_err(|_| PricingError::NonFinite("price_value"))?;
        let price_value = match model {
            PricingModel::Fixed => price.max(floor),
            PricingModel::Metered => price,
        };

        Ok(PriceTerms {
            pricing_model: model,
            share: breakdown.share,
            content_score: breakdown.content_score,
            discount_factor: breakdown.discount_factor,
            time_factor: breakdown.time_factor,
            effective_rpm,
            price_value,
        })
    }

    fn share(&self, input: &PricingInput) -> Result<ShareBreakdown, PricingError> {
        finite("views_licensee", input.views_licensee)?;
        finite("views_licensor", input.views_licensor)?;
        finite("duration_licensee_secs", input.duration_licensee_secs)?;
        finite("duration_licensor_secs", input.duration_licensor_secs)?;
        finite("usage_fraction", input.usage_fraction)?;
        finite("days_since_upload", input.days_since_upload)?;

        let duration_licensee = input.duration_licensee_secs.max(MIN_LICENSEE_DURATION_SECS);
        let duration_licensor = input.duration_licensor_secs.max(0.0);
        let views_licensor = input.views_licensor.max(MIN_LICENSOR_VIEWS);
        let views_licensee = input.views_licensee.max(0.0);
        let usage = input.usage_fraction.clamp(0.0, 1.0);

        let time_factor = self.time_factor.factor(input.days_since_upload);
        let content_score =
            CONTENT_WEIGHT * usage * (duration_licensor / duration_licensee) * time_factor;

        let ratio = views_licensee / views_licensor;
        let discount_factor = if ratio > 1.0 {
            1.0 / (1.0 + ratio.log10())
        } else {
            1.0
        };

        let share = content_score * discount_factor;
        finite("share", share)?;

        Ok(ShareBreakdown {
            share: share.clamp(0.0, 1.0),
            content_score,
            discount_factor,
            time_factor,
        })
    }

    fn baseline_views(&self, input: &PricingInput) -> f64 {
        input
            .baseline_views
            .filter(|v| v.is_finite() && *v > 0.0)
            .or_else(|| Some(input.views_licensor).filter(|v| v.is_finite() && *v > 0.0))
            .unwrap_or(self.fallback_baseline_views)
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), PricingError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PricingError::NonFinite(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::{LinearDecayTimeFactor, StepTimeFactor};
    use proptest::prelude::*;

    fn engine() -> PricingEngine {
        PricingEngine::with_builtin_catalog(TimeFactorKind::LinearDecay)
    }

    fn reference_input() -> PricingInput {
        PricingInput {
            views_licensee: 50_000.0,
            views_licensor: 100_000.0,
            duration_licensee_secs: 600.0,
            duration_licensor_secs: 600.0,
            usage_fraction: 0.5,
            days_since_upload: 15.0,
            category_id: "entertainment".to_string(),
            baseline_views: None,
            month0: 4,
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Reference examples
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn audit_ref_names_the_factors() {
        let terms = engine().quote(&reference_input(), PricingModel::Metered, Price::ZERO);

        assert_eq!(
            terms.audit_ref("entertainment"),
            "fair-share/v1?category=entertainment&content=0.250000&discount=1.000000&time=1.000000&rpm=4.680000"
        );
    }

    #[test]
    fn reference_example_metered() {
        let terms = engine().quote(&reference_input(), PricingModel::Metered, Price::ZERO);

        assert!((terms.content_score - 0.25).abs() < 1e-12);
        assert_eq!(terms.discount_factor, 1.0);
        assert!((terms.share - 0.25).abs() < 1e-12);
        assert!((terms.effective_rpm - 4.68).abs() < 1e-12);
        assert!((terms.price_value.value() - 1.17).abs() < 1e-9);
    }

    #[test]
    fn metered_ignores_floor() {
        let floor = Price::try_new(50.0).unwrap();
        let terms = engine().quote(&reference_input(), PricingModel::Metered, floor);
        assert!((terms.price_value.value() - 1.17).abs() < 1e-9);
    }

    #[test]
    fn fixed_uses_current_views_as_baseline() {
        // 100_000 * 0.25 * 4.68 / 1000
        let terms = engine().quote(&reference_input(), PricingModel::Fixed, Price::ZERO);
        assert!((terms.price_value.value() - 117.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_prefers_category_average_baseline() {
        let mut input = reference_input();
        input.baseline_views = Some(20_000.0);
        let terms = engine().quote(&input, PricingModel::Fixed, Price::ZERO);
        assert!((terms.price_value.value() - 23.4).abs() < 1e-9);
    }

    #[test]
    fn fixed_falls_back_to_default_baseline() {
        let mut input = reference_input();
        input.views_licensor = 0.0;
        input.views_licensee = 0.0;
        let terms = engine().quote(&input, PricingModel::Fixed, Price::ZERO);
        // 10_000 * 0.25 * 4.68 / 1000
        assert!((terms.price_value.value() - 11.7).abs() < 1e-9);
    }

    #[test]
    fn fixed_is_raised_to_floor() {
        let floor = Price::try_new(500.0).unwrap();
        let terms = engine().quote(&reference_input(), PricingModel::Fixed, floor);
        assert_eq!(terms.price_value, floor);
    }

    #[test]
    fn larger_licensee_reach_discounts_share() {
        let mut input = reference_input();
        input.views_licensee = 1_000_000.0;
        let terms = engine().quote(&input, PricingModel::Metered, Price::ZERO);
        // ratio 10 => 1 / (1 + 1)
        assert!((terms.discount_factor - 0.5).abs() < 1e-12);
        assert!((terms.share - 0.125).abs() < 1e-12);
    }

    #[test]
    fn share_is_clamped_to_one() {
        let mut input = reference_input();
        input.duration_licensee_secs = 0.0;
        let terms = engine().quote(&input, PricingModel::Metered, Price::ZERO);
        assert_eq!(terms.share, 1.0);
    }

    #[test]
    fn non_finite_input_yields_zeroed_terms() {
        let mut input = reference_input();
        input.views_licensee = f64::NAN;
        let terms = engine().quote(&input, PricingModel::Fixed, Price::try_new(10.0).unwrap());
        assert_eq!(terms, PriceTerms::zeroed(PricingModel::Fixed));
    }

    #[test]
    fn strategies_differ_on_day_three() {
        let mut input = reference_input();
        input.days_since_upload = 3.0;
        let catalog = Arc::new(NicheCatalog::builtin().clone());
        let linear = PricingEngine::new(catalog.clone(), Arc::new(LinearDecayTimeFactor), 10_000.0);
        let step = PricingEngine::new(catalog, Arc::new(StepTimeFactor), 10_000.0);

        let a = linear.quote(&input, PricingModel::Metered, Price::ZERO);
        let b = step.quote(&input, PricingModel::Metered, Price::ZERO);
        assert!(a.time_factor > b.time_factor);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Properties
    // ════════════════════════════════════════════════════════════════════════════

    fn arb_input() -> impl Strategy<Value = PricingInput> {
        (
            prop_oneof![Just(0.0), 0.0..1e12f64],
            prop_oneof![Just(0.0), 0.0..1e12f64],
            prop_oneof![Just(0.0), 0.0..36_000.0f64],
            prop_oneof![Just(0.0), 0.0..36_000.0f64],
            0.0..=1.0f64,
            -10.0..5_000.0f64,
            0u32..12,
        )
            .prop_map(|(vl, vr, dl, dr, usage, days, month0)| PricingInput {
                views_licensee: vl,
                views_licensor: vr,
                duration_licensee_secs: dl,
                duration_licensor_secs: dr,
                usage_fraction: usage,
                days_since_upload: days,
                category_id: "gaming".to_string(),
                baseline_views: None,
                month0,
            })
    }

    proptest! {
        #[test]
        fn share_is_always_within_unit_interval(input in arb_input()) {
            for kind in [TimeFactorKind::LinearDecay, TimeFactorKind::Step] {
                let terms = PricingEngine::with_builtin_catalog(kind)
                    .quote(&input, PricingModel::Metered, Price::ZERO);
                prop_assert!((0.0..=1.0).contains(&terms.share));
                prop_assert!(terms.price_value.value() >= 0.0);
            }
        }

        #[test]
        fn share_non_increasing_in_age(input in arb_input(), extra in 0.0..1_000.0f64) {
            for kind in [TimeFactorKind::LinearDecay, TimeFactorKind::Step] {
                let engine = PricingEngine::with_builtin_catalog(kind);
                let mut older = input.clone();
                older.days_since_upload = input.days_since_upload + extra;
                let a = engine.quote(&input, PricingModel::Metered, Price::ZERO);
                let b = engine.quote(&older, PricingModel::Metered, Price::ZERO);
                prop_assert!(b.share <= a.share + 1e-12);
            }
        }

        #[test]
        fn share_non_increasing_in_reach_ratio(
            input in arb_input(),
            ratio in 1.0..1e6f64,
            growth in 1.0..100.0f64,
        ) {
            let engine = engine();
            let mut lower = input.clone();
            lower.views_licensor = 1_000.0;
            lower.views_licensee = 1_000.0 * ratio;
            let mut higher = lower.clone();
            higher.views_licensee = lower.views_licensee * growth;

            let a = engine.quote(&lower, PricingModel::Metered, Price::ZERO);
            let b = engine.quote(&higher, PricingModel::Metered, Price::ZERO);
            prop_assert!(b.share <= a.share + 1e-12);
        }
    }
}
