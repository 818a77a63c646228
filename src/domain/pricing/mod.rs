//! Pricing domain module.
//!
//! Pure computation of fair-share price terms.
//!
//! # Module Structure
//!
//! - `engine` - PricingEngine and its inputs/outputs
//! - `niche` - Category reference data and seasonality
//! - `time_factor` - Pluggable content-age multiplier
//! - `model` - FIXED / METERED billing shape

mod engine;
mod model;
mod niche;
mod time_factor;

pub use engine::{PriceTerms, PricingEngine, PricingInput, DEFAULT_FALLBACK_BASELINE_VIEWS};
pub use model::PricingModel;
pub use niche::{NicheCatalog, NicheProfile, SeasonalityTable};
pub use time_factor::{
    LinearDecayTimeFactor, StepTimeFactor, TimeFactorKind, TimeFactorStrategy,
};
