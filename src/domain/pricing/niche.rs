//! Niche reference data: per-category demand and RPM, plus monthly seasonality.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BUILTIN_CATALOG: &str = include_str!("catalog.yaml");

/// Per-category monetisation profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NicheProfile {
    pub demand_factor: f64,
    /// Revenue per thousand views before seasonality.
    pub base_rpm: f64,
}

/// Month index (0..=11) to RPM multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeasonalityTable([f64; 12]);

impl SeasonalityTable {
    pub fn new(multipliers: [f64; 12]) -> Self {
        Self(multipliers)
    }

    /// A table that leaves RPM untouched all year.
    pub fn flat() -> Self {
        Self([1.0; 12])
    }

    /// Multiplier for a zero-based month. Out-of-range months get 1.0.
    pub fn multiplier(&self, month0: u32) -> f64 {
        self.0.get(month0 as usize).copied().unwrap_or(1.0)
    }
}

/// Immutable category catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NicheCatalog {
    niches: HashMap<String, NicheProfile>,
    fallback: NicheProfile,
    seasonality: SeasonalityTable,
}

static BUILTIN: Lazy<NicheCatalog> = Lazy::new(|| match NicheCatalog::from_yaml(BUILTIN_CATALOG) {
    Ok(catalog) => catalog,
    Err(e) => {
        tracing::error!(error = %e, "Embedded niche catalog is malformed; using fallback only");
        NicheCatalog::new(
            HashMap::new(),
            NicheProfile {
                demand_factor: 1.0,
                base_rpm: 4.0,
            },
            SeasonalityTable::flat(),
        )
    }
});

impl NicheCatalog {
    pub fn new(
        niches: HashMap<String, NicheProfile>,
        fallback: NicheProfile,
        seasonality: SeasonalityTable,
    ) -> Self {
        Self {
            niches,
            fallback,
            seasonality,
        }
    }

    /// Parses a catalog document.
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> &'static NicheCatalog {
        &BUILTIN
    }

    /// Looks up a category (case-insensitive), falling back to the general profile.
    pub fn profile(&self, category_id: &str) -> NicheProfile {
        let key = category_id.trim().to_ascii_lowercase();
        self.niches.get(&key).copied().unwrap_or(self.fallback)
    }

    /// Base RPM for the category scaled by the month's seasonality.
    pub fn effective_rpm(&self, category_id: &str, month0: u32) -> f64 {
        self.profile(category_id).base_rpm * self.seasonality.multiplier(month0)
    }

    pub fn seasonality(&self) -> &SeasonalityTable {
        &self.seasonality
    }
}
