//! Billing shape of a contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// One-time flat price or recurring usage-proportional billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingModel {
    /// Single charge; price_value is the total.
    Fixed,
    /// Quarterly subscription; price_value is per 1,000 views.
    Metered,
}

impl PricingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingModel::Fixed => "FIXED",
            PricingModel::Metered => "METERED",
        }
    }
}

impl fmt::Display for PricingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingModel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIXED" => Ok(PricingModel::Fixed),
            "METERED" => Ok(PricingModel::Metered),
            other => Err(ValidationError::invalid_format(
                "pricing_model",
                format!("unknown pricing model '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays() {
        assert_eq!("FIXED".parse::<PricingModel>().unwrap(), PricingModel::Fixed);
        assert_eq!(PricingModel::Metered.to_string(), "METERED");
        assert!("fixed".parse::<PricingModel>().is_err());
    }

    #[test]
    fn serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&PricingModel::Metered).unwrap(),
            r#""METERED""#
        );
    }
}
