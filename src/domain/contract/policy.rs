//! Licensor-configured contract policy.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Price;

/// Snapshot of a licensor's licensing preferences, read at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LicensorPolicy {
    /// Skip review and move new requests straight to payment.
    pub auto_accept: bool,
    /// Minimum FIXED price.
    pub floor_price: Price,
}

impl LicensorPolicy {
    pub fn new(auto_accept: bool, floor_price: Price) -> Self {
        Self {
            auto_accept,
            floor_price,
        }
    }
}
