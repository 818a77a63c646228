//! Party directory port - read access to licensor and licensee settings.
//!
//! Profiles are owned elsewhere; the contract engine only needs payout
//! routing, billing identity and licensing preferences.

use async_trait::async_trait;

use crate::domain::contract::LicensorPolicy;
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait PartyDirectory: Send + Sync {
    /// Connected payout account of a licensor, if onboarded.
    async fn payout_account(&self, licensor_id: &UserId) -> Result<Option<String>, DomainError>;

    /// Gateway customer id previously created for a licensee.
    async fn billing_customer(&self, user_id: &UserId) -> Result<Option<String>, DomainError>;

    async fn save_billing_customer(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError>;

    async fn email(&self, user_id: &UserId) -> Result<Option<String>, DomainError>;

    /// Licensing preferences in force now. Unknown licensors get the default policy.
    async fn licensor_policy(&self, licensor_id: &UserId) -> Result<LicensorPolicy, DomainError>;

    /// Licensor's average views in a category, used as the FIXED price baseline.
    async fn average_views(
        &self,
        licensor_id: &UserId,
        category_id: &str,
    ) -> Result<Option<f64>, DomainError>;
}
