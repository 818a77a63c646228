//! In-memory party directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::lock;
use crate::domain::contract::LicensorPolicy;
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::PartyDirectory;

#[derive(Debug, Clone, Default)]
struct PartyRecord {
    payout_account: Option<String>,
    billing_customer: Option<String>,
    email: Option<String>,
    policy: LicensorPolicy,
    average_views: HashMap<String, f64>,
}

/// Party settings keyed by user id. Unknown users have no settings.
#[derive(Default)]
pub struct InMemoryPartyDirectory {
    parties: Mutex<HashMap<UserId, PartyRecord>>,
}

impl InMemoryPartyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, user_id: &UserId, f: impl FnOnce(&mut PartyRecord)) {
        let mut parties = lock(&self.parties);
        f(parties.entry(user_id.clone()).or_default());
    }

    pub fn set_payout_account(&self, licensor_id: &UserId, account: impl Into<String>) {
        let account = account.into();
        self.update(licensor_id, |p| p.payout_account = Some(account));
    }

    pub fn set_email(&self, user_id: &UserId, email: impl Into<String>) {
        let email = email.into();
        self.update(user_id, |p| p.email = Some(email));
    }

    pub fn set_policy(&self, licensor_id: &UserId, policy: LicensorPolicy) {
        self.update(licensor_id, |p| p.policy = policy);
    }

    pub fn set_average_views(&self, licensor_id: &UserId, category_id: &str, views: f64) {
        let category_id = category_id.to_string();
        self.update(licensor_id, |p| {
            p.average_views.insert(category_id, views);
        });
    }

    /// Billing customer recorded for a user, bypassing the port.
    pub fn stored_billing_customer(&self, user_id: &UserId) -> Option<String> {
        lock(&self.parties)
            .get(user_id)
            .and_then(|p| p.billing_customer.clone())
    }

    fn read<T>(&self, user_id: &UserId, f: impl FnOnce(&PartyRecord) -> T) -> Option<T> {
        lock(&self.parties).get(user_id).map(f)
    }
}

#[async_trait]
impl PartyDirectory for InMemoryPartyDirectory {
    async fn payout_account(&self, licensor_id: &UserId) -> Result<Option<String>, DomainError> {
        Ok(self
            .read(licensor_id, |p| p.payout_account.clone())
            .flatten())
    }

    async fn billing_customer(&self, user_id: &UserId) -> Result<Option<String>, DomainError> {
        Ok(self.stored_billing_customer(user_id))
    }

    async fn save_billing_customer(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError> {
        let customer_id = customer_id.to_string();
        self.update(user_id, |p| p.billing_customer = Some(customer_id));
        Ok(())
    }

    async fn email(&self, user_id: &UserId) -> Result<Option<String>, DomainError> {
        Ok(self.read(user_id, |p| p.email.clone()).flatten())
    }

    async fn licensor_policy(&self, licensor_id: &UserId) -> Result<LicensorPolicy, DomainError> {
        Ok(self.read(licensor_id, |p| p.policy).unwrap_or_default())
    }

    async fn average_views(
        &self,
        licensor_id: &UserId,
        category_id: &str,
    ) -> Result<Option<f64>, DomainError> {
        Ok(self
            .read(licensor_id, |p| p.average_views.get(category_id).copied())
            .flatten())
    }
}
