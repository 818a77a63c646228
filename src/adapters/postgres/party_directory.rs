//! PostgreSQL implementation of PartyDirectory.
//!
//! Rows in `party_billing` are maintained by the onboarding flow; the
//! contract engine only writes the billing customer it creates at checkout.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::contract::LicensorPolicy;
use crate::domain::foundation::{DomainError, Price, UserId};
use crate::ports::PartyDirectory;

pub struct PostgresPartyDirectory {
    pool: PgPool,
}

impl PostgresPartyDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn optional_column(
        &self,
        column: &str,
        user_id: &UserId,
    ) -> Result<Option<String>, DomainError> {
        let sql = format!("SELECT {} FROM party_billing WHERE user_id = $1", column);
        let row: Option<(Option<String>,)> = sqlx::query_as(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to read {}: {}", column, e)))?;
        Ok(row.and_then(|(value,)| value))
    }
}

#[async_trait]
impl PartyDirectory for PostgresPartyDirectory {
    async fn payout_account(&self, licensor_id: &UserId) -> Result<Option<String>, DomainError> {
        self.optional_column("payout_account_id", licensor_id).await
    }

    async fn billing_customer(&self, user_id: &UserId) -> Result<Option<String>, DomainError> {
        self.optional_column("billing_customer_id", user_id).await
    }

    async fn save_billing_customer(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO party_billing (user_id, billing_customer_id, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET billing_customer_id = EXCLUDED.billing_customer_id, updated_at = NOW()
            "#,
        )
        .bind(user_id.as_str())
        .bind(customer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to save billing customer: {}", e)))?;
        Ok(())
    }

    async fn email(&self, user_id: &UserId) -> Result<Option<String>, DomainError> {
        self.optional_column("email", user_id).await
    }

    async fn licensor_policy(&self, licensor_id: &UserId) -> Result<LicensorPolicy, DomainError> {
        let row: Option<(bool, f64)> = sqlx::query_as(
            "SELECT auto_accept, floor_price FROM party_billing WHERE user_id = $1",
        )
        .bind(licensor_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to read licensor policy: {}", e)))?;

        match row {
            Some((auto_accept, floor)) => {
                let floor = Price::try_new(floor).map_err(|e| {
                    DomainError::database(format!("Invalid stored floor_price: {}", e))
                })?;
                Ok(LicensorPolicy::new(auto_accept, floor))
            }
            None => Ok(LicensorPolicy::default()),
        }
    }

    async fn average_views(
        &self,
        licensor_id: &UserId,
        category_id: &str,
    ) -> Result<Option<f64>, DomainError> {
        let row: Option<(f64,)> = sqlx::query_as(
            r#"
            SELECT average_views FROM party_category_views
            WHERE user_id = $1 AND category_id = $2
            "#,
        )
        .bind(licensor_id.as_str())
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to read average views: {}", e)))?;
        Ok(row.map(|(views,)| views))
    }
}
