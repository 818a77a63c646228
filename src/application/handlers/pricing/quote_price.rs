//! QuotePriceHandler - Prices a prospective licence.

use std::sync::Arc;

use crate::domain::contract::{ContractError, LicensorPolicy};
use crate::domain::foundation::UserId;
use crate::domain::pricing::{PriceTerms, PricingEngine, PricingInput, PricingModel};
use crate::ports::PartyDirectory;

#[derive(Debug, Clone)]
pub struct QuotePriceQuery {
    pub licensor_id: UserId,
    pub pricing_model: PricingModel,
    pub input: PricingInput,
}

/// Fills in licensor-side inputs (category baseline, floor price) and runs
/// the pricing engine.
pub struct QuotePriceHandler {
    engine: Arc<PricingEngine>,
    parties: Arc<dyn PartyDirectory>,
}

impl QuotePriceHandler {
    pub fn new(engine: Arc<PricingEngine>, parties: Arc<dyn PartyDirectory>) -> Self {
        Self { engine, parties }
    }

    pub async fn handle(&self, query: QuotePriceQuery) -> Result<PriceTerms, ContractError> {
        let policy = self.parties.licensor_policy(&query.licensor_id).await?;
        self.quote_under(&policy, query).await
    }

    /// Quote against a policy the caller already loaded.
    pub async fn quote_under(
        &self,
        policy: &LicensorPolicy,
        query: QuotePriceQuery,
    ) -> Result<PriceTerms, ContractError> {
        let mut input = query.input;
        if input.baseline_views.is_none() {
            input.baseline_views = self
                .parties
                .average_views(&query.licensor_id, &input.category_id)
                .await?;
        }

        let terms = self
            .engine
            .quote(&input, query.pricing_model, policy.floor_price);
        tracing::debug!(
            licensor_id = %query.licensor_id,
            category = %input.category_id,
            pricing_model = query.pricing_model.as_str(),
            share = terms.share,
            price = %terms.price_value,
            "Price quoted"
        );
        Ok(terms)
    }
}
