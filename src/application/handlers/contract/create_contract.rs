//! CreateContractHandler - Command handler for licence requests.

use std::sync::Arc;

use crate::application::handlers::pricing::{QuotePriceHandler, QuotePriceQuery};
use crate::domain::contract::{Contract, ContractError, FairShare, LicenceRequest};
use crate::domain::foundation::Timestamp;
use crate::domain::pricing::{PricingEngine, PricingInput};
use crate::ports::{ContractRepository, InsertOutcome, PartyDirectory};

/// Command to request a licence. `request.id` is the caller's idempotency key.
#[derive(Debug, Clone)]
pub struct CreateContractCommand {
    pub request: LicenceRequest,
    /// Reach metrics the price and fair share are computed from.
    pub pricing: PricingInput,
}

#[derive(Debug, Clone)]
pub struct CreateContractResult {
    pub contract: Contract,
    /// True when an earlier request with the same id already created it.
    pub replayed: bool,
}

/// Handler for creating contracts.
///
/// Reads the licensor's policy, prices the request with the pricing
/// engine, builds the contract and inserts it. The store's uniqueness on
/// id and on the blocking triple decides races.
pub struct CreateContractHandler {
    contracts: Arc<dyn ContractRepository>,
    parties: Arc<dyn PartyDirectory>,
    quotes: QuotePriceHandler,
}

impl CreateContractHandler {
    pub fn new(
        contracts: Arc<dyn ContractRepository>,
        parties: Arc<dyn PartyDirectory>,
        engine: Arc<PricingEngine>,
    ) -> Self {
        let quotes = QuotePriceHandler::new(engine, parties.clone());
        Self {
            contracts,
            parties,
            quotes,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateContractCommand,
    ) -> Result<CreateContractResult, ContractError> {
        let request = cmd.request;

        // 1. Replay of a request that already landed
        if let Some(existing) = self.contracts.find_by_id(&request.id).await? {
            return replay(existing, &request);
        }

        // 2. Fast duplicate check; the insert below is authoritative
        if let Some(blocking) = self
            .contracts
            .find_blocking(
                &request.licensee_id,
                &request.original_video.video_id,
                request.reaction_video_id.as_ref(),
            )
            .await?
        {
            return Err(ContractError::duplicate(blocking.id));
        }

        // 3. Price and build under the licensor's current policy
        let policy = self.parties.licensor_policy(&request.licensor_id).await?;
        let category_id = cmd.pricing.category_id.clone();
        let quote = self
            .quotes
            .quote_under(
                &policy,
                QuotePriceQuery {
                    licensor_id: request.licensor_id.clone(),
                    pricing_model: request.pricing_model,
                    input: cmd.pricing,
                },
            )
            .await?;
        let fair_share = FairShare::new(quote.share, quote.audit_ref(&category_id))?;
        let terms = request.clone().priced(quote.price_value, fair_share);
        let (contract, events) = Contract::create(terms, &policy, Timestamp::now())?;

        // 4. Insert with its creation events
        match self.contracts.insert(&contract, &events).await? {
            InsertOutcome::Inserted => {
                tracing::info!(
                    contract_id = %contract.id,
                    licensor_id = %contract.licensor_id,
                    licensee_id = %contract.licensee_id,
                    status = %contract.status,
                    price = %contract.price_value,
                    "Contract created"
                );
                Ok(CreateContractResult {
                    contract,
                    replayed: false,
                })
            }
            InsertOutcome::IdTaken => {
                let existing = self
                    .contracts
                    .find_by_id(&request.id)
                    .await?
                    .ok_or(ContractError::ConcurrentModification(request.id))?;
                replay(existing, &request)
            }
            InsertOutcome::TripleTaken => {
                let blocking = self
                    .contracts
                    .find_blocking(
                        &request.licensee_id,
                        &request.original_video.video_id,
                        request.reaction_video_id.as_ref(),
                    )
                    .await?;
                match blocking {
                    Some(existing) => Err(ContractError::duplicate(existing.id)),
                    None => Err(ContractError::ConcurrentModification(request.id)),
                }
            }
        }
    }
}

fn replay(
    existing: Contract,
    request: &LicenceRequest,
) -> Result<CreateContractResult, ContractError> {
    if existing.same_triple(request) && existing.licensor_id == request.licensor_id {
        tracing::debug!(contract_id = %existing.id, "Contract creation replayed");
        Ok(CreateContractResult {
            contract: existing,
            replayed: true,
        })
    } else {
        Err(ContractError::IdConflict(request.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryContractStore, InMemoryPartyDirectory};
    use crate::domain::contract::{ContractStatus, LicensorPolicy};
    use crate::domain::foundation::{ContractId, Price, VideoId};
    use crate::domain::pricing::{PricingModel, TimeFactorKind};

    use super::super::test_support::{licensor, pricing_input, request};

    fn command(model: PricingModel) -> CreateContractCommand {
        CreateContractCommand {
            request: request(model),
            pricing: pricing_input(),
        }
    }

    fn handler() -> (
        CreateContractHandler,
        Arc<InMemoryContractStore>,
        Arc<InMemoryPartyDirectory>,
    ) {
        let store = Arc::new(InMemoryContractStore::new());
        let parties = Arc::new(InMemoryPartyDirectory::new());
        (
            CreateContractHandler::new(
                store.clone(),
                parties.clone(),
                Arc::new(PricingEngine::with_builtin_catalog(TimeFactorKind::LinearDecay)),
            ),
            store,
            parties,
        )
    }

    #[tokio::test]
    async fn creates_pending_review_by_default() {
        let (handler, store, _) = handler();

        let result = handler
            .handle(command(PricingModel::Fixed))
            .await
            .unwrap();

        assert!(!result.replayed);
        assert_eq!(result.contract.status, ContractStatus::PendingReview);
        assert!(result.contract.accepted_by_licensee);
        assert_eq!(store.contract_count(), 1);
        assert_eq!(
            store.outbox_event_types(&result.contract.id),
            vec!["contract.created.v1"]
        );
    }

    #[tokio::test]
    async fn auto_accept_policy_skips_review() {
        let (handler, _, parties) = handler();
        parties.set_policy(&licensor(), LicensorPolicy::new(true, Price::ZERO));

        let result = handler
            .handle(command(PricingModel::Fixed))
            .await
            .unwrap();

        assert_eq!(result.contract.status, ContractStatus::PendingPayment);
        assert!(result.contract.accepted_by_licensor);
        assert!(result.contract.licensor_accepted_at.is_some());
    }

    #[tokio::test]
    async fn fixed_price_is_raised_to_floor() {
        let (handler, _, parties) = handler();
        parties.set_policy(
            &licensor(),
            LicensorPolicy::new(false, Price::try_new(500.0).unwrap()),
        );

        let result = handler
            .handle(command(PricingModel::Fixed))
            .await
            .unwrap();

        assert_eq!(result.contract.price_value.value(), 500.0);
    }

    #[tokio::test]
    async fn second_request_for_blocked_triple_is_duplicate() {
        let (handler, _, _) = handler();
        let first = handler
            .handle(command(PricingModel::Fixed))
            .await
            .unwrap();

        let err = handler
            .handle(command(PricingModel::Metered))
            .await
            .unwrap_err();

        assert_eq!(err, ContractError::duplicate(first.contract.id));
    }

    #[tokio::test]
    async fn withdrawn_triple_can_be_requested_again() {
        let (handler, store, _) = handler();
        let first = handler
            .handle(command(PricingModel::Fixed))
            .await
            .unwrap();
        let mut withdrawn = first.contract.clone();
        withdrawn.status = ContractStatus::Withdrawn;
        store.put(withdrawn);

        let second = handler
            .handle(command(PricingModel::Fixed))
            .await
            .unwrap();

        assert_ne!(second.contract.id, first.contract.id);
    }

    #[tokio::test]
    async fn same_id_and_terms_replays() {
        let (handler, store, _) = handler();
        let cmd = command(PricingModel::Fixed);

        let first = handler.handle(cmd.clone()).await.unwrap();
        let second = handler.handle(cmd).await.unwrap();

        assert!(second.replayed);
        assert_eq!(second.contract.id, first.contract.id);
        assert_eq!(store.contract_count(), 1);
    }

    #[tokio::test]
    async fn same_id_for_other_triple_conflicts() {
        let (handler, _, _) = handler();
        let cmd = command(PricingModel::Fixed);
        let id: ContractId = cmd.request.id;
        handler.handle(cmd.clone()).await.unwrap();

        let mut other = cmd;
        other.request.reaction_video_id = Some(VideoId::new("react-2").unwrap());
        let err = handler.handle(other).await.unwrap_err();

        assert_eq!(err, ContractError::IdConflict(id));
    }

    #[tokio::test]
    async fn price_and_fair_share_come_from_the_engine() {
        let (handler, _, _) = handler();
        let engine = PricingEngine::with_builtin_catalog(TimeFactorKind::LinearDecay);
        let expected = engine.quote(&pricing_input(), PricingModel::Metered, Price::ZERO);

        let result = handler.handle(command(PricingModel::Metered)).await.unwrap();

        assert_eq!(result.contract.price_value, expected.price_value);
        assert!(result.contract.price_value.value() > 0.0);
        assert_eq!(result.contract.fair_share.score, expected.share);
        assert!(result
            .contract
            .fair_share
            .documentation_ref
            .starts_with("fair-share/v1?category=entertainment"));
    }

    #[tokio::test]
    async fn licensor_category_average_drives_fixed_price() {
        let (with_average, _, parties) = handler();
        parties.set_average_views(&licensor(), "entertainment", 1_000_000.0);
        let (without_average, _, _) = handler();

        let boosted = with_average.handle(command(PricingModel::Fixed)).await.unwrap();
        let plain = without_average
            .handle(command(PricingModel::Fixed))
            .await
            .unwrap();

        assert!(boosted.contract.price_value.value() > plain.contract.price_value.value());
    }
}
