//! StartCheckoutHandler - Opens a gateway checkout session for an accepted contract.
//!
//! FIXED contracts get a one-time charge with a flat platform fee. METERED
//! contracts get a subscription on a per-contract metered price, billed to
//! the licensee's gateway customer, with a percentage fee on each invoice.
//! Every creating call carries an idempotency key derived from the
//! contract, so a retried request never opens a second session.

use std::sync::Arc;

use super::apply_gateway_fact::GatewayFactApplier;
use super::commit::{commit_with_retry, Staged};
use super::session_facts::fact_from_session;
use crate::domain::contract::{Contract, ContractError, ContractStatus, Party};
use crate::domain::foundation::{ContractId, Percentage, Timestamp, UserId};
use crate::domain::pricing::PricingModel;
use crate::ports::{
    CheckoutMode, CheckoutSessionStatus, ContractRepository, CreateCheckoutRequest,
    CreateCustomerRequest, CreateMeteredPriceRequest, PartyDirectory, PaymentProvider,
};

/// Platform settings applied to every checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Base URL the gateway redirects back to.
    pub app_base_url: String,
    pub platform_fee: Percentage,
}

impl CheckoutSettings {
    fn success_url(&self, id: &ContractId) -> String {
        format!(
            "{}/contracts/{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.app_base_url.trim_end_matches('/'),
            id
        )
    }

    fn cancel_url(&self, id: &ContractId) -> String {
        format!(
            "{}/contracts/{}/checkout/cancel",
            self.app_base_url.trim_end_matches('/'),
            id
        )
    }
}

#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    pub contract_id: ContractId,
    pub requested_by: UserId,
}

#[derive(Debug, Clone)]
pub struct StartCheckoutResult {
    pub contract_id: ContractId,
    pub session_id: String,
    /// Where to send the licensee.
    pub checkout_url: String,
    /// True when an open session from an earlier call was returned.
    pub reused: bool,
}

pub struct StartCheckoutHandler {
    contracts: Arc<dyn ContractRepository>,
    parties: Arc<dyn PartyDirectory>,
    payment_provider: Arc<dyn PaymentProvider>,
    applier: GatewayFactApplier,
    settings: CheckoutSettings,
}

impl StartCheckoutHandler {
    pub fn new(
        contracts: Arc<dyn ContractRepository>,
        parties: Arc<dyn PartyDirectory>,
        payment_provider: Arc<dyn PaymentProvider>,
        settings: CheckoutSettings,
    ) -> Self {
        let applier = GatewayFactApplier::new(contracts.clone());
        Self {
            contracts,
            parties,
            payment_provider,
            applier,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: StartCheckoutCommand,
    ) -> Result<StartCheckoutResult, ContractError> {
        // 1. Load and check the contract is payable
        let contract = self
            .contracts
            .find_by_id(&cmd.contract_id)
            .await?
            .ok_or(ContractError::NotFound(cmd.contract_id))?;
        contract.check_party(&cmd.requested_by, Party::Licensee, "pay for")?;
        ensure_payable(&contract)?;

        // 2. An earlier session may still be usable, or may already be paid
        if let Some(session_id) = contract.session_id.clone() {
            if let Some(result) = self.resume_session(&contract, &session_id).await? {
                return Ok(result);
            }
        }

        // 3. Payout routing is mandatory
        let destination_account = self
            .parties
            .payout_account(&contract.licensor_id)
            .await?
            .ok_or_else(|| ContractError::PayoutAccountMissing(contract.licensor_id.clone()))?;

        // 4. Billing shape per pricing model
        let mode = match contract.pricing_model {
            PricingModel::Fixed => {
                let amount_minor = contract.price_value.to_minor_units();
                CheckoutMode::OneTime {
                    amount_minor,
                    currency: contract.currency.clone(),
                    product_name: product_name(&contract),
                    application_fee_minor: self.settings.platform_fee.of_minor_units(amount_minor),
                }
            }
            PricingModel::Metered => self.metered_mode(&contract).await?,
        };

        // 5. Open the session
        let session = self
            .payment_provider
            .create_checkout_session(CreateCheckoutRequest {
                contract_id: contract.id,
                mode,
                destination_account,
                success_url: self.settings.success_url(&contract.id),
                cancel_url: self.settings.cancel_url(&contract.id),
                idempotency_key: format!("checkout-{}", contract.id),
            })
            .await?;

        // 6. Remember it so webhooks and the sweeper can find the contract
        let session_id = session.id.clone();
        commit_with_retry(self.contracts.as_ref(), contract.id, |current| {
            let transition = current.record_checkout_session(session_id.clone(), Timestamp::now())?;
            Ok((Staged::from_transition(transition), ()))
        })
        .await?;

        tracing::info!(
            contract_id = %contract.id,
            session_id = %session.id,
            pricing_model = contract.pricing_model.as_str(),
            "Checkout session created"
        );

        Ok(StartCheckoutResult {
            contract_id: contract.id,
            session_id: session.id,
            checkout_url: session.url,
            reused: false,
        })
    }

    /// Returns the open session, or settles a finished one and explains why
    /// no new session is opened. `None` means a new session is needed.
    async fn resume_session(
        &self,
        contract: &Contract,
        session_id: &str,
    ) -> Result<Option<StartCheckoutResult>, ContractError> {
        let session = self
            .payment_provider
            .retrieve_checkout_session(session_id)
            .await?;

        if let (CheckoutSessionStatus::Open, Some(url)) = (session.status, session.url.clone()) {
            tracing::debug!(contract_id = %contract.id, session_id, "Reusing open checkout session");
            return Ok(Some(StartCheckoutResult {
                contract_id: contract.id,
                session_id: session.id,
                checkout_url: url,
                reused: true,
            }));
        }
        if session.status == CheckoutSessionStatus::Open {
            return Ok(None);
        }

        let Some(fact) = fact_from_session(contract, &session) else {
            return Err(ContractError::payment_provider(
                "checkout completed and payment is still processing",
                true,
            ));
        };
        let applied = self.applier.apply(contract.id, &fact).await?;
        let current = applied.contract();
        if current.status.is_payment_confirmed() {
            Err(ContractError::already_settled(current.id, current.status))
        } else {
            Err(ContractError::invalid_state(current.status, "start checkout for"))
        }
    }

    async fn metered_mode(&self, contract: &Contract) -> Result<CheckoutMode, ContractError> {
        let customer_id = self.billing_customer(contract).await?;
        let price = self
            .payment_provider
            .create_metered_price(CreateMeteredPriceRequest {
                contract_id: contract.id,
                product_name: product_name(contract),
                unit_amount_minor: contract.price_value.to_minor_units(),
                currency: contract.currency.clone(),
                idempotency_key: format!("price-{}", contract.id),
            })
            .await?;

        Ok(CheckoutMode::Subscription {
            customer_id,
            price_id: price.id,
            application_fee_percent: self.settings.platform_fee,
        })
    }

    /// Licensee's gateway customer, created on first use.
    async fn billing_customer(&self, contract: &Contract) -> Result<String, ContractError> {
        if let Some(existing) = self.parties.billing_customer(&contract.licensee_id).await? {
            return Ok(existing);
        }

        let email = self.parties.email(&contract.licensee_id).await?;
        let customer = self
            .payment_provider
            .create_customer(CreateCustomerRequest {
                user_id: contract.licensee_id.clone(),
                email,
                idempotency_key: format!("customer-{}", contract.licensee_id),
            })
            .await?;
        self.parties
            .save_billing_customer(&contract.licensee_id, &customer.id)
            .await?;

        tracing::info!(
            user_id = %contract.licensee_id,
            customer_id = %customer.id,
            "Billing customer created"
        );
        Ok(customer.id)
    }
}

fn ensure_payable(contract: &Contract) -> Result<(), ContractError> {
    if contract.status.is_payment_confirmed() {
        return Err(ContractError::already_settled(contract.id, contract.status));
    }
    if contract.status != ContractStatus::PendingPayment {
        return Err(ContractError::invalid_state(contract.status, "start checkout for"));
    }
    if contract.reaction_video_id.is_none() {
        return Err(ContractError::MissingReactionVideo(contract.id));
    }
    Ok(())
}

fn product_name(contract: &Contract) -> String {
    format!("Reaction license: {}", contract.original_video.title)
}
