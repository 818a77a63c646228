//! Fixtures shared by the integration tests.
//!
//! Everything here goes through the crate's public API with in-memory
//! adapters and the mock payment provider.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;

use reaction_licensing::adapters::memory::{
    InMemoryContractStore, InMemoryPartyDirectory, InMemoryWebhookEventRepository,
};
use reaction_licensing::adapters::stripe::MockPaymentProvider;
use reaction_licensing::application::handlers::contract::{
    AcceptContractCommand, AcceptContractHandler, CheckoutSettings, CreateContractCommand,
    CreateContractHandler, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
    StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult,
};
use reaction_licensing::domain::contract::{Contract, LicenceRequest, VideoSnapshot};
use reaction_licensing::domain::foundation::{ContractId, Percentage, UserId, VideoId};
use reaction_licensing::domain::pricing::{
    PricingEngine, PricingInput, PricingModel, TimeFactorKind,
};

pub fn licensor() -> UserId {
    UserId::new("licensor-1").unwrap()
}

pub fn licensee() -> UserId {
    UserId::new("licensee-1").unwrap()
}

/// Licence request for `reaction_video` of the shared original.
pub fn licence_request(model: PricingModel, reaction_video: &str) -> CreateContractCommand {
    CreateContractCommand {
        request: LicenceRequest {
            id: ContractId::new(),
            licensor_id: licensor(),
            licensee_id: licensee(),
            original_video: VideoSnapshot {
                video_id: VideoId::new("orig-1").unwrap(),
                title: "Original".to_string(),
                url: "https://video.example/orig-1".to_string(),
                duration_secs: 600.0,
            },
            reaction_video_id: Some(VideoId::new(reaction_video).unwrap()),
            pricing_model: model,
            currency: "usd".to_string(),
        },
        pricing: pricing_input(),
    }
}

pub fn pricing_input() -> PricingInput {
    PricingInput {
        views_licensee: 50_000.0,
        views_licensor: 100_000.0,
        duration_licensee_secs: 600.0,
        duration_licensor_secs: 600.0,
        usage_fraction: 0.5,
        days_since_upload: 15.0,
        category_id: "entertainment".to_string(),
        baseline_views: None,
        month0: 4,
    }
}

pub fn pricing_engine() -> Arc<PricingEngine> {
    Arc::new(PricingEngine::with_builtin_catalog(TimeFactorKind::LinearDecay))
}

pub fn checkout_settings() -> CheckoutSettings {
    CheckoutSettings {
        app_base_url: "https://app.example".to_string(),
        platform_fee: Percentage::try_new(10).unwrap(),
    }
}

/// In-memory world with the licensor onboarded for payouts.
pub struct World {
    pub store: Arc<InMemoryContractStore>,
    pub parties: Arc<InMemoryPartyDirectory>,
    pub payments: Arc<MockPaymentProvider>,
    pub webhook_events: Arc<InMemoryWebhookEventRepository>,
}

impl World {
    pub fn new() -> Self {
        let world = Self::without_payout_account();
        world.parties.set_payout_account(&licensor(), "acct_licensor");
        world
    }

    /// Licensor has not finished payout onboarding.
    pub fn without_payout_account() -> Self {
        let parties = Arc::new(InMemoryPartyDirectory::new());
        parties.set_email(&licensee(), "licensee@example.com");
        Self {
            store: Arc::new(InMemoryContractStore::new()),
            parties,
            payments: Arc::new(MockPaymentProvider::new()),
            webhook_events: Arc::new(InMemoryWebhookEventRepository::new()),
        }
    }

    pub fn create_handler(&self) -> CreateContractHandler {
        CreateContractHandler::new(self.store.clone(), self.parties.clone(), pricing_engine())
    }

    pub async fn create(&self, cmd: CreateContractCommand) -> Contract {
        self.create_handler().handle(cmd).await.unwrap().contract
    }

    pub async fn accept(&self, contract_id: ContractId) -> Contract {
        AcceptContractHandler::new(self.store.clone())
            .handle(AcceptContractCommand {
                contract_id,
                requested_by: licensor(),
            })
            .await
            .unwrap()
            .contract
    }

    pub async fn start_checkout(&self, contract_id: ContractId) -> StartCheckoutResult {
        StartCheckoutHandler::new(
            self.store.clone(),
            self.parties.clone(),
            self.payments.clone(),
            checkout_settings(),
        )
        .handle(StartCheckoutCommand {
            contract_id,
            requested_by: licensee(),
        })
        .await
        .unwrap()
    }

    /// Created, accepted and with an open checkout session.
    pub async fn awaiting_payment(&self, model: PricingModel) -> (ContractId, String) {
        let contract = self.create(licence_request(model, "react-1")).await;
        self.accept(contract.id).await;
        let checkout = self.start_checkout(contract.id).await;
        (contract.id, checkout.session_id)
    }

    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            self.store.clone(),
            self.payments.clone(),
            self.webhook_events.clone(),
        )
    }
}

/// Stripe-shaped webhook body around `object`.
pub fn webhook(
    event_id: &str,
    event_type: &str,
    object: serde_json::Value,
) -> HandlePaymentWebhookCommand {
    let payload = json!({
        "id": event_id,
        "type": event_type,
        "created": 1_704_067_200,
        "data": { "object": object },
        "livemode": false
    });
    HandlePaymentWebhookCommand {
        payload: serde_json::to_vec(&payload).unwrap(),
        signature: "t=1,v1=00".to_string(),
    }
}

pub fn one_time_completed(
    event_id: &str,
    contract_id: ContractId,
    session_id: &str,
) -> HandlePaymentWebhookCommand {
    webhook(
        event_id,
        "checkout.session.completed",
        json!({
            "id": session_id,
            "mode": "payment",
            "status": "complete",
            "payment_status": "paid",
            "amount_total": 2500,
            "currency": "usd",
            "metadata": { "contract_id": contract_id.to_string() }
        }),
    )
}
