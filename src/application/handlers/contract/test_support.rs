//! Shared fixtures for contract handler tests.

use std::sync::Arc;

use crate::adapters::memory::{InMemoryContractStore, InMemoryPartyDirectory};
use crate::domain::contract::{
    Contract, ContractStatus, FairShare, LicenceRequest, LicensorPolicy, NewContract,
    VideoSnapshot,
};
use crate::domain::foundation::{ContractId, Price, Timestamp, UserId, VideoId};
use crate::domain::pricing::{PricingInput, PricingModel};

pub fn licensor() -> UserId {
    UserId::new("licensor-1").unwrap()
}

pub fn licensee() -> UserId {
    UserId::new("licensee-1").unwrap()
}

pub fn request(model: PricingModel) -> LicenceRequest {
    LicenceRequest {
        id: ContractId::new(),
        licensor_id: licensor(),
        licensee_id: licensee(),
        original_video: VideoSnapshot {
            video_id: VideoId::new("orig-1").unwrap(),
            title: "Original".to_string(),
            url: "https://video.example/orig-1".to_string(),
            duration_secs: 600.0,
        },
        reaction_video_id: Some(VideoId::new("react-1").unwrap()),
        pricing_model: model,
        currency: "usd".to_string(),
    }
}

/// Half of a ten-minute original, two weeks after upload.
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

/// Already-priced terms for building contracts directly.
pub fn terms(model: PricingModel) -> NewContract {
    request(model).priced(
        Price::try_new(25.0).unwrap(),
        FairShare::new(0.25, "fair-share/orig-1").unwrap(),
    )
}

/// FIXED contract forced into `status`.
pub fn contract_in(status: ContractStatus) -> Contract {
    let (mut contract, _) = Contract::create(
        terms(PricingModel::Fixed),
        &LicensorPolicy::default(),
        Timestamp::now(),
    )
    .unwrap();
    contract.status = status;
    if status != ContractStatus::PendingReview {
        contract.accepted_by_licensor = true;
    }
    contract
}

/// METERED contract forced into `status`, with subscription linkage once paid.
pub fn metered_contract_in(status: ContractStatus) -> Contract {
    let (mut contract, _) = Contract::create(
        terms(PricingModel::Metered),
        &LicensorPolicy::default(),
        Timestamp::now(),
    )
    .unwrap();
    contract.status = status;
    contract.accepted_by_licensor = status != ContractStatus::PendingReview;
    if status.is_payment_confirmed() || status == ContractStatus::Cancelled {
        contract.session_id = Some("cs_seed".to_string());
        contract.subscription_id = Some("sub_seed".to_string());
        contract.customer_id = Some("cus_seed".to_string());
    }
    contract
}

pub fn seeded_store(contract: Contract) -> (Arc<InMemoryContractStore>, ContractId) {
    let store = Arc::new(InMemoryContractStore::new());
    let id = contract.id;
    store.put(contract);
    (store, id)
}

/// Directory where the test licensor is onboarded for payouts.
pub fn onboarded_parties() -> Arc<InMemoryPartyDirectory> {
    let parties = Arc::new(InMemoryPartyDirectory::new());
    parties.set_payout_account(&licensor(), "acct_licensor");
    parties.set_email(&licensee(), "licensee@example.com");
    parties
}
