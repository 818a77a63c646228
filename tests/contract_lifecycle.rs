//! End-to-end contract lifecycle against in-memory adapters.
//!
//! Drives the command handlers in the order a licensee and licensor would:
//! request, review, checkout, payment, metering.

mod common;

use serde_json::json;

use reaction_licensing::application::handlers::contract::{
    HandlePaymentWebhookResult, RejectContractCommand, RejectContractHandler, ReportUsageCommand,
    ReportUsageHandler, WithdrawContractCommand, WithdrawContractHandler, WithdrawContractResult,
};
use reaction_licensing::domain::contract::{ContractError, ContractStatus, LicensorPolicy};
use reaction_licensing::domain::foundation::Price;
use reaction_licensing::domain::pricing::PricingModel;
use reaction_licensing::ports::CheckoutSessionStatus;

use common::{licence_request, licensee, licensor, one_time_completed, webhook, World};

#[tokio::test]
async fn fixed_contract_is_paid_once() {
    let world = World::new();

    let created = world.create(licence_request(PricingModel::Fixed, "react-1")).await;
    assert_eq!(created.status, ContractStatus::PendingReview);

    let accepted = world.accept(created.id).await;
    assert_eq!(accepted.status, ContractStatus::PendingPayment);

    let checkout = world.start_checkout(created.id).await;
    assert!(!checkout.reused);
    assert!(checkout.checkout_url.starts_with("https://"));

    let result = world
        .webhook_handler()
        .handle(one_time_completed("evt_1", created.id, &checkout.session_id))
        .await
        .unwrap();
    assert!(matches!(result, HandlePaymentWebhookResult::Applied(ref c) if c.status == ContractStatus::Paid));

    // Redelivery changes nothing
    let again = world
        .webhook_handler()
        .handle(one_time_completed("evt_1", created.id, &checkout.session_id))
        .await
        .unwrap();
    assert!(matches!(again, HandlePaymentWebhookResult::Duplicate));
    assert_eq!(world.store.revenue_for(&created.id).len(), 1);
    assert_eq!(
        world.store.contract(&created.id).unwrap().status,
        ContractStatus::Paid
    );
}

#[tokio::test]
async fn checkout_is_reused_while_open() {
    let world = World::new();
    let (id, session_id) = world.awaiting_payment(PricingModel::Fixed).await;

    let second = world.start_checkout(id).await;

    assert!(second.reused);
    assert_eq!(second.session_id, session_id);
    assert_eq!(world.payments.call_count("create_checkout_session"), 1);
}

#[tokio::test]
async fn auto_accept_skips_review() {
    let world = World::new();
    world
        .parties
        .set_policy(&licensor(), LicensorPolicy::new(true, Price::try_new(0.0).unwrap()));

    let created = world.create(licence_request(PricingModel::Fixed, "react-1")).await;

    assert_eq!(created.status, ContractStatus::PendingPayment);
    assert!(created.accepted_by_licensor);
}

#[tokio::test]
async fn metered_contract_activates_and_reports_usage_deltas() {
    let world = World::new();
    let (id, session_id) = world.awaiting_payment(PricingModel::Metered).await;

    world.payments.complete_subscription_session(&session_id, "sub_1");
    let result = world
        .webhook_handler()
        .handle(webhook(
            "evt_1",
            "checkout.session.completed",
            json!({
                "id": session_id,
                "mode": "subscription",
                "status": "complete",
                "payment_status": "paid",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "contract_id": id.to_string() }
            }),
        ))
        .await
        .unwrap();
    assert!(matches!(result, HandlePaymentWebhookResult::Applied(ref c) if c.status == ContractStatus::Active));

    let usage = ReportUsageHandler::new(world.store.clone(), world.payments.clone());
    let report = |views| ReportUsageCommand {
        contract_id: id,
        requested_by: licensee(),
        new_view_count: views,
    };
    let first = usage.handle(report(1_000)).await.unwrap();
    let second = usage.handle(report(2_500)).await.unwrap();
    let stale = usage.handle(report(2_000)).await.unwrap();

    assert_eq!(first.reported_delta, 1_000);
    assert_eq!(second.reported_delta, 1_500);
    assert_eq!(stale.reported_delta, 0);
    assert_eq!(world.payments.usage_reports().len(), 2);
    assert_eq!(world.store.contract(&id).unwrap().last_reported_usage, 2_500);
}

#[tokio::test]
async fn failed_invoice_suspends_until_paid() {
    let world = World::new();
    let (id, session_id) = world.awaiting_payment(PricingModel::Metered).await;
    world.payments.complete_subscription_session(&session_id, "sub_1");
    let handler = world.webhook_handler();
    handler
        .handle(webhook(
            "evt_1",
            "checkout.session.completed",
            json!({
                "id": session_id,
                "mode": "subscription",
                "status": "complete",
                "payment_status": "paid",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "contract_id": id.to_string() }
            }),
        ))
        .await
        .unwrap();

    handler
        .handle(webhook(
            "evt_2",
            "invoice.payment_failed",
            json!({ "id": "in_1", "customer": "cus_1", "subscription": "sub_1", "amount_paid": 0, "currency": "usd" }),
        ))
        .await
        .unwrap();
    assert_eq!(
        world.store.contract(&id).unwrap().status,
        ContractStatus::PaymentFailed
    );

    handler
        .handle(webhook(
            "evt_3",
            "invoice.paid",
            json!({ "id": "in_1", "customer": "cus_1", "subscription": "sub_1", "amount_paid": 117, "currency": "usd" }),
        ))
        .await
        .unwrap();
    assert_eq!(world.store.contract(&id).unwrap().status, ContractStatus::Active);
    assert_eq!(world.store.revenue_for(&id).len(), 1);
}

#[tokio::test]
async fn open_request_blocks_duplicate() {
    let world = World::new();
    let first = world.create(licence_request(PricingModel::Fixed, "react-1")).await;

    let err = world
        .create_handler()
        .handle(licence_request(PricingModel::Fixed, "react-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ContractError::Duplicate { existing } if existing == first.id));
}

#[tokio::test]
async fn rejection_keeps_triple_blocked() {
    let world = World::new();
    let first = world.create(licence_request(PricingModel::Fixed, "react-1")).await;
    RejectContractHandler::new(world.store.clone())
        .handle(RejectContractCommand {
            contract_id: first.id,
            requested_by: licensor(),
        })
        .await
        .unwrap();

    let err = world
        .create_handler()
        .handle(licence_request(PricingModel::Fixed, "react-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ContractError::Duplicate { existing } if existing == first.id));
}

#[tokio::test]
async fn withdrawal_frees_triple() {
    let world = World::new();
    let first = world.create(licence_request(PricingModel::Fixed, "react-1")).await;
    let withdrawn = WithdrawContractHandler::new(world.store.clone(), world.payments.clone())
        .handle(WithdrawContractCommand {
            contract_id: first.id,
            requested_by: licensee(),
        })
        .await
        .unwrap();
    assert!(matches!(withdrawn, WithdrawContractResult::Withdrawn(ref u) if u.contract.status == ContractStatus::Withdrawn));

    let retry = world
        .create_handler()
        .handle(licence_request(PricingModel::Fixed, "react-1"))
        .await
        .unwrap();

    assert!(!retry.replayed);
    assert_ne!(retry.contract.id, first.id);
}

#[tokio::test]
async fn withdrawal_after_checkout_deletes_contract() {
    let world = World::new();
    let (id, session_id) = world.awaiting_payment(PricingModel::Fixed).await;

    let result = WithdrawContractHandler::new(world.store.clone(), world.payments.clone())
        .handle(WithdrawContractCommand {
            contract_id: id,
            requested_by: licensee(),
        })
        .await
        .unwrap();

    assert!(matches!(result, WithdrawContractResult::Deleted(deleted) if deleted == id));
    assert!(world.store.contract(&id).is_none());
    assert!(world.payments.was_called("expire_checkout_session"));
    assert_eq!(
        world.payments.session(&session_id).unwrap().status,
        CheckoutSessionStatus::Expired
    );
}

#[tokio::test]
async fn paid_contract_cannot_be_withdrawn() {
    let world = World::new();
    let (id, session_id) = world.awaiting_payment(PricingModel::Fixed).await;
    world
        .webhook_handler()
        .handle(one_time_completed("evt_1", id, &session_id))
        .await
        .unwrap();

    let err = WithdrawContractHandler::new(world.store.clone(), world.payments.clone())
        .handle(WithdrawContractCommand {
            contract_id: id,
            requested_by: licensee(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ContractError::AlreadySettled { .. }));
}
