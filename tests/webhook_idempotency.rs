//! Webhook delivery semantics: redelivery, reordering and unknown events.
//!
//! The gateway delivers at least once and in no particular order. Each
//! scenario checks that contract state and revenue end up the same as
//! after a single clean delivery.

mod common;

use serde_json::json;

use reaction_licensing::adapters::stripe::WebhookVerifyMode;
use reaction_licensing::application::handlers::contract::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookResult,
};
use reaction_licensing::domain::contract::{ContractError, ContractStatus};
use reaction_licensing::domain::foundation::ContractId;
use reaction_licensing::domain::pricing::PricingModel;
use reaction_licensing::ports::WebhookDisposition;

use common::{one_time_completed, webhook, World};

fn invoice_paid(event_id: &str, invoice_id: &str) -> HandlePaymentWebhookCommand {
    webhook(
        event_id,
        "invoice.paid",
        json!({
            "id": invoice_id,
            "customer": "cus_1",
            "subscription": "sub_1",
            "amount_paid": 480,
            "currency": "usd"
        }),
    )
}

/// METERED contract whose subscription checkout has completed.
async fn active_subscription(world: &World) -> ContractId {
    let (id, session_id) = world.awaiting_payment(PricingModel::Metered).await;
    world.payments.complete_subscription_session(&session_id, "sub_1");
    world
        .webhook_handler()
        .handle(webhook(
            "evt_checkout",
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
    id
}

#[tokio::test]
async fn redelivery_is_short_circuited() {
    let world = World::new();
    let (id, session_id) = world.awaiting_payment(PricingModel::Fixed).await;
    let handler = world.webhook_handler();

    for _ in 0..3 {
        handler
            .handle(one_time_completed("evt_1", id, &session_id))
            .await
            .unwrap();
    }

    assert_eq!(world.store.revenue_for(&id).len(), 1);
    assert_eq!(world.webhook_events.len(), 1);
    assert_eq!(
        world.webhook_events.records()[0].disposition,
        WebhookDisposition::Applied
    );
}

#[tokio::test]
async fn same_invoice_under_new_event_ids_counts_once() {
    let world = World::new();
    let id = active_subscription(&world).await;
    let handler = world.webhook_handler();

    handler.handle(invoice_paid("evt_a", "in_1")).await.unwrap();
    let second = handler.handle(invoice_paid("evt_b", "in_1")).await.unwrap();
    handler.handle(invoice_paid("evt_c", "in_2")).await.unwrap();

    assert!(matches!(second, HandlePaymentWebhookResult::Unchanged(_)));
    let revenue = world.store.revenue_for(&id);
    assert_eq!(revenue.len(), 2);
    assert!(revenue.iter().all(|r| r.amount_minor == 480));
}

#[tokio::test]
async fn invoice_before_checkout_event_still_activates() {
    let world = World::new();
    let (id, session_id) = world.awaiting_payment(PricingModel::Metered).await;
    world.payments.complete_subscription_session(&session_id, "sub_1");

    // invoice.paid overtakes checkout.session.completed; only the subscription metadata links it
    let result = world
        .webhook_handler()
        .handle(webhook(
            "evt_invoice",
            "invoice.paid",
            json!({
                "id": "in_1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "amount_paid": 480,
                "currency": "usd",
                "subscription_details": { "metadata": { "contract_id": id.to_string() } }
            }),
        ))
        .await
        .unwrap();
    assert!(matches!(result, HandlePaymentWebhookResult::Applied(ref c) if c.status == ContractStatus::Active));

    let late = world
        .webhook_handler()
        .handle(webhook(
            "evt_checkout",
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

    assert!(matches!(late, HandlePaymentWebhookResult::Unchanged(_)));
    assert_eq!(world.store.revenue_for(&id).len(), 1);
}

#[tokio::test]
async fn unknown_event_type_is_recorded_as_ignored() {
    let world = World::new();

    let result = world
        .webhook_handler()
        .handle(webhook("evt_1", "customer.created", json!({ "id": "cus_1" })))
        .await
        .unwrap();

    assert!(matches!(result, HandlePaymentWebhookResult::Ignored { .. }));
    let records = world.webhook_events.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].disposition, WebhookDisposition::Ignored);
    assert!(records[0].note.is_some());
}

#[tokio::test]
async fn bad_signature_is_rejected_before_anything_is_recorded() {
    let world = World::new();
    let (id, session_id) = world.awaiting_payment(PricingModel::Fixed).await;
    world
        .payments
        .set_webhook_verify_mode(WebhookVerifyMode::RequireSignature("t=9,v1=ff".to_string()));

    let err = world
        .webhook_handler()
        .handle(one_time_completed("evt_1", id, &session_id))
        .await
        .unwrap_err();

    assert_eq!(err, ContractError::SignatureInvalid);
    assert!(world.webhook_events.is_empty());
    assert_eq!(
        world.store.contract(&id).unwrap().status,
        ContractStatus::PendingPayment
    );
}

#[tokio::test]
async fn cancellation_then_late_invoice_keeps_revenue() {
    let world = World::new();
    let id = active_subscription(&world).await;
    let handler = world.webhook_handler();

    handler
        .handle(webhook(
            "evt_cancel",
            "customer.subscription.deleted",
            json!({ "id": "sub_1", "customer": "cus_1", "status": "canceled" }),
        ))
        .await
        .unwrap();
    handler.handle(invoice_paid("evt_late", "in_final")).await.unwrap();

    let contract = world.store.contract(&id).unwrap();
    assert_eq!(contract.status, ContractStatus::Cancelled);
    assert_eq!(world.store.revenue_for(&id).len(), 1);
}
