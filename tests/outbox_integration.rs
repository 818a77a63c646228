//! Integration tests for outbox delivery of contract events.
//!
//! Contract commands write events to the store's outbox in the same commit
//! as the state change. The publisher drains the outbox into the event bus,
//! where document dispatch picks up acceptance and payment confirmation and
//! the term end scheduler sets the subscription's cancellation date.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use reaction_licensing::adapters::memory::{
    InMemoryProcessedEventStore, RecordingDocumentGenerator,
};
use reaction_licensing::adapters::{
    IdempotentHandler, InMemoryEventBus, OutboxPublisher, OutboxPublisherConfig,
};
use serde_json::json;

use reaction_licensing::application::handlers::contract::{
    DocumentDispatchHandler, TermEndScheduler, DOCUMENT_EVENT_TYPES, TERM_END_EVENT_TYPES,
};
use reaction_licensing::domain::contract::{
    CONTRACT_ACCEPTED, CONTRACT_PAYMENT_CONFIRMED, CONTRACT_TERM_END_REQUESTED,
    LICENSE_TERM_YEARS,
};
use reaction_licensing::domain::pricing::PricingModel;
use reaction_licensing::ports::{
    DocumentError, DocumentTrigger, EventSubscriber, OutboxStatus, OutboxWriter, PaymentError,
};

use common::{licence_request, one_time_completed, webhook, World};

struct Pipeline {
    world: World,
    bus: Arc<InMemoryEventBus>,
    documents: Arc<RecordingDocumentGenerator>,
    processed: Arc<InMemoryProcessedEventStore>,
    publisher: OutboxPublisher,
}

fn pipeline(batch_size: u32) -> Pipeline {
    let world = World::new();
    let bus = Arc::new(InMemoryEventBus::new());
    let documents = Arc::new(RecordingDocumentGenerator::new());
    let processed = Arc::new(InMemoryProcessedEventStore::new());
    bus.subscribe_all(
        &DOCUMENT_EVENT_TYPES,
        Arc::new(IdempotentHandler::new(
            DocumentDispatchHandler::new(documents.clone()),
            processed.clone(),
        )),
    );
    bus.subscribe_all(
        &TERM_END_EVENT_TYPES,
        Arc::new(IdempotentHandler::new(
            TermEndScheduler::new(world.payments.clone()),
            processed.clone(),
        )),
    );
    let publisher = OutboxPublisher::with_config(
        world.store.clone(),
        bus.clone(),
        OutboxPublisherConfig::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_batch_size(batch_size),
    );
    Pipeline {
        world,
        bus,
        documents,
        processed,
        publisher,
    }
}

#[tokio::test]
async fn acceptance_reaches_document_dispatch() {
    let p = pipeline(100);
    let contract = p.world.create(licence_request(PricingModel::Fixed, "react-1")).await;
    p.world.accept(contract.id).await;

    let published = p.publisher.poll_once().await.unwrap();

    assert_eq!(published, p.world.store.outbox_entries().len());
    assert!(p.bus.has_event(CONTRACT_ACCEPTED));
    let requests = p.documents.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].contract_id, contract.id);
    assert_eq!(requests[0].trigger, DocumentTrigger::LicensorAccepted);
    assert!(p
        .world
        .store
        .outbox_entries()
        .iter()
        .all(|e| e.status == OutboxStatus::Published));
}

#[tokio::test]
async fn payment_confirmation_requests_second_document() {
    let p = pipeline(100);
    let (id, session_id) = p.world.awaiting_payment(PricingModel::Fixed).await;
    p.publisher.poll_once().await.unwrap();

    p.world
        .webhook_handler()
        .handle(one_time_completed("evt_1", id, &session_id))
        .await
        .unwrap();
    p.publisher.poll_once().await.unwrap();

    assert!(p.bus.has_event(CONTRACT_PAYMENT_CONFIRMED));
    let triggers: Vec<_> = p.documents.requests().iter().map(|r| r.trigger).collect();
    assert_eq!(
        triggers,
        vec![DocumentTrigger::LicensorAccepted, DocumentTrigger::PaymentConfirmed]
    );
}

#[tokio::test]
async fn published_entries_are_not_delivered_twice() {
    let p = pipeline(100);
    let contract = p.world.create(licence_request(PricingModel::Fixed, "react-1")).await;
    p.world.accept(contract.id).await;

    let first = p.publisher.poll_once().await.unwrap();
    let second = p.publisher.poll_once().await.unwrap();

    assert!(first > 0);
    assert_eq!(second, 0);
    assert_eq!(p.documents.requests().len(), 1);
}

#[tokio::test]
async fn redelivered_event_is_handled_once() {
    let p = pipeline(100);
    let contract = p.world.create(licence_request(PricingModel::Fixed, "react-1")).await;
    p.world.accept(contract.id).await;
    p.publisher.poll_once().await.unwrap();

    // Same envelope written again, as after a crash between publish and mark
    let accepted = p
        .bus
        .events_of_type(CONTRACT_ACCEPTED)
        .pop()
        .expect("accepted event published");
    p.world
        .store
        .write(&accepted, &contract.id.to_string())
        .await
        .unwrap();
    p.publisher.poll_once().await.unwrap();

    assert_eq!(p.documents.requests().len(), 1);
    assert_eq!(p.processed.len(), 1);
}

#[tokio::test]
async fn batch_size_limits_each_poll() {
    let p = pipeline(2);
    for reaction in ["react-1", "react-2", "react-3"] {
        let contract = p.world.create(licence_request(PricingModel::Fixed, reaction)).await;
        p.world.accept(contract.id).await;
    }
    let total = p.world.store.outbox_entries().len();
    assert!(total > 2);

    assert_eq!(p.publisher.poll_once().await.unwrap(), 2);

    let mut delivered = 2;
    while delivered < total {
        delivered += p.publisher.poll_once().await.unwrap();
    }
    assert_eq!(p.documents.requests().len(), 3);
}

#[tokio::test]
async fn document_service_failure_does_not_block_outbox() {
    let p = pipeline(100);
    p.documents
        .fail_with(DocumentError::Unavailable("connection refused".to_string()));
    let contract = p.world.create(licence_request(PricingModel::Fixed, "react-1")).await;
    p.world.accept(contract.id).await;

    p.publisher.poll_once().await.unwrap();

    assert!(p.documents.requests().is_empty());
    assert!(p
        .world
        .store
        .outbox_entries()
        .iter()
        .all(|e| e.status == OutboxStatus::Published));
}

#[tokio::test]
async fn term_end_scheduling_is_retried_after_gateway_failure() {
    let p = pipeline(100);
    let (id, session_id) = p.world.awaiting_payment(PricingModel::Metered).await;
    p.publisher.poll_once().await.unwrap();

    p.world.payments.complete_subscription_session(&session_id, "sub_1");
    p.world.payments.set_method_error(
        "schedule_subscription_cancellation",
        PaymentError::network("connection reset"),
    );
    p.world
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

    p.publisher.poll_once().await.unwrap();
    assert!(p.world.payments.scheduled_cancellation("sub_1").is_none());
    let term_end_status = |p: &Pipeline| {
        p.world
            .store
            .outbox_entries()
            .into_iter()
            .find(|e| e.event.event_type == CONTRACT_TERM_END_REQUESTED)
            .map(|e| e.status)
    };
    assert_eq!(term_end_status(&p), Some(OutboxStatus::Failed));

    p.world.payments.clear_errors();
    p.publisher.poll_once().await.unwrap();

    let created_at = p.world.store.contract(&id).unwrap().created_at;
    assert_eq!(
        p.world.payments.scheduled_cancellation("sub_1"),
        Some(created_at.add_years(LICENSE_TERM_YEARS))
    );
    assert_eq!(
        p.world.payments.call_count("schedule_subscription_cancellation"),
        2
    );
    assert_eq!(term_end_status(&p), Some(OutboxStatus::Published));
    assert_eq!(
        p.documents
            .requests()
            .iter()
            .filter(|r| r.trigger == DocumentTrigger::PaymentConfirmed)
            .count(),
        1
    );
}

#[tokio::test]
async fn run_loop_delivers_and_stops_on_shutdown() {
    let p = pipeline(100);
    let contract = p.world.create(licence_request(PricingModel::Fixed, "react-1")).await;
    p.world.accept(contract.id).await;

    let documents = p.documents.clone();
    let publisher = Arc::new(p.publisher);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = {
        let publisher = publisher.clone();
        tokio::spawn(async move { publisher.run(shutdown_rx).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("publisher should stop after shutdown")
        .unwrap();
    assert_eq!(documents.requests().len(), 1);
}
