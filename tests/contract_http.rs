//! HTTP integration tests for the full API router.
//!
//! Requests go through `api_router` with every production layer applied,
//! backed by in-memory adapters and the mock payment provider.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use reaction_licensing::adapters::http::{api_router, ContractAppState, HttpSettings};
use reaction_licensing::domain::foundation::ContractId;
use reaction_licensing::domain::pricing::{PricingEngine, TimeFactorKind};

use common::{checkout_settings, World};

fn app(world: &World) -> Router {
    let state = ContractAppState {
        contracts: world.store.clone(),
        parties: world.parties.clone(),
        payment_provider: world.payments.clone(),
        webhook_events: world.webhook_events.clone(),
        pricing_engine: Arc::new(PricingEngine::with_builtin_catalog(
            TimeFactorKind::LinearDecay,
        )),
        checkout_settings: checkout_settings(),
    };
    api_router(state, &HttpSettings::default())
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn create_body(id: ContractId) -> Value {
    json!({
        "id": id.to_string(),
        "licensor_id": "licensor-1",
        "original_video": {
            "video_id": "orig-1",
            "title": "Original",
            "url": "https://video.example/orig-1",
            "duration_secs": 600.0
        },
        "reaction_video_id": "react-1",
        "pricing_model": "FIXED",
        "currency": "USD",
        "pricing": {
            "views_licensee": 50000.0,
            "views_licensor": 100000.0,
            "duration_licensee_secs": 600.0,
            "duration_licensor_secs": 600.0,
            "usage_fraction": 0.5,
            "days_since_upload": 15.0,
            "category_id": "entertainment",
            "month0": 4
        }
    })
}

#[tokio::test]
async fn health_carries_request_id() {
    let world = World::new();
    let response = app(&world)
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn fixed_licence_from_request_to_paid() {
    let world = World::new();
    let app = app(&world);
    let id = ContractId::new();

    // 1. Licensee requests
    let (status, body) = send(
        &app,
        request("POST", "/api/contracts", Some("licensee-1"), Some(create_body(id))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "PENDING_REVIEW");
    assert_eq!(body["currency"], "usd");

    // 2. Licensor accepts
    let (status, body) = send(
        &app,
        request("POST", &format!("/api/contracts/{}/accept", id), Some("licensor-1"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING_PAYMENT");

    // 3. Licensee opens checkout
    let (status, body) = send(
        &app,
        request("POST", &format!("/api/contracts/{}/checkout", id), Some("licensee-1"), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = body["session_id"].as_str().unwrap().to_string();

    // 4. Gateway confirms
    let event = json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "created": 1_704_067_200,
        "livemode": false,
        "data": { "object": {
            "id": session_id,
            "mode": "payment",
            "status": "complete",
            "payment_status": "paid",
            "amount_total": 2500,
            "currency": "usd",
            "metadata": { "contract_id": id.to_string() }
        } }
    });
    let webhook = Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("Stripe-Signature", "t=1,v1=00")
        .body(Body::from(event.to_string()))
        .unwrap();
    let (status, body) = send(&app, webhook).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["disposition"], "applied");

    // 5. Either party sees it paid
    let (status, body) = send(
        &app,
        request("GET", &format!("/api/contracts/{}", id), Some("licensor-1"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PAID");
    assert_eq!(world.store.revenue_for(&id).len(), 1);
}

#[tokio::test]
async fn stranger_cannot_read_contract() {
    let world = World::new();
    let app = app(&world);
    let id = ContractId::new();
    send(
        &app,
        request("POST", "/api/contracts", Some("licensee-1"), Some(create_body(id))),
    )
    .await;

    let (status, body) = send(
        &app,
        request("GET", &format!("/api/contracts/{}", id), Some("someone-else"), None),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "FORBIDDEN");
}

#[tokio::test]
async fn checkout_without_payout_account_is_unprocessable() {
    let world = World::without_payout_account();
    let app = app(&world);
    let id = ContractId::new();
    send(
        &app,
        request("POST", "/api/contracts", Some("licensee-1"), Some(create_body(id))),
    )
    .await;
    send(
        &app,
        request("POST", &format!("/api/contracts/{}/accept", id), Some("licensor-1"), None),
    )
    .await;

    let (status, body) = send(
        &app,
        request("POST", &format!("/api/contracts/{}/checkout", id), Some("licensee-1"), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error_code"], "PAYOUT_ACCOUNT_MISSING");
    assert!(world.payments.checkout_requests().is_empty());
}

#[tokio::test]
async fn duplicate_request_reports_existing_contract() {
    let world = World::new();
    let app = app(&world);
    let first = ContractId::new();
    send(
        &app,
        request("POST", "/api/contracts", Some("licensee-1"), Some(create_body(first))),
    )
    .await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/contracts",
            Some("licensee-1"),
            Some(create_body(ContractId::new())),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"]["existing_contract_id"], first.to_string());
}
