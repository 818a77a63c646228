//! Axum router configuration for contract endpoints.
//!
//! This module defines the route structure for the licensing API and wires
//! each route to its handler.

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers::{
    abandon_checkout, accept_contract, attach_reaction_video, create_contract, delete_contract,
    get_contract, handle_stripe_webhook, quote_price, reject_contract, report_usage,
    start_checkout, withdraw_contract, ContractAppState,
};

/// Create the contract API router.
///
/// # Routes
///
/// ## Licensee Endpoints
/// - `POST /` - Request a licence
/// - `POST /:id/withdraw` - Withdraw before payment
/// - `POST /:id/reaction-video` - Attach the reaction video
/// - `POST /:id/checkout` - Start or resume checkout
/// - `POST /:id/checkout/cancel` - Abandon checkout
/// - `POST /:id/usage` - Report cumulative views (METERED)
///
/// ## Licensor Endpoints
/// - `POST /:id/accept` - Accept the request
/// - `POST /:id/reject` - Reject the request
///
/// ## Either Party
/// - `GET /:id` - Contract details
pub fn contract_routes() -> Router<ContractAppState> {
    Router::new()
        .route("/", post(create_contract))
        .route("/:id", get(get_contract))
        .route("/:id/accept", post(accept_contract))
        .route("/:id/reject", post(reject_contract))
        .route("/:id/withdraw", post(withdraw_contract))
        .route("/:id/reaction-video", post(attach_reaction_video))
        .route("/:id/checkout", post(start_checkout))
        .route("/:id/checkout/cancel", post(abandon_checkout))
        .route("/:id/usage", post(report_usage))
}

/// Admin endpoints.
///
/// # Routes
/// - `DELETE /contracts/:id` - Delete an unsettled contract
pub fn admin_routes() -> Router<ContractAppState> {
    Router::new().route("/contracts/:id", delete(delete_contract))
}

/// Pricing endpoints.
///
/// # Routes
/// - `POST /quote` - Price a prospective licence
pub fn pricing_routes() -> Router<ContractAppState> {
    Router::new().route("/quote", post(quote_price))
}

/// Create the Stripe webhook router.
///
/// Kept apart from the contract routes because webhooks carry no caller
/// identity; they are verified via signature.
///
/// # Routes
/// - `POST /stripe` - Handle Stripe webhooks
pub fn webhook_routes() -> Router<ContractAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Create the complete licensing router, suitable for mounting at `/api`.
pub fn contract_router() -> Router<ContractAppState> {
    Router::new()
        .nest("/contracts", contract_routes())
        .nest("/admin", admin_routes())
        .nest("/pricing", pricing_routes())
        .nest("/webhooks", webhook_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::adapters::memory::{
        InMemoryContractStore, InMemoryPartyDirectory, InMemoryWebhookEventRepository,
    };
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::application::handlers::contract::CheckoutSettings;
    use crate::domain::contract::ContractStatus;
    use crate::domain::foundation::{ContractId, Percentage, UserId};
    use crate::domain::pricing::{PricingEngine, TimeFactorKind};

    struct Harness {
        app: Router,
        contracts: Arc<InMemoryContractStore>,
    }

    fn harness() -> Harness {
        let contracts = Arc::new(InMemoryContractStore::new());
        let parties = Arc::new(InMemoryPartyDirectory::new());
        parties.set_payout_account(&UserId::new("licensor-1").unwrap(), "acct_1");

        let state = ContractAppState {
            contracts: contracts.clone(),
            parties,
            payment_provider: Arc::new(MockPaymentProvider::new()),
            webhook_events: Arc::new(InMemoryWebhookEventRepository::new()),
            pricing_engine: Arc::new(PricingEngine::with_builtin_catalog(
                TimeFactorKind::LinearDecay,
            )),
            checkout_settings: CheckoutSettings {
                app_base_url: "https://app.example".to_string(),
                platform_fee: Percentage::try_new(10).unwrap(),
            },
        };

        Harness {
            app: Router::new().nest("/api", contract_router()).with_state(state),
            contracts,
        }
    }

    fn request(method: &str, uri: &str, user: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("X-User-Id", user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn create_body(id: ContractId) -> serde_json::Value {
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
            "currency": "usd",
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
    async fn create_requires_caller_identity() {
        let h = harness();
        let (status, body) = send(
            &h.app,
            request("POST", "/api/contracts", None, create_body(ContractId::new())),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "AUTHENTICATION_REQUIRED");
        assert_eq!(h.contracts.contract_count(), 0);
    }

    #[tokio::test]
    async fn create_then_replay_returns_same_contract() {
        let h = harness();
        let id = ContractId::new();

        let (status, body) = send(
            &h.app,
            request("POST", "/api/contracts", Some("licensee-1"), create_body(id)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "PENDING_REVIEW");
        assert_eq!(body["id"], id.to_string());

        let (status, body) = send(
            &h.app,
            request("POST", "/api/contracts", Some("licensee-1"), create_body(id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.to_string());
        assert_eq!(h.contracts.contract_count(), 1);
    }

    #[tokio::test]
    async fn stored_price_ignores_client_figures() {
        let h = harness();
        let id = ContractId::new();
        let mut body = create_body(id);
        body["price_value"] = json!(0.01);
        body["fair_share_score"] = json!(1.0);

        let (status, body) = send(
            &h.app,
            request("POST", "/api/contracts", Some("licensee-1"), body),
        )
        .await;

        // 100k baseline views * 0.25 share * 4.68 RPM / 1000
        assert_eq!(status, StatusCode::CREATED);
        assert!((body["price_value"].as_f64().unwrap() - 117.0).abs() < 1e-9);
        assert!((body["fair_share_score"].as_f64().unwrap() - 0.25).abs() < 1e-12);
    }

    #[tokio::test]
    async fn duplicate_request_is_conflict() {
        let h = harness();
        let first = ContractId::new();
        send(
            &h.app,
            request("POST", "/api/contracts", Some("licensee-1"), create_body(first)),
        )
        .await;

        let (status, body) = send(
            &h.app,
            request(
                "POST",
                "/api/contracts",
                Some("licensee-1"),
                create_body(ContractId::new()),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error_code"], "DUPLICATE_ERROR");
        assert_eq!(body["details"]["existing_contract_id"], first.to_string());
    }

    #[tokio::test]
    async fn licensor_accepts_and_licensee_cannot() {
        let h = harness();
        let id = ContractId::new();
        send(
            &h.app,
            request("POST", "/api/contracts", Some("licensee-1"), create_body(id)),
        )
        .await;
        let accept_uri = format!("/api/contracts/{}/accept", id);

        let (status, _) = send(
            &h.app,
            request("POST", &accept_uri, Some("licensee-1"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &h.app,
            request("POST", &accept_uri, Some("licensor-1"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "PENDING_PAYMENT");
        assert_eq!(
            h.contracts.contract(&id).unwrap().status,
            ContractStatus::PendingPayment
        );
    }

    #[tokio::test]
    async fn checkout_creates_then_reuses_session() {
        let h = harness();
        let id = ContractId::new();
        send(
            &h.app,
            request("POST", "/api/contracts", Some("licensee-1"), create_body(id)),
        )
        .await;
        send(
            &h.app,
            request(
                "POST",
                &format!("/api/contracts/{}/accept", id),
                Some("licensor-1"),
                json!({}),
            ),
        )
        .await;
        let checkout_uri = format!("/api/contracts/{}/checkout", id);

        let (status, first) = send(
            &h.app,
            request("POST", &checkout_uri, Some("licensee-1"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["reused"], false);

        let (status, second) = send(
            &h.app,
            request("POST", &checkout_uri, Some("licensee-1"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["reused"], true);
        assert_eq!(second["session_id"], first["session_id"]);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids() {
        let h = harness();

        let (status, body) = send(
            &h.app,
            request(
                "GET",
                &format!("/api/contracts/{}", ContractId::new()),
                Some("licensee-1"),
                json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "CONTRACT_NOT_FOUND");

        let (status, body) = send(
            &h.app,
            request("GET", "/api/contracts/not-a-uuid", Some("licensee-1"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn admin_delete_of_missing_contract_is_not_found() {
        let h = harness();
        let (status, _) = send(
            &h.app,
            request(
                "DELETE",
                &format!("/api/admin/contracts/{}", ContractId::new()),
                Some("admin-1"),
                json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn webhook_without_signature_is_rejected() {
        let h = harness();
        let req = Request::builder()
            .method("POST")
            .uri("/api/webhooks/stripe")
            .body(Body::from("{}"))
            .unwrap();

        let (status, body) = send(&h.app, req).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "SIGNATURE_INVALID");
    }

    #[tokio::test]
    async fn webhook_for_unknown_event_type_is_acknowledged() {
        let h = harness();
        let payload = json!({
            "id": "evt_unknown",
            "type": "customer.created",
            "created": 1_704_067_200,
            "data": { "object": { "id": "cus_1" } }
        });
        let req = Request::builder()
            .method("POST")
            .uri("/api/webhooks/stripe")
            .header("Stripe-Signature", "t=1,v1=00")
            .body(Body::from(payload.to_string()))
            .unwrap();

        let (status, body) = send(&h.app, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);
        assert_eq!(body["disposition"], "ignored");
    }

    #[tokio::test]
    async fn quote_returns_terms() {
        let h = harness();
        let (status, body) = send(
            &h.app,
            request(
                "POST",
                "/api/pricing/quote",
                Some("licensee-1"),
                json!({
                    "licensor_id": "licensor-1",
                    "pricing_model": "FIXED",
                    "views_licensee": 50000.0,
                    "views_licensor": 100000.0,
                    "duration_licensee_secs": 600.0,
                    "duration_licensor_secs": 600.0,
                    "usage_fraction": 0.5,
                    "days_since_upload": 15.0,
                    "category_id": "gaming",
                    "month0": 0
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pricing_model"], "FIXED");
        assert!(body["share"].as_f64().unwrap() > 0.0);
    }
}
