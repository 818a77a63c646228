//! HTTP handlers for contract endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::contract::{
    AbandonCheckoutCommand, AbandonCheckoutHandler, AcceptContractCommand, AcceptContractHandler,
    AttachReactionVideoCommand, AttachReactionVideoHandler, CheckoutSettings,
    CreateContractHandler, DeleteContractCommand, DeleteContractHandler,
    DeleteContractResult, GetContractHandler, GetContractQuery, HandlePaymentWebhookCommand,
    HandlePaymentWebhookHandler, HandlePaymentWebhookResult, RejectContractCommand,
    RejectContractHandler, ReportUsageCommand, ReportUsageHandler, StartCheckoutCommand,
    StartCheckoutHandler, WithdrawContractCommand, WithdrawContractHandler,
    WithdrawContractResult,
};
use crate::application::handlers::pricing::{QuotePriceHandler, QuotePriceQuery};
use crate::domain::contract::ContractError;
use crate::domain::foundation::{ContractId, UserId, VideoId};
use crate::domain::pricing::PricingEngine;
use crate::ports::{ContractRepository, PartyDirectory, PaymentProvider, WebhookEventRepository};

use super::dto::{
    AttachReactionVideoRequest, CheckoutResponse, ContractResponse, CreateContractRequest,
    ErrorResponse, QuotePriceRequest, QuoteResponse, ReportUsageRequest, UsageReportResponse,
    WebhookAckResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; every dependency is behind an `Arc`.
#[derive(Clone)]
pub struct ContractAppState {
    pub contracts: Arc<dyn ContractRepository>,
    pub parties: Arc<dyn PartyDirectory>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub pricing_engine: Arc<PricingEngine>,
    pub checkout_settings: CheckoutSettings,
}

impl ContractAppState {
    pub fn create_contract_handler(&self) -> CreateContractHandler {
        CreateContractHandler::new(
            self.contracts.clone(),
            self.parties.clone(),
            self.pricing_engine.clone(),
        )
    }

    pub fn get_contract_handler(&self) -> GetContractHandler {
        GetContractHandler::new(self.contracts.clone())
    }

    pub fn accept_contract_handler(&self) -> AcceptContractHandler {
        AcceptContractHandler::new(self.contracts.clone())
    }

    pub fn reject_contract_handler(&self) -> RejectContractHandler {
        RejectContractHandler::new(self.contracts.clone())
    }

    pub fn withdraw_contract_handler(&self) -> WithdrawContractHandler {
        WithdrawContractHandler::new(self.contracts.clone(), self.payment_provider.clone())
    }

    pub fn attach_reaction_video_handler(&self) -> AttachReactionVideoHandler {
        AttachReactionVideoHandler::new(self.contracts.clone())
    }

    pub fn start_checkout_handler(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            self.contracts.clone(),
            self.parties.clone(),
            self.payment_provider.clone(),
            self.checkout_settings.clone(),
        )
    }

    pub fn abandon_checkout_handler(&self) -> AbandonCheckoutHandler {
        AbandonCheckoutHandler::new(self.contracts.clone(), self.payment_provider.clone())
    }

    pub fn report_usage_handler(&self) -> ReportUsageHandler {
        ReportUsageHandler::new(self.contracts.clone(), self.payment_provider.clone())
    }

    pub fn delete_contract_handler(&self) -> DeleteContractHandler {
        DeleteContractHandler::new(self.contracts.clone(), self.payment_provider.clone())
    }

    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            self.contracts.clone(),
            self.payment_provider.clone(),
            self.webhook_events.clone(),
        )
    }

    pub fn quote_price_handler(&self) -> QuotePriceHandler {
        QuotePriceHandler::new(self.pricing_engine.clone(), self.parties.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Caller Context
// ════════════════════════════════════════════════════════════════════════════════

/// Caller identity, asserted by the upstream gateway in the `X-User-Id` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s).ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

fn parse_contract_id(raw: &str) -> Result<ContractId, ContractApiError> {
    raw.parse::<ContractId>()
        .map_err(|_| ContractError::validation("id", "must be a UUID").into())
}

// ════════════════════════════════════════════════════════════════════════════════
// Contract Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/contracts - Request a licence as the licensee
pub async fn create_contract(
    State(state): State<ContractAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateContractRequest>,
) -> Result<impl IntoResponse, ContractApiError> {
    let cmd = request.into_command(user.user_id)?;
    let result = state.create_contract_handler().handle(cmd).await?;

    let status = if result.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(ContractResponse::from(result.contract))))
}

/// GET /api/contracts/:id - Contract details for either party
pub async fn get_contract(
    State(state): State<ContractAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ContractApiError> {
    let contract = state
        .get_contract_handler()
        .handle(GetContractQuery {
            contract_id: parse_contract_id(&id)?,
            requested_by: user.user_id,
        })
        .await?;
    Ok(Json(ContractResponse::from(contract)))
}

/// POST /api/contracts/:id/accept - Licensor accepts
pub async fn accept_contract(
    State(state): State<ContractAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ContractApiError> {
    let update = state
        .accept_contract_handler()
        .handle(AcceptContractCommand {
            contract_id: parse_contract_id(&id)?,
            requested_by: user.user_id,
        })
        .await?;
    Ok(Json(ContractResponse::from(update.contract)))
}

/// POST /api/contracts/:id/reject - Licensor rejects
pub async fn reject_contract(
    State(state): State<ContractAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ContractApiError> {
    let update = state
        .reject_contract_handler()
        .handle(RejectContractCommand {
            contract_id: parse_contract_id(&id)?,
            requested_by: user.user_id,
        })
        .await?;
    Ok(Json(ContractResponse::from(update.contract)))
}

/// POST /api/contracts/:id/withdraw - Licensee withdraws before payment
///
/// A contract torn down mid-checkout no longer exists, so that case
/// answers 204 instead of the contract body.
pub async fn withdraw_contract(
    State(state): State<ContractAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<axum::response::Response, ContractApiError> {
    let result = state
        .withdraw_contract_handler()
        .handle(WithdrawContractCommand {
            contract_id: parse_contract_id(&id)?,
            requested_by: user.user_id,
        })
        .await?;

    Ok(match result {
        WithdrawContractResult::Withdrawn(update) => {
            Json(ContractResponse::from(update.contract)).into_response()
        }
        WithdrawContractResult::Deleted(_) => StatusCode::NO_CONTENT.into_response(),
    })
}

/// POST /api/contracts/:id/reaction-video - Licensee picks the reaction video
pub async fn attach_reaction_video(
    State(state): State<ContractAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<AttachReactionVideoRequest>,
) -> Result<impl IntoResponse, ContractApiError> {
    let reaction_video_id = VideoId::new(request.reaction_video_id).map_err(ContractError::from)?;
    let update = state
        .attach_reaction_video_handler()
        .handle(AttachReactionVideoCommand {
            contract_id: parse_contract_id(&id)?,
            requested_by: user.user_id,
            reaction_video_id,
        })
        .await?;
    Ok(Json(ContractResponse::from(update.contract)))
}

/// POST /api/contracts/:id/checkout - Start (or resume) payment
pub async fn start_checkout(
    State(state): State<ContractAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ContractApiError> {
    let result = state
        .start_checkout_handler()
        .handle(StartCheckoutCommand {
            contract_id: parse_contract_id(&id)?,
            requested_by: user.user_id,
        })
        .await?;

    let status = if result.reused {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(CheckoutResponse::from(result))))
}

/// POST /api/contracts/:id/checkout/cancel - Licensee abandons checkout
pub async fn abandon_checkout(
    State(state): State<ContractAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ContractApiError> {
    state
        .abandon_checkout_handler()
        .handle(AbandonCheckoutCommand {
            contract_id: parse_contract_id(&id)?,
            requested_by: user.user_id,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/contracts/:id/usage - Report cumulative views for metered billing
pub async fn report_usage(
    State(state): State<ContractAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<ReportUsageRequest>,
) -> Result<impl IntoResponse, ContractApiError> {
    let result = state
        .report_usage_handler()
        .handle(ReportUsageCommand {
            contract_id: parse_contract_id(&id)?,
            requested_by: user.user_id,
            new_view_count: request.view_count,
        })
        .await?;
    Ok(Json(UsageReportResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// DELETE /api/admin/contracts/:id - Remove an unsettled contract
pub async fn delete_contract(
    State(state): State<ContractAppState>,
    user: AuthenticatedUser, // Admin role is enforced by the upstream gateway
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ContractApiError> {
    let contract_id = parse_contract_id(&id)?;
    let result = state
        .delete_contract_handler()
        .handle(DeleteContractCommand { contract_id })
        .await?;

    match result {
        DeleteContractResult::Deleted(_) => {
            tracing::info!(contract_id = %contract_id, admin = %user.user_id, "Admin delete");
            Ok(StatusCode::NO_CONTENT)
        }
        DeleteContractResult::AlreadyGone(_) => Err(ContractError::not_found(contract_id).into()),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Pricing Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/pricing/quote - Price a prospective licence
pub async fn quote_price(
    State(state): State<ContractAppState>,
    _user: AuthenticatedUser,
    Json(request): Json<QuotePriceRequest>,
) -> Result<impl IntoResponse, ContractApiError> {
    let licensor_id = UserId::new(request.licensor_id).map_err(ContractError::from)?;
    let terms = state
        .quote_price_handler()
        .handle(QuotePriceQuery {
            licensor_id,
            pricing_model: request.pricing_model,
            input: request.input,
        })
        .await?;
    Ok(Json(QuoteResponse::from(terms)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/stripe - Handle Stripe webhook events
///
/// Any non-2xx answer makes the gateway redeliver, so only failures that
/// may succeed on retry surface as errors.
pub async fn handle_stripe_webhook(
    State(state): State<ContractAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ContractApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ContractError::SignatureInvalid)?;

    let result = state
        .webhook_handler()
        .handle(HandlePaymentWebhookCommand {
            payload: body.to_vec(),
            signature: signature.to_string(),
        })
        .await?;

    let disposition = match &result {
        HandlePaymentWebhookResult::Duplicate => "duplicate",
        other => other.disposition().as_str(),
    };
    Ok(Json(WebhookAckResponse {
        received: true,
        disposition: disposition.to_string(),
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts contract errors to HTTP responses.
#[derive(Debug)]
pub struct ContractApiError(ContractError);

impl From<ContractError> for ContractApiError {
    fn from(err: ContractError) -> Self {
        Self(err)
    }
}

impl From<crate::domain::foundation::DomainError> for ContractApiError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        Self(ContractError::from(err))
    }
}

impl IntoResponse for ContractApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            ContractError::NotFound(_) => StatusCode::NOT_FOUND,
            ContractError::Duplicate { .. }
            | ContractError::IdConflict(_)
            | ContractError::AlreadySettled { .. }
            | ContractError::InvalidState { .. }
            | ContractError::ReactionVideoAlreadySet(_)
            | ContractError::ConcurrentModification(_) => StatusCode::CONFLICT,
            ContractError::PayoutAccountMissing(_) | ContractError::MissingReactionVideo(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ContractError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            ContractError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ContractError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            ContractError::PaymentProvider { .. } => StatusCode::BAD_GATEWAY,
            ContractError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Contract request failed");
        }

        let error_code = self.0.code().to_string();
        let message = self.0.message();
        let body = match &self.0 {
            ContractError::Duplicate { existing } => ErrorResponse::with_details(
                error_code,
                message,
                serde_json::json!({ "existing_contract_id": existing.to_string() }),
            ),
            ContractError::ValidationFailed { field, .. } => ErrorResponse::with_details(
                error_code,
                message,
                serde_json::json!({ "field": field }),
            ),
            _ => ErrorResponse::new(error_code, message),
        };
        (status, Json(body)).into_response()
    }
}
