//! Data Transfer Objects for contract HTTP endpoints.
//!
//! These types define the JSON request/response shapes for the REST API.
//! They are separate from domain types so the wire format can evolve
//! independently of the aggregate.

use serde::{Deserialize, Serialize};

use crate::application::handlers::contract::{
    CreateContractCommand, ReportUsageResult, StartCheckoutResult,
};
use crate::domain::contract::{Contract, ContractError, LicenceRequest, VideoSnapshot};
use crate::domain::foundation::{ContractId, UserId, VideoId};
use crate::domain::pricing::{PriceTerms, PricingInput, PricingModel};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Original video as presented by the licensee.
#[derive(Debug, Clone, Deserialize)]
pub struct OriginalVideoRequest {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub duration_secs: f64,
}

/// Request to create a licensing contract.
///
/// The licensee is the caller; `id` is minted by the client and doubles as
/// the idempotency key for retries. There is no price field: the server
/// prices the request from `pricing`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContractRequest {
    pub id: ContractId,
    pub licensor_id: String,
    pub original_video: OriginalVideoRequest,
    #[serde(default)]
    pub reaction_video_id: Option<String>,
    pub pricing_model: PricingModel,
    pub currency: String,
    pub pricing: PricingInput,
}

impl CreateContractRequest {
    /// Validates the request and builds the command for the given licensee.
    pub fn into_command(self, licensee_id: UserId) -> Result<CreateContractCommand, ContractError> {
        let currency = self.currency.trim().to_lowercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ContractError::validation(
                "currency",
                "must be a three-letter ISO code",
            ));
        }

        let request = LicenceRequest {
            id: self.id,
            licensor_id: UserId::new(self.licensor_id)?,
            licensee_id,
            original_video: VideoSnapshot {
                video_id: VideoId::new(self.original_video.video_id)?,
                title: self.original_video.title,
                url: self.original_video.url,
                duration_secs: self.original_video.duration_secs,
            },
            reaction_video_id: self
                .reaction_video_id
                .filter(|id| !id.trim().is_empty())
                .map(VideoId::new)
                .transpose()?,
            pricing_model: self.pricing_model,
            currency,
        };
        Ok(CreateContractCommand {
            request,
            pricing: self.pricing,
        })
    }
}

/// Request to attach the reaction video chosen after creation.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachReactionVideoRequest {
    pub reaction_video_id: String,
}

/// Request to report the cumulative view count of the reaction video.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportUsageRequest {
    pub view_count: i64,
}

/// Request for a price quote.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotePriceRequest {
    pub licensor_id: String,
    pub pricing_model: PricingModel,
    #[serde(flatten)]
    pub input: PricingInput,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Contract as returned to either party.
#[derive(Debug, Clone, Serialize)]
pub struct ContractResponse {
    pub id: String,
    pub licensor_id: String,
    pub licensee_id: String,
    pub original_video_id: String,
    pub original_title: String,
    pub reaction_video_id: Option<String>,
    pub pricing_model: PricingModel,
    pub price_value: f64,
    pub currency: String,
    pub fair_share_score: f64,
    pub status: String,
    pub accepted_by_licensor: bool,
    pub accepted_by_licensee: bool,
    pub last_reported_usage: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Contract> for ContractResponse {
    fn from(contract: Contract) -> Self {
        Self {
            id: contract.id.to_string(),
            licensor_id: contract.licensor_id.to_string(),
            licensee_id: contract.licensee_id.to_string(),
            original_video_id: contract.original_video.video_id.to_string(),
            original_title: contract.original_video.title,
            reaction_video_id: contract.reaction_video_id.map(|id| id.to_string()),
            pricing_model: contract.pricing_model,
            price_value: contract.price_value.value(),
            currency: contract.currency,
            fair_share_score: contract.fair_share.score,
            status: contract.status.as_str().to_string(),
            accepted_by_licensor: contract.accepted_by_licensor,
            accepted_by_licensee: contract.accepted_by_licensee,
            last_reported_usage: contract.last_reported_usage,
            created_at: contract.created_at.as_datetime().to_rfc3339(),
            updated_at: contract.updated_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Response for checkout session creation or reuse.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub contract_id: String,
    pub session_id: String,
    pub checkout_url: String,
    pub reused: bool,
}

impl From<StartCheckoutResult> for CheckoutResponse {
    fn from(result: StartCheckoutResult) -> Self {
        Self {
            contract_id: result.contract_id.to_string(),
            session_id: result.session_id,
            checkout_url: result.checkout_url,
            reused: result.reused,
        }
    }
}

/// Response for a usage report.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReportResponse {
    pub contract_id: String,
    pub reported_delta: i64,
    pub last_reported_usage: i64,
}

impl From<ReportUsageResult> for UsageReportResponse {
    fn from(result: ReportUsageResult) -> Self {
        Self {
            contract_id: result.update.contract.id.to_string(),
            reported_delta: result.reported_delta,
            last_reported_usage: result.update.contract.last_reported_usage,
        }
    }
}

/// Response for a price quote.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
    pub pricing_model: PricingModel,
    pub share: f64,
    pub content_score: f64,
    pub discount_factor: f64,
    pub time_factor: f64,
    pub effective_rpm: f64,
    pub price_value: f64,
}

impl From<PriceTerms> for QuoteResponse {
    fn from(terms: PriceTerms) -> Self {
        Self {
            pricing_model: terms.pricing_model,
            share: terms.share,
            content_score: terms.content_score,
            discount_factor: terms.discount_factor,
            time_factor: terms.time_factor,
            effective_rpm: terms.effective_rpm,
            price_value: terms.price_value.value(),
        }
    }
}

/// Acknowledgement returned to the payment gateway.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
    pub disposition: String,
}

/// Standard error response format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}
