//! HTTP client for the external licence document service.
//!
//! # Configuration
//!
//! ```ignore
//! let config = DocumentServiceConfig::new("https://docs.internal")
//!     .with_timeout(Duration::from_secs(10))
//!     .with_max_attempts(3);
//!
//! let documents = HttpDocumentGenerator::new(config)?;
//! ```
//!
//! Requests carry an `Idempotency-Key` of `{contract_id}-{trigger}` so the
//! service can collapse retried deliveries.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{DocumentError, DocumentGenerator, DocumentRequest, DocumentTrigger};

/// Configuration for the document service client.
#[derive(Debug, Clone)]
pub struct DocumentServiceConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub initial_backoff: Duration,
}

impl DocumentServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn documents_url(&self) -> String {
        format!("{}/v1/documents", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct GenerateDocumentBody<'a> {
    contract_id: String,
    trigger: &'a DocumentTrigger,
}

/// `DocumentGenerator` over HTTP with bounded retries.
pub struct HttpDocumentGenerator {
    config: DocumentServiceConfig,
    client: Client,
}

impl HttpDocumentGenerator {
    pub fn new(config: DocumentServiceConfig) -> Result<Self, DocumentError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DocumentError::Unavailable(format!("http client: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn send(&self, request: &DocumentRequest) -> Result<(), DocumentError> {
        let body = GenerateDocumentBody {
            contract_id: request.contract_id.to_string(),
            trigger: &request.trigger,
        };
        let response = self
            .client
            .post(self.config.documents_url())
            .header("Idempotency-Key", idempotency_key(request))
            .json(&body)
            .send()
            .await
            .map_err(|e| DocumentError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(classify_failure(status, message))
    }
}

fn idempotency_key(request: &DocumentRequest) -> String {
    let trigger = match request.trigger {
        DocumentTrigger::LicensorAccepted => "licensor_accepted",
        DocumentTrigger::PaymentConfirmed => "payment_confirmed",
    };
    format!("{}-{}", request.contract_id, trigger)
}

/// Server-side and throttling failures are worth retrying; other 4xx are not.
fn classify_failure(status: StatusCode, message: String) -> DocumentError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        DocumentError::Unavailable(format!("{}: {}", status, message))
    } else {
        DocumentError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

fn is_retryable(error: &DocumentError) -> bool {
    matches!(error, DocumentError::Unavailable(_))
}

#[async_trait]
impl DocumentGenerator for HttpDocumentGenerator {
    async fn request_generation(&self, request: DocumentRequest) -> Result<(), DocumentError> {
        let mut attempt = 1;
        let mut delay = self.config.initial_backoff;

        loop {
            match self.send(&request).await {
                Ok(()) => return Ok(()),
                Err(err) if is_retryable(&err) && attempt < self.config.max_attempts => {
                    tracing::debug!(
                        contract_id = %request.contract_id,
                        attempt,
                        error = %err,
                        "Document request failed, retrying"
                    );
                    sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
