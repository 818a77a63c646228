//! Payment configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Payment configuration (Stripe Connect)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// Platform fee withheld from each charge, in whole percent
    #[serde(default = "default_platform_fee_percent")]
    pub platform_fee_percent: u8,

    /// Base URL of the web app, used for checkout redirects
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,

    /// Reject webhook events not flagged livemode
    #[serde(default)]
    pub require_livemode: bool,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if self.platform_fee_percent > 100 {
            return Err(ValidationError::InvalidPlatformFee);
        }
        if !self.app_base_url.starts_with("http://") && !self.app_base_url.starts_with("https://")
        {
            return Err(ValidationError::InvalidUrl("APP_BASE_URL"));
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            platform_fee_percent: default_platform_fee_percent(),
            app_base_url: default_app_base_url(),
            require_livemode: false,
        }
    }
}

fn default_platform_fee_percent() -> u8 {
    10
}

fn default_app_base_url() -> String {
    "http://localhost:5173".to_string()
}
