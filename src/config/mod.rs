//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `REACTION_LICENSING` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use reaction_licensing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.port);
//! ```

mod database;
mod documents;
mod error;
mod payment;
mod pricing;
mod server;
mod sweeper;

pub use database::DatabaseConfig;
pub use documents::DocumentsConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use pricing::PricingConfig;
pub use server::{Environment, ServerConfig};
pub use sweeper::SweeperConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Payment configuration (Stripe Connect)
    pub payment: PaymentConfig,

    /// Licence document service
    pub documents: DocumentsConfig,

    /// Reconciliation sweeper
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Pricing engine
    #[serde(default)]
    pub pricing: PricingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `REACTION_LICENSING` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `REACTION_LICENSING__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `REACTION_LICENSING__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("REACTION_LICENSING")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        self.documents.validate()?;
        self.sweeper.validate()?;
        self.pricing.validate()?;

        if self.sweeper.enabled && self.sweeper.concurrency > self.database.max_connections as usize {
            return Err(ValidationError::InvalidSweeper(
                "concurrency exceeds database max_connections",
            ));
        }
        if self.is_production() && self.payment.is_live_mode() && !self.payment.require_livemode {
            return Err(ValidationError::LivemodeRequired);
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
