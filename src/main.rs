//! reaction-licensing server binary.
//!
//! Wires the PostgreSQL adapters, Stripe and the document client into the
//! HTTP API, and runs the outbox publisher and reconciliation sweeper in
//! the background until Ctrl-C.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reaction_licensing::adapters::documents::{DocumentServiceConfig, HttpDocumentGenerator};
use reaction_licensing::adapters::http::{api_router, ContractAppState, HttpSettings};
use reaction_licensing::adapters::postgres::{
    PostgresContractRepository, PostgresOutboxWriter, PostgresPartyDirectory,
    PostgresProcessedEventStore, PostgresWebhookEventRepository,
};
use reaction_licensing::adapters::stripe::{StripeConfig, StripePaymentAdapter};
use reaction_licensing::adapters::{IdempotentHandler, InMemoryEventBus, OutboxPublisher};
use reaction_licensing::application::handlers::contract::{
    CheckoutSettings, DocumentDispatchHandler, ReconcileContractsHandler, TermEndScheduler,
    DOCUMENT_EVENT_TYPES, TERM_END_EVENT_TYPES,
};
use reaction_licensing::config::AppConfig;
use reaction_licensing::domain::foundation::Percentage;
use reaction_licensing::ports::{
    ContractRepository, EventSubscriber, PaymentProvider, ProcessedEventStore,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        stripe_test_mode = config.payment.is_test_mode(),
        "Starting reaction-licensing"
    );

    // 1. Database
    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations completed");
    }

    // 2. Adapters
    let contracts: Arc<dyn ContractRepository> =
        Arc::new(PostgresContractRepository::new(pool.clone()));
    let payment_provider: Arc<dyn PaymentProvider> = Arc::new(StripePaymentAdapter::new(
        StripeConfig::new(
            config.payment.stripe_api_key.clone(),
            config.payment.stripe_webhook_secret.clone(),
        )
        .with_require_livemode(config.payment.require_livemode),
    ));
    let documents = Arc::new(HttpDocumentGenerator::new(
        DocumentServiceConfig::new(config.documents.base_url.clone())
            .with_timeout(config.documents.timeout())
            .with_max_attempts(config.documents.max_attempts),
    )?);
    let processed_events: Arc<dyn ProcessedEventStore> =
        Arc::new(PostgresProcessedEventStore::new(pool.clone()));

    // 3. Outbox delivery to document dispatch and gateway follow-ups
    let event_bus = Arc::new(InMemoryEventBus::new());
    event_bus.subscribe_all(
        &DOCUMENT_EVENT_TYPES,
        Arc::new(IdempotentHandler::new(
            DocumentDispatchHandler::new(documents),
            processed_events.clone(),
        )),
    );
    event_bus.subscribe_all(
        &TERM_END_EVENT_TYPES,
        Arc::new(IdempotentHandler::new(
            TermEndScheduler::new(payment_provider.clone()),
            processed_events,
        )),
    );
    let outbox_publisher = Arc::new(OutboxPublisher::new(
        Arc::new(PostgresOutboxWriter::new(pool.clone())),
        event_bus,
    ));

    // 4. Background loops share one shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut background = Vec::new();
    {
        let publisher = outbox_publisher.clone();
        let shutdown = shutdown_rx.clone();
        background.push(tokio::spawn(async move { publisher.run(shutdown).await }));
    }
    if config.sweeper.enabled {
        let sweeper = Arc::new(ReconcileContractsHandler::new(
            contracts.clone(),
            payment_provider.clone(),
            config.sweeper.settings(),
        ));
        let shutdown = shutdown_rx.clone();
        background.push(tokio::spawn(async move { sweeper.run(shutdown).await }));
    } else {
        tracing::warn!("Reconciliation sweeper disabled");
    }

    // 5. HTTP
    let state = ContractAppState {
        contracts,
        parties: Arc::new(PostgresPartyDirectory::new(pool.clone())),
        payment_provider,
        webhook_events: Arc::new(PostgresWebhookEventRepository::new(pool.clone())),
        pricing_engine: Arc::new(config.pricing.engine()),
        checkout_settings: CheckoutSettings {
            app_base_url: config.payment.app_base_url.clone(),
            platform_fee: Percentage::try_new(config.payment.platform_fee_percent)?,
        },
    };
    let app = api_router(
        state,
        &HttpSettings {
            request_timeout: config.server.request_timeout(),
            cors_origins: config.server.cors_origins_list(),
        },
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. Drain background work
    tracing::info!("HTTP server stopped, stopping background tasks");
    let _ = shutdown_tx.send(true);
    for task in background {
        if tokio::time::timeout(config.server.shutdown_grace(), task).await.is_err() {
            tracing::warn!("Background task did not stop in time");
        }
    }
    pool.close().await;
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));

    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
