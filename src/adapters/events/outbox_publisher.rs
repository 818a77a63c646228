//! OutboxPublisher - Background service for reliable event delivery.
//!
//! Second half of the transactional outbox:
//! 1. The contract repository writes events in the same transaction as the contract row
//! 2. **OutboxPublisher polls the outbox and hands events to the event bus** ← This module
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 100ms | How often to check for unpublished events |
//! | `batch_size` | 100 | Max events to publish per poll cycle |
//! | `retention` | 7 days | Published entries older than this are purged |
//! | `cleanup_interval` | 1h | How often the purge runs |
//!
//! ## Graceful Shutdown
//!
//! The service listens for a shutdown signal and drains one last batch
//! before stopping.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::DomainError;
use crate::ports::{EventPublisher, OutboxWriter};

/// Configuration for the OutboxPublisher service.
#[derive(Debug, Clone)]
pub struct OutboxPublisherConfig {
    /// How often to poll for unpublished events.
    pub poll_interval: Duration,

    /// Maximum events to process per poll cycle.
    pub batch_size: u32,

    /// Hours a published entry is kept before purging. `None` keeps everything.
    pub retention_hours: Option<u32>,

    pub cleanup_interval: Duration,
}

impl Default for OutboxPublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            batch_size: 100,
            retention_hours: Some(7 * 24),
            cleanup_interval: Duration::from_secs(3600),
        }
    }
}

impl OutboxPublisherConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_retention_hours(mut self, hours: Option<u32>) -> Self {
        self.retention_hours = hours;
        self
    }
}

/// Background service that publishes events from the outbox.
pub struct OutboxPublisher {
    outbox: Arc<dyn OutboxWriter>,
    event_publisher: Arc<dyn EventPublisher>,
    config: OutboxPublisherConfig,
}

impl OutboxPublisher {
    pub fn new(outbox: Arc<dyn OutboxWriter>, event_publisher: Arc<dyn EventPublisher>) -> Self {
        Self::with_config(outbox, event_publisher, OutboxPublisherConfig::default())
    }

    pub fn with_config(
        outbox: Arc<dyn OutboxWriter>,
        event_publisher: Arc<dyn EventPublisher>,
        config: OutboxPublisherConfig,
    ) -> Self {
        Self {
            outbox,
            event_publisher,
            config,
        }
    }

    /// Run the publisher loop until the shutdown flag flips to `true`.
    ///
    /// Storage errors are logged and the next tick tries again; the loop
    /// only ends on shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut cleanup = time::interval(self.config.cleanup_interval);
        cleanup.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        if let Err(e) = self.process_batch().await {
                            tracing::error!(error = %e, "Final outbox drain failed");
                        }
                        tracing::info!("Outbox publisher stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.process_batch().await {
                        tracing::error!(error = %e, "Outbox poll failed");
                    }
                }

                _ = cleanup.tick() => {
                    if let Err(e) = self.purge_published().await {
                        tracing::warn!(error = %e, "Outbox cleanup failed");
                    }
                }
            }
        }
    }

    /// Publish one batch of pending events. Returns how many were delivered.
    pub async fn process_batch(&self) -> Result<usize, DomainError> {
        let entries = self.outbox.get_pending(self.config.batch_size).await?;
        let mut published_count = 0;

        for entry in entries {
            match self.event_publisher.publish(entry.event.clone()).await {
                Ok(()) => {
                    self.outbox.mark_published(entry.id).await?;
                    published_count += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        outbox_id = %entry.id,
                        event_id = %entry.event.event_id,
                        event_type = %entry.event.event_type,
                        attempts = entry.attempts + 1,
                        error = %e,
                        "Failed to publish outbox event"
                    );
                    self.outbox.mark_failed(entry.id, &e.to_string()).await?;
                }
            }
        }

        if published_count > 0 {
            tracing::debug!(published = published_count, "Outbox batch delivered");
        }

        Ok(published_count)
    }

    /// Delete published entries past the retention window. Returns how many went.
    pub async fn purge_published(&self) -> Result<u64, DomainError> {
        let Some(hours) = self.config.retention_hours else {
            return Ok(0);
        };
        let removed = self.outbox.cleanup_old(hours).await?;
        if removed > 0 {
            tracing::info!(removed, retention_hours = hours, "Purged published outbox entries");
        }
        Ok(removed)
    }

    /// Run exactly one poll cycle.
    pub async fn poll_once(&self) -> Result<usize, DomainError> {
        self.process_batch().await
    }
}
