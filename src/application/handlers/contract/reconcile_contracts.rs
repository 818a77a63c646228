//! ReconcileContractsHandler - Periodic sweep against gateway truth.
//!
//! Catches up contracts whose webhook never arrived or arrived out of
//! order. Each contract is synced on its own: one failing lookup is
//! counted and logged, never allowed to abort the batch.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time;

use super::apply_gateway_fact::{FactApplication, GatewayFactApplier};
use super::session_facts::fact_from_session;
use crate::domain::contract::{Contract, ContractError, ContractStatus, GatewayFact};
use crate::ports::{ContractRepository, PaymentProvider, ReconcileCursor};

/// Tuning for the sweep.
#[derive(Debug, Clone)]
pub struct SweeperSettings {
    pub interval: Duration,
    pub batch_size: u32,
    /// Contracts synced in parallel.
    pub concurrency: usize,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            batch_size: 100,
            concurrency: 8,
        }
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub updated: usize,
    pub unchanged: usize,
    pub errored: usize,
}

impl SweepSummary {
    pub fn total(&self) -> usize {
        self.updated + self.unchanged + self.errored
    }
}

enum SyncOutcome {
    Updated,
    Unchanged,
}

pub struct ReconcileContractsHandler {
    contracts: Arc<dyn ContractRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    applier: GatewayFactApplier,
    settings: SweeperSettings,
}

impl ReconcileContractsHandler {
    pub fn new(
        contracts: Arc<dyn ContractRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        settings: SweeperSettings,
    ) -> Self {
        let applier = GatewayFactApplier::new(contracts.clone());
        Self {
            contracts,
            payment_provider,
            applier,
            settings,
        }
    }

    /// Sweep on every tick until the shutdown flag flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Reconciliation sweeper stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!(error = %e, "Reconciliation sweep failed");
                    }
                }
            }
        }
    }

    /// Run one sweep over every candidate, `batch_size` contracts per page.
    ///
    /// Only loading a page can fail; per-contract failures land in
    /// `SweepSummary::errored`.
    pub async fn sweep(&self) -> Result<SweepSummary, ContractError> {
        let page_size = self.settings.batch_size.max(1);
        let mut summary = SweepSummary::default();
        let mut cursor: Option<ReconcileCursor> = None;

        loop {
            let page = self.contracts.find_reconcilable(cursor, page_size).await?;
            let full_page = page.len() >= page_size as usize;
            cursor = page.last().map(ReconcileCursor::after);

            self.sync_page(page, &mut summary).await;

            if !full_page {
                break;
            }
        }

        if summary.total() > 0 {
            tracing::info!(
                updated = summary.updated,
                unchanged = summary.unchanged,
                errored = summary.errored,
                "Reconciliation sweep finished"
            );
        }
        Ok(summary)
    }

    async fn sync_page(&self, page: Vec<Contract>, summary: &mut SweepSummary) {
        let outcomes: Vec<_> = stream::iter(page)
            .map(|contract| async move {
                let id = contract.id;
                (id, self.sync(contract).await)
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        for (contract_id, outcome) in outcomes {
            match outcome {
                Ok(SyncOutcome::Updated) => summary.updated += 1,
                Ok(SyncOutcome::Unchanged) => summary.unchanged += 1,
                Err(e) => {
                    tracing::warn!(
                        contract_id = %contract_id,
                        error = %e,
                        retryable = e.is_retryable(),
                        "Contract reconciliation failed"
                    );
                    summary.errored += 1;
                }
            }
        }
    }

    async fn sync(&self, contract: Contract) -> Result<SyncOutcome, ContractError> {
        let Some(fact) = self.observe(&contract).await? else {
            return Ok(SyncOutcome::Unchanged);
        };

        match self.applier.apply(contract.id, &fact).await? {
            FactApplication::Applied(_) => Ok(SyncOutcome::Updated),
            FactApplication::Unchanged(_) => Ok(SyncOutcome::Unchanged),
        }
    }

    /// Current gateway truth for one contract, if it says anything.
    async fn observe(&self, contract: &Contract) -> Result<Option<GatewayFact>, ContractError> {
        if let Some(subscription_id) = &contract.subscription_id {
            let subscription = self
                .payment_provider
                .retrieve_subscription(subscription_id)
                .await?;
            return Ok(Some(GatewayFact::SubscriptionStatusObserved(
                subscription.status,
            )));
        }

        match (&contract.session_id, contract.status) {
            (Some(session_id), ContractStatus::PendingPayment) => {
                let session = self
                    .payment_provider
                    .retrieve_checkout_session(session_id)
                    .await?;
                Ok(fact_from_session(contract, &session))
            }
            _ => Ok(None),
        }
    }
}
