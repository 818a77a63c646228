//! ReportUsageHandler - Reports metered view growth to the gateway.

use std::sync::Arc;

use super::commit::{commit_at_version, ContractUpdate, Staged};
use crate::domain::contract::{ContractError, Party};
use crate::domain::foundation::{ContractId, Timestamp, UserId};
use crate::ports::{ContractRepository, PaymentErrorCode, PaymentProvider, UsageReport};

#[derive(Debug, Clone)]
pub struct ReportUsageCommand {
    pub contract_id: ContractId,
    pub requested_by: UserId,
    /// Cumulative view count of the reaction video.
    pub new_view_count: i64,
}

#[derive(Debug, Clone)]
pub struct ReportUsageResult {
    /// Views reported in this call; zero when nothing was new.
    pub reported_delta: i64,
    pub update: ContractUpdate,
}

/// Handler for metered usage reports.
///
/// The gateway call is keyed on the watermark the delta starts from, so
/// two reports computed against the same watermark collide at the
/// gateway and only one is billed. The watermark then moves by a single
/// compare-and-set against the version the delta was read at; the loser
/// of a race gets `ConcurrentModification` and should resend its count.
pub struct ReportUsageHandler {
    contracts: Arc<dyn ContractRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl ReportUsageHandler {
    pub fn new(
        contracts: Arc<dyn ContractRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            contracts,
            payment_provider,
        }
    }

    pub async fn handle(&self, cmd: ReportUsageCommand) -> Result<ReportUsageResult, ContractError> {
        if cmd.new_view_count < 0 {
            return Err(ContractError::validation(
                "new_view_count",
                "must not be negative",
            ));
        }

        let contract = self
            .contracts
            .find_by_id(&cmd.contract_id)
            .await?
            .ok_or(ContractError::NotFound(cmd.contract_id))?;
        contract.check_party(&cmd.requested_by, Party::Licensee, "report usage for")?;
        let subscription_id = contract.ensure_usage_reportable()?.to_string();

        let delta = contract.usage_delta(cmd.new_view_count);
        if delta == 0 {
            tracing::debug!(
                contract_id = %contract.id,
                new_view_count = cmd.new_view_count,
                last_reported = contract.last_reported_usage,
                "No new usage to report"
            );
            return Ok(ReportUsageResult {
                reported_delta: 0,
                update: ContractUpdate {
                    contract,
                    changed: false,
                },
            });
        }

        let from = contract.last_reported_usage;
        self.payment_provider
            .report_usage(UsageReport {
                subscription_id: subscription_id.clone(),
                quantity: delta,
                timestamp: Timestamp::now(),
                idempotency_key: format!("usage-{}-from-{}", contract.id, from),
            })
            .await
            .map_err(|e| match e.code {
                PaymentErrorCode::IdempotencyConflict => {
                    ContractError::ConcurrentModification(cmd.contract_id)
                }
                _ => e.into(),
            })?;

        let committed = commit_at_version(self.contracts.as_ref(), contract, |current| {
            let transition = current.record_usage_report(cmd.new_view_count, Timestamp::now())?;
            Ok(Staged::from_transition(transition))
        })
        .await?;

        tracing::info!(
            contract_id = %cmd.contract_id,
            subscription_id = %subscription_id,
            delta,
            total = cmd.new_view_count,
            "Usage reported"
        );
        Ok(ReportUsageResult {
            reported_delta: delta,
            update: committed.into(),
        })
    }
}
