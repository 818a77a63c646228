//! PostgreSQL implementation of ContractRepository.
//!
//! The contract row, its revenue record and its outbox events share one
//! transaction. The version column is the compare-and-set guard; the
//! partial unique index `contracts_blocking_triple_key` and the primary
//! key on `revenue_events.external_id` enforce the uniqueness rules.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::outbox::insert_outbox_events;
use crate::domain::contract::{Contract, ContractEvent, ContractStatus, FairShare, VideoSnapshot};
use crate::domain::foundation::{
    ContractId, DomainError, ErrorCode, Price, SerializableDomainEvent, Timestamp, UserId,
    VideoId,
};
use crate::ports::{
    CommitOutcome, ContractChange, ContractRepository, InsertOutcome, ReconcileCursor,
};

const BLOCKING_TRIPLE_CONSTRAINT: &str = "contracts_blocking_triple_key";
const PRIMARY_KEY_CONSTRAINT: &str = "contracts_pkey";

const SELECT_CONTRACT: &str = r#"
    SELECT id, licensor_id, licensee_id, original_video_id, original_title, original_url,
           original_duration_secs, reaction_video_id, pricing_model, price_value, currency,
           fair_share_score, fair_share_ref, accepted_by_licensor, accepted_by_licensee,
           licensor_accepted_at, licensee_accepted_at, session_id, subscription_id,
           customer_id, last_reported_usage, billing_cycle_anchor, status,
           created_at, updated_at, version
    FROM contracts
"#;

/// PostgreSQL implementation of the ContractRepository port.
pub struct PostgresContractRepository {
    pool: PgPool,
}

impl PostgresContractRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'_, Postgres>, DomainError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to start transaction: {}", e)))
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        value: &str,
    ) -> Result<Option<Contract>, DomainError> {
        let sql = format!("{} WHERE {} = $1", SELECT_CONTRACT, clause);
        let row: Option<ContractRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to fetch contract: {}", e)))?;
        row.map(Contract::try_from).transpose()
    }
}

/// Database row representation of a contract.
#[derive(Debug, sqlx::FromRow)]
struct ContractRow {
    id: Uuid,
    licensor_id: String,
    licensee_id: String,
    original_video_id: String,
    original_title: String,
    original_url: String,
    original_duration_secs: f64,
    reaction_video_id: Option<String>,
    pricing_model: String,
    price_value: f64,
    currency: String,
    fair_share_score: f64,
    fair_share_ref: String,
    accepted_by_licensor: bool,
    accepted_by_licensee: bool,
    licensor_accepted_at: Option<DateTime<Utc>>,
    licensee_accepted_at: Option<DateTime<Utc>>,
    session_id: Option<String>,
    subscription_id: Option<String>,
    customer_id: Option<String>,
    last_reported_usage: i64,
    billing_cycle_anchor: Option<DateTime<Utc>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

fn corrupt(field: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::database(format!("Invalid stored {}: {}", field, err))
}

impl TryFrom<ContractRow> for Contract {
    type Error = DomainError;

    fn try_from(row: ContractRow) -> Result<Self, Self::Error> {
        Ok(Contract {
            id: ContractId::from_uuid(row.id),
            licensor_id: UserId::new(row.licensor_id).map_err(|e| corrupt("licensor_id", e))?,
            licensee_id: UserId::new(row.licensee_id).map_err(|e| corrupt("licensee_id", e))?,
            original_video: VideoSnapshot {
                video_id: VideoId::new(row.original_video_id)
                    .map_err(|e| corrupt("original_video_id", e))?,
                title: row.original_title,
                url: row.original_url,
                duration_secs: row.original_duration_secs,
            },
            reaction_video_id: row
                .reaction_video_id
                .map(VideoId::new)
                .transpose()
                .map_err(|e| corrupt("reaction_video_id", e))?,
            pricing_model: row
                .pricing_model
                .parse()
                .map_err(|e| corrupt("pricing_model", e))?,
            price_value: Price::try_new(row.price_value).map_err(|e| corrupt("price_value", e))?,
            currency: row.currency,
            fair_share: FairShare::new(row.fair_share_score, row.fair_share_ref)
                .map_err(|e| corrupt("fair_share", e))?,
            accepted_by_licensor: row.accepted_by_licensor,
            accepted_by_licensee: row.accepted_by_licensee,
            licensor_accepted_at: row.licensor_accepted_at.map(Timestamp::from_datetime),
            licensee_accepted_at: row.licensee_accepted_at.map(Timestamp::from_datetime),
            session_id: row.session_id,
            subscription_id: row.subscription_id,
            customer_id: row.customer_id,
            last_reported_usage: row.last_reported_usage,
            billing_cycle_anchor: row.billing_cycle_anchor.map(Timestamp::from_datetime),
            status: row
                .status
                .parse::<ContractStatus>()
                .map_err(|e| corrupt("status", e))?,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version,
        })
    }
}

fn violated_constraint(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint().map(str::to_string),
        _ => None,
    }
}

fn database_error(action: &str, err: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", action, err))
}

async fn write_events(
    tx: &mut Transaction<'_, Postgres>,
    contract_id: &ContractId,
    events: &[ContractEvent],
) -> Result<(), DomainError> {
    let envelopes = events
        .iter()
        .map(|event| event.to_envelope())
        .collect::<Result<Vec<_>, _>>()?;
    insert_outbox_events(tx, &envelopes, &contract_id.to_string()).await
}

#[async_trait]
impl ContractRepository for PostgresContractRepository {
    async fn insert(
        &self,
        contract: &Contract,
        events: &[ContractEvent],
    ) -> Result<InsertOutcome, DomainError> {
        let mut tx = self.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO contracts (
                id, licensor_id, licensee_id, original_video_id, original_title, original_url,
                original_duration_secs, reaction_video_id, pricing_model, price_value, currency,
                fair_share_score, fair_share_ref, accepted_by_licensor, accepted_by_licensee,
                licensor_accepted_at, licensee_accepted_at, session_id, subscription_id,
                customer_id, last_reported_usage, billing_cycle_anchor, status,
                created_at, updated_at, version
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26
            )
            "#,
        )
        .bind(contract.id.as_uuid())
        .bind(contract.licensor_id.as_str())
        .bind(contract.licensee_id.as_str())
        .bind(contract.original_video.video_id.as_str())
        .bind(&contract.original_video.title)
        .bind(&contract.original_video.url)
        .bind(contract.original_video.duration_secs)
        .bind(contract.reaction_video_id.as_ref().map(|v| v.as_str()))
        .bind(contract.pricing_model.as_str())
        .bind(contract.price_value.value())
        .bind(&contract.currency)
        .bind(contract.fair_share.score)
        .bind(&contract.fair_share.documentation_ref)
        .bind(contract.accepted_by_licensor)
        .bind(contract.accepted_by_licensee)
        .bind(contract.licensor_accepted_at.map(|t| *t.as_datetime()))
        .bind(contract.licensee_accepted_at.map(|t| *t.as_datetime()))
        .bind(&contract.session_id)
        .bind(&contract.subscription_id)
        .bind(&contract.customer_id)
        .bind(contract.last_reported_usage)
        .bind(contract.billing_cycle_anchor.map(|t| *t.as_datetime()))
        .bind(contract.status.as_str())
        .bind(contract.created_at.as_datetime())
        .bind(contract.updated_at.as_datetime())
        .bind(contract.version)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            return match violated_constraint(&e).as_deref() {
                Some(PRIMARY_KEY_CONSTRAINT) => Ok(InsertOutcome::IdTaken),
                Some(BLOCKING_TRIPLE_CONSTRAINT) => Ok(InsertOutcome::TripleTaken),
                _ => Err(database_error("insert contract", e)),
            };
        }

        write_events(&mut tx, &contract.id, events).await?;

        tx.commit()
            .await
            .map_err(|e| database_error("commit contract insert", e))?;
        Ok(InsertOutcome::Inserted)
    }

    async fn find_by_id(&self, id: &ContractId) -> Result<Option<Contract>, DomainError> {
        let sql = format!("{} WHERE id = $1", SELECT_CONTRACT);
        let row: Option<ContractRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error("fetch contract", e))?;
        row.map(Contract::try_from).transpose()
    }

    async fn find_blocking(
        &self,
        licensee_id: &UserId,
        original_video_id: &VideoId,
        reaction_video_id: Option<&VideoId>,
    ) -> Result<Option<Contract>, DomainError> {
        let sql = format!(
            r#"{}
            WHERE licensee_id = $1
              AND original_video_id = $2
              AND COALESCE(reaction_video_id, '') = COALESCE($3, '')
              AND status IN ('PENDING_REVIEW', 'PENDING_PAYMENT', 'PAID', 'ACTIVE',
                             'PAYMENT_FAILED', 'REJECTED')
            ORDER BY created_at
            LIMIT 1
            "#,
            SELECT_CONTRACT
        );
        let row: Option<ContractRow> = sqlx::query_as(&sql)
            .bind(licensee_id.as_str())
            .bind(original_video_id.as_str())
            .bind(reaction_video_id.map(|v| v.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error("find blocking contract", e))?;
        row.map(Contract::try_from).transpose()
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Contract>, DomainError> {
        self.fetch_one_where("subscription_id", subscription_id).await
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Contract>, DomainError> {
        self.fetch_one_where("session_id", session_id).await
    }

    async fn find_reconcilable(
        &self,
        after: Option<ReconcileCursor>,
        limit: u32,
    ) -> Result<Vec<Contract>, DomainError> {
        let sql = format!(
            r#"{}
            WHERE status IN ('PENDING_PAYMENT', 'ACTIVE', 'PAYMENT_FAILED')
              AND (session_id IS NOT NULL OR subscription_id IS NOT NULL)
              AND ($1::timestamptz IS NULL OR (created_at, id) > ($1::timestamptz, $2::uuid))
            ORDER BY created_at, id
            LIMIT $3
            "#,
            SELECT_CONTRACT
        );
        let rows: Vec<ContractRow> = sqlx::query_as(&sql)
            .bind(after.map(|cursor| *cursor.created_at.as_datetime()))
            .bind(after.map(|cursor| *cursor.id.as_uuid()))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error("list reconcilable contracts", e))?;
        rows.into_iter().map(Contract::try_from).collect()
    }

    async fn commit(&self, change: ContractChange) -> Result<CommitOutcome, DomainError> {
        let contract = &change.contract;
        let mut tx = self.begin().await?;

        // 1. Compare-and-set on version
        let updated = sqlx::query(
            r#"
            UPDATE contracts SET
                reaction_video_id = $3,
                accepted_by_licensor = $4,
                accepted_by_licensee = $5,
                licensor_accepted_at = $6,
                licensee_accepted_at = $7,
                session_id = $8,
                subscription_id = $9,
                customer_id = $10,
                last_reported_usage = $11,
                billing_cycle_anchor = $12,
                status = $13,
                updated_at = $14,
                version = $15
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(contract.id.as_uuid())
        .bind(change.expected_version)
        .bind(contract.reaction_video_id.as_ref().map(|v| v.as_str()))
        .bind(contract.accepted_by_licensor)
        .bind(contract.accepted_by_licensee)
        .bind(contract.licensor_accepted_at.map(|t| *t.as_datetime()))
        .bind(contract.licensee_accepted_at.map(|t| *t.as_datetime()))
        .bind(&contract.session_id)
        .bind(&contract.subscription_id)
        .bind(&contract.customer_id)
        .bind(contract.last_reported_usage)
        .bind(contract.billing_cycle_anchor.map(|t| *t.as_datetime()))
        .bind(contract.status.as_str())
        .bind(contract.updated_at.as_datetime())
        .bind(contract.version)
        .execute(&mut *tx)
        .await;

        let updated = match updated {
            Ok(result) => result,
            Err(e) if violated_constraint(&e).as_deref() == Some(BLOCKING_TRIPLE_CONSTRAINT) => {
                drop(tx);
                return self.triple_conflict(contract).await;
            }
            Err(e) => return Err(database_error("update contract", e)),
        };
        if updated.rows_affected() == 0 {
            return Ok(CommitOutcome::VersionConflict);
        }

        // 2. Revenue, unique on the gateway's id
        if let Some(revenue) = &change.revenue {
            let recorded = sqlx::query(
                r#"
                INSERT INTO revenue_events (
                    external_id, contract_id, amount_minor, currency, kind, occurred_at
                ) VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (external_id) DO NOTHING
                "#,
            )
            .bind(&revenue.external_id)
            .bind(revenue.contract_id.as_uuid())
            .bind(revenue.amount_minor)
            .bind(&revenue.currency)
            .bind(revenue.kind.as_str())
            .bind(revenue.occurred_at.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| database_error("record revenue", e))?;

            if recorded.rows_affected() == 0 {
                tracing::debug!(
                    contract_id = %contract.id,
                    external_id = %revenue.external_id,
                    "Revenue already recorded; discarding change"
                );
                return Ok(CommitOutcome::DuplicateRevenue);
            }
        }

        // 3. Outbox
        write_events(&mut tx, &contract.id, &change.events).await?;

        tx.commit()
            .await
            .map_err(|e| database_error("commit contract change", e))?;
        Ok(CommitOutcome::Committed)
    }

    async fn delete_if_version(
        &self,
        id: &ContractId,
        expected_version: i64,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM contracts WHERE id = $1 AND version = $2")
            .bind(id.as_uuid())
            .bind(expected_version)
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("delete contract", e))?;
        Ok(result.rows_affected() > 0)
    }
}

impl PostgresContractRepository {
    /// A committed change would duplicate a blocking triple.
    async fn triple_conflict(&self, contract: &Contract) -> Result<CommitOutcome, DomainError> {
        let existing = self
            .find_blocking(
                &contract.licensee_id,
                &contract.original_video.video_id,
                contract.reaction_video_id.as_ref(),
            )
            .await?;
        match existing {
            Some(existing) if existing.id != contract.id => Err(DomainError::new(
                ErrorCode::DuplicateError,
                "blocking contract exists for triple",
            )
            .with_detail("existing", existing.id.to_string())),
            // The blocker went away between the failed update and the lookup.
            _ => Ok(CommitOutcome::VersionConflict),
        }
    }
}
