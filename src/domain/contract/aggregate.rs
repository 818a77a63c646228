//! Contract aggregate entity.
//!
//! A Contract licenses reaction-style use of one original video by one
//! licensee. Caller-facing transitions live here; gateway-driven ones
//! are in `gateway`.
//!
//! # Design Decisions
//!
//! - **Caller-minted id**: the id doubles as an idempotency key for creation
//! - **Optimistic locking**: `version` is compared-and-bumped by the store
//! - **Idempotent transitions**: replaying an applied action yields `Transition::Unchanged`

use crate::domain::foundation::{
    ContractId, Price, StateMachine, Timestamp, UserId, ValidationError, VideoId,
};
use crate::domain::pricing::PricingModel;
use serde::{Deserialize, Serialize};

use super::{ContractError, ContractEvent, ContractEventKind, ContractStatus, LicensorPolicy};

/// Snapshot of the original video taken at request time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSnapshot {
    pub video_id: VideoId,
    pub title: String,
    pub url: String,
    pub duration_secs: f64,
}

/// Fair-share audit data. Informational only; never re-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairShare {
    /// Share in [0, 1].
    pub score: f64,
    pub documentation_ref: String,
}

impl FairShare {
    pub fn new(score: f64, documentation_ref: impl Into<String>) -> Result<Self, ValidationError> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(ValidationError::out_of_range("fair_share.score", 0.0, 1.0, score));
        }
        Ok(Self {
            score,
            documentation_ref: documentation_ref.into(),
        })
    }
}

/// Terms presented by the licensee when requesting a license.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContract {
    pub id: ContractId,
    pub licensor_id: UserId,
    pub licensee_id: UserId,
    pub original_video: VideoSnapshot,
    pub reaction_video_id: Option<VideoId>,
    pub pricing_model: PricingModel,
    pub price_value: Price,
    pub currency: String,
    pub fair_share: FairShare,
}

/// A licence request before pricing.
///
/// Price and fair share are always computed server-side from reach
/// metrics; see `LicenceRequest::priced`.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenceRequest {
    pub id: ContractId,
    pub licensor_id: UserId,
    pub licensee_id: UserId,
    pub original_video: VideoSnapshot,
    pub reaction_video_id: Option<VideoId>,
    pub pricing_model: PricingModel,
    pub currency: String,
}

impl LicenceRequest {
    pub fn priced(self, price_value: Price, fair_share: FairShare) -> NewContract {
        NewContract {
            id: self.id,
            licensor_id: self.licensor_id,
            licensee_id: self.licensee_id,
            original_video: self.original_video,
            reaction_video_id: self.reaction_video_id,
            pricing_model: self.pricing_model,
            price_value,
            currency: self.currency,
            fair_share,
        }
    }
}

/// Outcome of a caller-facing transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// State changed; persist and publish these events.
    Applied(Vec<ContractEvent>),
    /// Replay of an action that already took effect.
    Unchanged,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }
}

/// Contract aggregate.
///
/// # Invariants
///
/// - `licensor_id`, `licensee_id`, `original_video` and `created_at` never change
/// - FIXED `price_value` is at least the licensor floor in force at creation
/// - `status` only moves along `ContractStatus::valid_transitions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub licensor_id: UserId,
    pub licensee_id: UserId,
    pub original_video: VideoSnapshot,
    pub reaction_video_id: Option<VideoId>,

    pub pricing_model: PricingModel,
    pub price_value: Price,
    pub currency: String,
    pub fair_share: FairShare,

    pub accepted_by_licensor: bool,
    pub accepted_by_licensee: bool,
    pub licensor_accepted_at: Option<Timestamp>,
    pub licensee_accepted_at: Option<Timestamp>,

    /// Gateway checkout session.
    pub session_id: Option<String>,
    /// Gateway subscription (METERED only).
    pub subscription_id: Option<String>,
    /// Gateway customer (METERED only).
    pub customer_id: Option<String>,
    /// Cumulative views already reported to the gateway.
    pub last_reported_usage: i64,
    pub billing_cycle_anchor: Option<Timestamp>,

    pub status: ContractStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i64,
}

impl Contract {
    /// Creates a contract from licensee-presented terms.
    ///
    /// The licensee accepts implicitly. With `policy.auto_accept` the
    /// licensor does too and the contract starts in `PendingPayment`.
    pub fn create(
        new: NewContract,
        policy: &LicensorPolicy,
        now: Timestamp,
    ) -> Result<(Self, Vec<ContractEvent>), ContractError> {
        if new.licensor_id == new.licensee_id {
            return Err(ContractError::validation(
                "licensee_id",
                "licensor cannot license their own video",
            ));
        }
        let currency = new.currency.trim().to_ascii_lowercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ContractError::validation(
                "currency",
                "must be a three-letter ISO code",
            ));
        }
        if !new.original_video.duration_secs.is_finite() || new.original_video.duration_secs < 0.0
        {
            return Err(ContractError::validation(
                "original_video.duration_secs",
                "must be a non-negative number",
            ));
        }

        let price_value = match new.pricing_model {
            PricingModel::Fixed => new.price_value.max(policy.floor_price),
            PricingModel::Metered => new.price_value,
        };

        let (status, accepted_by_licensor, licensor_accepted_at) = if policy.auto_accept {
            (ContractStatus::PendingPayment, true, Some(now))
        } else {
            (ContractStatus::PendingReview, false, None)
        };

        let contract = Self {
            id: new.id,
            licensor_id: new.licensor_id,
            licensee_id: new.licensee_id,
            original_video: new.original_video,
            reaction_video_id: new.reaction_video_id,
            pricing_model: new.pricing_model,
            price_value,
            currency,
            fair_share: new.fair_share,
            accepted_by_licensor,
            accepted_by_licensee: true,
            licensor_accepted_at,
            licensee_accepted_at: Some(now),
            session_id: None,
            subscription_id: None,
            customer_id: None,
            last_reported_usage: 0,
            billing_cycle_anchor: None,
            status,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let event = ContractEvent::new(
            contract.id,
            now,
            ContractEventKind::Created {
                licensor_id: contract.licensor_id.clone(),
                licensee_id: contract.licensee_id.clone(),
                pricing_model: contract.pricing_model,
                price_value: contract.price_value.value(),
                status,
            },
        );

        Ok((contract, vec![event]))
    }

    /// True if `other` targets the same licensee / original / reaction triple.
    pub fn same_triple(&self, other: &LicenceRequest) -> bool {
        self.licensee_id == other.licensee_id
            && self.original_video.video_id == other.original_video.video_id
            && self.reaction_video_id == other.reaction_video_id
    }

    /// Licensor accepts a pending request.
    pub fn accept(&mut self, now: Timestamp) -> Result<Transition, ContractError> {
        match self.status {
            ContractStatus::PendingReview => {
                self.transition_to(ContractStatus::PendingPayment, "accept")?;
                self.accepted_by_licensor = true;
                self.licensor_accepted_at = Some(now);
                self.updated_at = now;
                Ok(Transition::Applied(vec![self.event(
                    now,
                    ContractEventKind::Accepted {
                        licensor_id: self.licensor_id.clone(),
                    },
                )]))
            }
            ContractStatus::PendingPayment
            | ContractStatus::Paid
            | ContractStatus::Active
            | ContractStatus::PaymentFailed => Ok(Transition::Unchanged),
            status => Err(ContractError::invalid_state(status, "accept")),
        }
    }

    /// Licensor rejects a pending request. The triple stays blocked afterwards.
    pub fn reject(&mut self, now: Timestamp) -> Result<Transition, ContractError> {
        match self.status {
            ContractStatus::PendingReview => {
                self.transition_to(ContractStatus::Rejected, "reject")?;
                self.updated_at = now;
                Ok(Transition::Applied(vec![self.event(
                    now,
                    ContractEventKind::Rejected {
                        licensor_id: self.licensor_id.clone(),
                    },
                )]))
            }
            ContractStatus::Rejected => Ok(Transition::Unchanged),
            status if status.is_payment_confirmed() => {
                Err(ContractError::already_settled(self.id, status))
            }
            status => Err(ContractError::invalid_state(status, "reject")),
        }
    }

    /// Licensee withdraws before any payment.
    pub fn withdraw(&mut self, now: Timestamp) -> Result<Transition, ContractError> {
        match self.status {
            ContractStatus::PendingReview | ContractStatus::PendingPayment => {
                self.transition_to(ContractStatus::Withdrawn, "withdraw")?;
                self.updated_at = now;
                Ok(Transition::Applied(vec![self.event(
                    now,
                    ContractEventKind::Withdrawn {
                        licensee_id: self.licensee_id.clone(),
                    },
                )]))
            }
            ContractStatus::Withdrawn => Ok(Transition::Unchanged),
            status @ (ContractStatus::Paid
            | ContractStatus::Active
            | ContractStatus::PaymentFailed
            | ContractStatus::Cancelled) => Err(ContractError::already_settled(self.id, status)),
            status => Err(ContractError::invalid_state(status, "withdraw")),
        }
    }

    /// Fills in the reaction video chosen after the request was made.
    pub fn attach_reaction_video(
        &mut self,
        video_id: VideoId,
        now: Timestamp,
    ) -> Result<Transition, ContractError> {
        match &self.reaction_video_id {
            Some(existing) if *existing == video_id => return Ok(Transition::Unchanged),
            Some(_) => return Err(ContractError::ReactionVideoAlreadySet(self.id)),
            None => {}
        }
        if self.status.is_terminal() || self.status.is_payment_confirmed() {
            return Err(ContractError::invalid_state(self.status, "attach a reaction video to"));
        }
        self.reaction_video_id = Some(video_id.clone());
        self.updated_at = now;
        Ok(Transition::Applied(vec![self.event(
            now,
            ContractEventKind::ReactionVideoAttached {
                reaction_video_id: video_id,
            },
        )]))
    }

    /// Records the gateway checkout session opened for this contract.
    pub fn record_checkout_session(
        &mut self,
        session_id: impl Into<String>,
        now: Timestamp,
    ) -> Result<Transition, ContractError> {
        let session_id = session_id.into();
        if self.status != ContractStatus::PendingPayment {
            return Err(ContractError::invalid_state(self.status, "start checkout for"));
        }
        if self.session_id.as_deref() == Some(session_id.as_str()) {
            return Ok(Transition::Unchanged);
        }
        self.session_id = Some(session_id.clone());
        self.updated_at = now;
        Ok(Transition::Applied(vec![self.event(
            now,
            ContractEventKind::CheckoutStarted { session_id },
        )]))
    }

    /// Views not yet reported to the gateway. Never negative.
    pub fn usage_delta(&self, new_view_count: i64) -> i64 {
        (new_view_count - self.last_reported_usage).max(0)
    }

    /// Checks that metered usage can be reported for this contract.
    pub fn ensure_usage_reportable(&self) -> Result<&str, ContractError> {
        if self.pricing_model != PricingModel::Metered {
            return Err(ContractError::validation(
                "pricing_model",
                "usage is only reported for METERED contracts",
            ));
        }
        match (self.status, self.subscription_id.as_deref()) {
            (ContractStatus::Active | ContractStatus::PaymentFailed, Some(subscription_id)) => {
                Ok(subscription_id)
            }
            (status, _) => Err(ContractError::invalid_state(status, "report usage for")),
        }
    }

    /// Advances the reported-usage watermark after the gateway accepted a report.
    pub fn record_usage_report(
        &mut self,
        new_view_count: i64,
        now: Timestamp,
    ) -> Result<Transition, ContractError> {
        self.ensure_usage_reportable()?;
        let delta = self.usage_delta(new_view_count);
        if delta == 0 {
            return Ok(Transition::Unchanged);
        }
        self.last_reported_usage = new_view_count;
        self.updated_at = now;
        Ok(Transition::Applied(vec![self.event(
            now,
            ContractEventKind::UsageReported {
                delta,
                total: new_view_count,
            },
        )]))
    }

    pub(super) fn event(&self, now: Timestamp, kind: ContractEventKind) -> ContractEvent {
        ContractEvent::new(self.id, now, kind)
    }

    pub(super) fn transition_to(
        &mut self,
        target: ContractStatus,
        attempted: &str,
    ) -> Result<(), ContractError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| ContractError::invalid_state(self.status, attempted))?;
        Ok(())
    }
}
