//! Gateway-driven transitions.
//!
//! Webhook ingestion and the reconciliation sweeper both translate what
//! the payment gateway reports into a `GatewayFact` and apply it here, so
//! the two paths commute. Applying a fact is total: facts that do not
//! apply to the current state are absorbed without error.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{StateMachine, Timestamp};

use super::{Contract, ContractEvent, ContractEventKind, ContractStatus, RevenueEvent, RevenueKind};

/// Subscription status as reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Paused,
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// Parses the gateway's wire value; unrecognised values map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "past_due" => SubscriptionStatus::PastDue,
            "unpaid" => SubscriptionStatus::Unpaid,
            "canceled" => SubscriptionStatus::Canceled,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "paused" => SubscriptionStatus::Paused,
            _ => SubscriptionStatus::Unknown,
        }
    }

    /// Contract status implied by this subscription status, if any.
    pub fn contract_status(&self) -> Option<ContractStatus> {
        match self {
            SubscriptionStatus::Active | SubscriptionStatus::Trialing => {
                Some(ContractStatus::Active)
            }
            SubscriptionStatus::Canceled => Some(ContractStatus::Cancelled),
            SubscriptionStatus::Unpaid
            | SubscriptionStatus::IncompleteExpired
            | SubscriptionStatus::PastDue => Some(ContractStatus::PaymentFailed),
            SubscriptionStatus::Incomplete => Some(ContractStatus::PendingPayment),
            SubscriptionStatus::Paused | SubscriptionStatus::Unknown => None,
        }
    }
}

/// Something the payment gateway asserts about a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayFact {
    /// One-time checkout paid.
    CheckoutCompletedOneTime {
        session_id: String,
        amount_minor: i64,
        currency: String,
    },

    /// Subscription checkout completed.
    CheckoutCompletedRecurring {
        session_id: String,
        subscription_id: String,
        customer_id: Option<String>,
    },

    InvoicePaid {
        invoice_id: String,
        amount_minor: i64,
        currency: String,
        subscription_id: String,
        customer_id: Option<String>,
    },

    InvoicePaymentFailed { invoice_id: String },

    SubscriptionDeleted,

    /// Current subscription status (sweeper or `customer.subscription.updated`).
    SubscriptionStatusObserved(SubscriptionStatus),

    /// Checkout session expired unpaid.
    SessionExpired,
}

impl GatewayFact {
    pub fn name(&self) -> &'static str {
        match self {
            GatewayFact::CheckoutCompletedOneTime { .. } => "checkout_completed_one_time",
            GatewayFact::CheckoutCompletedRecurring { .. } => "checkout_completed_recurring",
            GatewayFact::InvoicePaid { .. } => "invoice_paid",
            GatewayFact::InvoicePaymentFailed { .. } => "invoice_payment_failed",
            GatewayFact::SubscriptionDeleted => "subscription_deleted",
            GatewayFact::SubscriptionStatusObserved(_) => "subscription_status_observed",
            GatewayFact::SessionExpired => "session_expired",
        }
    }
}

/// Result of applying a fact.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactOutcome {
    /// Contract fields changed and must be persisted.
    pub changed: bool,
    pub events: Vec<ContractEvent>,
    pub revenue: Option<RevenueEvent>,
}

impl FactOutcome {
    /// Nothing to persist.
    pub fn is_noop(&self) -> bool {
        !self.changed && self.revenue.is_none()
    }

    /// The end-of-term cancellation queued by this outcome, if any.
    pub fn term_end(&self) -> Option<(&str, Timestamp)> {
        self.events.iter().find_map(|event| match &event.kind {
            ContractEventKind::TermEndRequested {
                subscription_id,
                cancel_at,
            } => Some((subscription_id.as_str(), *cancel_at)),
            _ => None,
        })
    }
}

/// Length of a license term.
pub const LICENSE_TERM_YEARS: u32 = 1;

impl Contract {
    /// Applies a gateway fact. Never fails; inapplicable facts leave the contract untouched.
    pub fn apply_gateway_fact(&mut self, fact: &GatewayFact, now: Timestamp) -> FactOutcome {
        let mut outcome = FactOutcome::default();

        match fact {
            GatewayFact::CheckoutCompletedOneTime {
                session_id,
                amount_minor,
                currency,
            } => {
                if self.status == ContractStatus::PendingPayment
                    && self.move_to(ContractStatus::Paid, now)
                {
                    if self.session_id.is_none() {
                        self.session_id = Some(session_id.clone());
                    }
                    outcome.changed = true;
                    outcome.events.push(self.event(
                        now,
                        ContractEventKind::PaymentConfirmed {
                            status: ContractStatus::Paid,
                            subscription_id: None,
                        },
                    ));
                    outcome.revenue = Some(self.revenue(
                        session_id,
                        *amount_minor,
                        currency,
                        RevenueKind::OneTimePayment,
                        now,
                    ));
                } else {
                    self.absorb(fact);
                }
            }

            GatewayFact::CheckoutCompletedRecurring {
                session_id,
                subscription_id,
                customer_id,
            } => {
                let was_pending = self.status == ContractStatus::PendingPayment;
                self.activate(subscription_id, customer_id.as_deref(), now, &mut outcome);
                if was_pending && outcome.changed && self.session_id.is_none() {
                    self.session_id = Some(session_id.clone());
                }
            }

            GatewayFact::InvoicePaid {
                invoice_id,
                amount_minor,
                currency,
                subscription_id,
                customer_id,
            } => {
                let revenue = self.revenue(
                    invoice_id,
                    *amount_minor,
                    currency,
                    RevenueKind::SubscriptionInvoice,
                    now,
                );
                match self.status {
                    ContractStatus::PendingPayment => {
                        self.activate(subscription_id, customer_id.as_deref(), now, &mut outcome);
                        outcome.revenue = Some(revenue);
                    }
                    ContractStatus::Active => {
                        if self.link_subscription(subscription_id, customer_id.as_deref()) {
                            self.updated_at = now;
                            outcome.changed = true;
                        }
                        outcome.revenue = Some(revenue);
                    }
                    ContractStatus::PaymentFailed => {
                        if self.move_to(ContractStatus::Active, now) {
                            outcome.changed = true;
                            outcome.events.push(self.event(
                                now,
                                ContractEventKind::PaymentRecovered {
                                    invoice_id: Some(invoice_id.clone()),
                                },
                            ));
                        }
                        outcome.revenue = Some(revenue);
                    }
                    ContractStatus::Cancelled => {
                        outcome.revenue = Some(revenue);
                    }
                    _ => self.absorb(fact),
                }
            }

            GatewayFact::InvoicePaymentFailed { invoice_id } => {
                if self.status == ContractStatus::Active
                    && self.move_to(ContractStatus::PaymentFailed, now)
                {
                    outcome.changed = true;
                    outcome.events.push(self.event(
                        now,
                        ContractEventKind::PaymentFailed {
                            invoice_id: Some(invoice_id.clone()),
                        },
                    ));
                } else {
                    self.absorb(fact);
                }
            }

            GatewayFact::SubscriptionDeleted => {
                self.cancel("subscription_deleted", fact, now, &mut outcome);
            }

            GatewayFact::SessionExpired => {
                if self.status == ContractStatus::PendingPayment {
                    self.cancel("checkout_expired", fact, now, &mut outcome);
                } else {
                    self.absorb(fact);
                }
            }

            GatewayFact::SubscriptionStatusObserved(observed) => {
                self.observe_subscription_status(*observed, fact, now, &mut outcome);
            }
        }

        outcome
    }

    fn observe_subscription_status(
        &mut self,
        observed: SubscriptionStatus,
        fact: &GatewayFact,
        now: Timestamp,
        outcome: &mut FactOutcome,
    ) {
        let Some(target) = observed.contract_status() else {
            self.absorb(fact);
            return;
        };
        if target == self.status {
            return;
        }

        match (self.status, target) {
            (ContractStatus::PendingPayment, ContractStatus::Active) => {
                if let Some(subscription_id) = self.subscription_id.clone() {
                    let customer_id = self.customer_id.clone();
                    self.activate(&subscription_id, customer_id.as_deref(), now, outcome);
                } else {
                    self.absorb(fact);
                }
            }
            (_, ContractStatus::Cancelled) => {
                self.cancel("subscription_canceled", fact, now, outcome);
            }
            (ContractStatus::Active, ContractStatus::PaymentFailed) => {
                if self.move_to(ContractStatus::PaymentFailed, now) {
                    outcome.changed = true;
                    outcome.events.push(
                        self.event(now, ContractEventKind::PaymentFailed { invoice_id: None }),
                    );
                }
            }
            (ContractStatus::PaymentFailed, ContractStatus::Active) => {
                if self.move_to(ContractStatus::Active, now) {
                    outcome.changed = true;
                    outcome.events.push(
                        self.event(now, ContractEventKind::PaymentRecovered { invoice_id: None }),
                    );
                }
            }
            _ => self.absorb(fact),
        }
    }

    /// PendingPayment -> Active with subscription linkage and term scheduling.
    fn activate(
        &mut self,
        subscription_id: &str,
        customer_id: Option<&str>,
        now: Timestamp,
        outcome: &mut FactOutcome,
    ) {
        match self.status {
            ContractStatus::PendingPayment => {
                if !self.move_to(ContractStatus::Active, now) {
                    return;
                }
                self.link_subscription(subscription_id, customer_id);
                self.billing_cycle_anchor = Some(now);
                outcome.changed = true;
                outcome.events.push(self.event(
                    now,
                    ContractEventKind::PaymentConfirmed {
                        status: ContractStatus::Active,
                        subscription_id: Some(subscription_id.to_string()),
                    },
                ));
                outcome.events.push(self.event(
                    now,
                    ContractEventKind::TermEndRequested {
                        subscription_id: subscription_id.to_string(),
                        cancel_at: self.created_at.add_years(LICENSE_TERM_YEARS),
                    },
                ));
            }
            ContractStatus::Active | ContractStatus::PaymentFailed => {
                if self.link_subscription(subscription_id, customer_id) {
                    self.updated_at = now;
                    outcome.changed = true;
                }
            }
            _ => {
                tracing::info!(
                    contract_id = %self.id,
                    status = %self.status,
                    "Ignoring subscription activation for contract outside payment flow"
                );
            }
        }
    }

    fn cancel(
        &mut self,
        reason: &str,
        fact: &GatewayFact,
        now: Timestamp,
        outcome: &mut FactOutcome,
    ) {
        if self.status == ContractStatus::Cancelled {
            return;
        }
        if self.move_to(ContractStatus::Cancelled, now) {
            outcome.changed = true;
            outcome.events.push(self.event(
                now,
                ContractEventKind::Cancelled {
                    reason: reason.to_string(),
                },
            ));
        } else {
            self.absorb(fact);
        }
    }

    /// Fills missing gateway identifiers. Returns true if anything changed.
    fn link_subscription(&mut self, subscription_id: &str, customer_id: Option<&str>) -> bool {
        let mut changed = false;
        if self.subscription_id.is_none() {
            self.subscription_id = Some(subscription_id.to_string());
            changed = true;
        }
        if let (None, Some(customer)) = (&self.customer_id, customer_id) {
            self.customer_id = Some(customer.to_string());
            changed = true;
        }
        changed
    }

    fn move_to(&mut self, target: ContractStatus, now: Timestamp) -> bool {
        if !self.status.can_transition_to(&target) {
            return false;
        }
        tracing::debug!(
            contract_id = %self.id,
            from = %self.status,
            to = %target,
            "Contract status transition"
        );
        self.status = target;
        self.updated_at = now;
        true
    }

    fn absorb(&self, fact: &GatewayFact) {
        tracing::info!(
            contract_id = %self.id,
            status = %self.status,
            fact = fact.name(),
            "Gateway fact does not apply to current state; ignoring"
        );
    }

    fn revenue(
        &self,
        external_id: &str,
        amount_minor: i64,
        currency: &str,
        kind: RevenueKind,
        now: Timestamp,
    ) -> RevenueEvent {
        RevenueEvent {
            external_id: external_id.to_string(),
            contract_id: self.id,
            amount_minor,
            currency: currency.to_ascii_lowercase(),
            kind,
            occurred_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::aggregate::tests::{new_contract, pending_review};
    use crate::domain::contract::LicensorPolicy;
    use crate::domain::foundation::Price;
    use crate::domain::pricing::PricingModel;

    fn payable_metered() -> Contract {
        Contract::create(
            new_contract(PricingModel::Metered, 1.17),
            &LicensorPolicy::new(true, Price::ZERO),
            Timestamp::now(),
        )
        .unwrap()
        .0
    }

    fn payable_fixed() -> Contract {
        let mut contract = pending_review();
        contract.accept(Timestamp::now()).unwrap();
        contract
    }

    fn recurring_completed() -> GatewayFact {
        GatewayFact::CheckoutCompletedRecurring {
            session_id: "cs_1".to_string(),
            subscription_id: "sub_1".to_string(),
            customer_id: Some("cus_1".to_string()),
        }
    }

    fn invoice_paid(id: &str) -> GatewayFact {
        GatewayFact::InvoicePaid {
            invoice_id: id.to_string(),
            amount_minor: 1_200,
            currency: "USD".to_string(),
            subscription_id: "sub_1".to_string(),
            customer_id: Some("cus_1".to_string()),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // One-time checkout
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn one_time_checkout_marks_paid_with_revenue() {
        let mut contract = payable_fixed();
        let outcome = contract.apply_gateway_fact(
            &GatewayFact::CheckoutCompletedOneTime {
                session_id: "cs_9".to_string(),
                amount_minor: 2_000,
                currency: "usd".to_string(),
            },
            Timestamp::now(),
        );

        assert_eq!(contract.status, ContractStatus::Paid);
        assert!(outcome.changed);
        let revenue = outcome.revenue.unwrap();
        assert_eq!(revenue.external_id, "cs_9");
        assert_eq!(revenue.kind, RevenueKind::OneTimePayment);
        assert_eq!(outcome.events.len(), 1);
    }

    #[test]
    fn repeated_one_time_checkout_is_noop() {
        let mut contract = payable_fixed();
        let fact = GatewayFact::CheckoutCompletedOneTime {
            session_id: "cs_9".to_string(),
            amount_minor: 2_000,
            currency: "usd".to_string(),
        };
        contract.apply_gateway_fact(&fact, Timestamp::now());
        let second = contract.apply_gateway_fact(&fact, Timestamp::now());

        assert!(second.is_noop());
        assert_eq!(contract.status, ContractStatus::Paid);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Subscription lifecycle
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn recurring_checkout_activates_and_schedules_term_end() {
        let mut contract = payable_metered();
        let outcome = contract.apply_gateway_fact(&recurring_completed(), Timestamp::now());

        assert_eq!(contract.status, ContractStatus::Active);
        assert_eq!(contract.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(contract.customer_id.as_deref(), Some("cus_1"));
        assert!(contract.billing_cycle_anchor.is_some());
        assert!(outcome.revenue.is_none());
        assert_eq!(
            outcome.term_end(),
            Some(("sub_1", contract.created_at.add_years(1)))
        );
    }

    #[test]
    fn recurring_checkout_twice_schedules_once() {
        let mut contract = payable_metered();
        contract.apply_gateway_fact(&recurring_completed(), Timestamp::now());
        let second = contract.apply_gateway_fact(&recurring_completed(), Timestamp::now());
        assert!(second.is_noop());
        assert!(second.term_end().is_none());
    }

    #[test]
    fn invoice_paid_on_active_records_revenue_only() {
        let mut contract = payable_metered();
        contract.apply_gateway_fact(&recurring_completed(), Timestamp::now());
        let outcome = contract.apply_gateway_fact(&invoice_paid("in_1"), Timestamp::now());

        assert!(!outcome.changed);
        assert_eq!(outcome.revenue.unwrap().external_id, "in_1");
        assert_eq!(contract.status, ContractStatus::Active);
    }

    #[test]
    fn invoice_paid_before_checkout_webhook_activates() {
        let mut contract = payable_metered();
        let outcome = contract.apply_gateway_fact(&invoice_paid("in_1"), Timestamp::now());

        assert_eq!(contract.status, ContractStatus::Active);
        assert!(outcome.revenue.is_some());
        assert!(outcome.term_end().is_some());
    }

    #[test]
    fn failed_then_paid_invoice_recovers() {
        let mut contract = payable_metered();
        contract.apply_gateway_fact(&recurring_completed(), Timestamp::now());

        let failed = contract.apply_gateway_fact(
            &GatewayFact::InvoicePaymentFailed {
                invoice_id: "in_2".to_string(),
            },
            Timestamp::now(),
        );
        assert_eq!(contract.status, ContractStatus::PaymentFailed);
        assert!(failed.revenue.is_none());

        let recovered = contract.apply_gateway_fact(&invoice_paid("in_2"), Timestamp::now());
        assert_eq!(contract.status, ContractStatus::Active);
        assert!(recovered.changed);
        assert!(recovered.revenue.is_some());
    }

    #[test]
    fn subscription_deleted_cancels_regardless_of_invoices() {
        let mut contract = payable_metered();
        contract.apply_gateway_fact(&recurring_completed(), Timestamp::now());
        contract.apply_gateway_fact(&invoice_paid("in_1"), Timestamp::now());
        contract.apply_gateway_fact(&invoice_paid("in_2"), Timestamp::now());

        contract.apply_gateway_fact(&GatewayFact::SubscriptionDeleted, Timestamp::now());
        assert_eq!(contract.status, ContractStatus::Cancelled);

        let late = contract.apply_gateway_fact(&invoice_paid("in_3"), Timestamp::now());
        assert_eq!(contract.status, ContractStatus::Cancelled);
        assert!(!late.changed);
        assert!(late.revenue.is_some());
    }

    #[test]
    fn terminal_states_absorb_every_fact() {
        let facts = [
            recurring_completed(),
            GatewayFact::InvoicePaymentFailed {
                invoice_id: "in_x".to_string(),
            },
            GatewayFact::SubscriptionDeleted,
            GatewayFact::SubscriptionStatusObserved(SubscriptionStatus::Active),
            GatewayFact::SessionExpired,
        ];
        for terminal in [
            ContractStatus::Paid,
            ContractStatus::Cancelled,
            ContractStatus::Rejected,
            ContractStatus::Withdrawn,
        ] {
            for fact in &facts {
                let mut contract = payable_metered();
                contract.status = terminal;
                let outcome = contract.apply_gateway_fact(fact, Timestamp::now());
                assert_eq!(contract.status, terminal, "{} left by {:?}", terminal, fact);
                assert!(outcome.is_noop());
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Status observation (sweeper / subscription.updated)
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn status_mapping() {
        use SubscriptionStatus::*;
        assert_eq!(Active.contract_status(), Some(ContractStatus::Active));
        assert_eq!(Trialing.contract_status(), Some(ContractStatus::Active));
        assert_eq!(Canceled.contract_status(), Some(ContractStatus::Cancelled));
        assert_eq!(Unpaid.contract_status(), Some(ContractStatus::PaymentFailed));
        assert_eq!(PastDue.contract_status(), Some(ContractStatus::PaymentFailed));
        assert_eq!(IncompleteExpired.contract_status(), Some(ContractStatus::PaymentFailed));
        assert_eq!(Incomplete.contract_status(), Some(ContractStatus::PendingPayment));
        assert_eq!(Paused.contract_status(), None);
        assert_eq!(SubscriptionStatus::parse("weird"), Unknown);
    }

    #[test]
    fn observing_matching_status_is_noop() {
        let mut contract = payable_metered();
        contract.apply_gateway_fact(&recurring_completed(), Timestamp::now());
        let before = contract.clone();

        let outcome = contract.apply_gateway_fact(
            &GatewayFact::SubscriptionStatusObserved(SubscriptionStatus::Active),
            Timestamp::now(),
        );
        assert!(outcome.is_noop());
        assert_eq!(contract, before);
    }

    #[test]
    fn observing_past_due_marks_payment_failed() {
        let mut contract = payable_metered();
        contract.apply_gateway_fact(&recurring_completed(), Timestamp::now());
        contract.apply_gateway_fact(
            &GatewayFact::SubscriptionStatusObserved(SubscriptionStatus::PastDue),
            Timestamp::now(),
        );
        assert_eq!(contract.status, ContractStatus::PaymentFailed);
    }

    #[test]
    fn observing_incomplete_on_active_is_ignored() {
        let mut contract = payable_metered();
        contract.apply_gateway_fact(&recurring_completed(), Timestamp::now());
        let outcome = contract.apply_gateway_fact(
            &GatewayFact::SubscriptionStatusObserved(SubscriptionStatus::Incomplete),
            Timestamp::now(),
        );
        assert!(outcome.is_noop());
        assert_eq!(contract.status, ContractStatus::Active);
    }

    #[test]
    fn session_expiry_cancels_pending_payment() {
        let mut contract = payable_fixed();
        let outcome = contract.apply_gateway_fact(&GatewayFact::SessionExpired, Timestamp::now());
        assert_eq!(contract.status, ContractStatus::Cancelled);
        assert!(outcome.changed);
    }

    #[test]
    fn session_expiry_ignored_once_active() {
        let mut contract = payable_metered();
        contract.apply_gateway_fact(&recurring_completed(), Timestamp::now());
        let outcome = contract.apply_gateway_fact(&GatewayFact::SessionExpired, Timestamp::now());
        assert!(outcome.is_noop());
    }
}
