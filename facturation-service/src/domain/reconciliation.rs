//! Payment reconciliation.
//!
//! The payment status of an invoice is a function of its total and the sum
//! of its recorded payments. Every path that changes payments calls
//! [`reconcile`] afterwards, inside the same transaction.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::Serialize;

use super::error::DomainError;
use super::lifecycle::{transition_payment_state, PaymentState};
use super::money::Money;
use crate::models::{Invoice, InvoiceStatus, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub invoice_total: Money,
    pub total_paid: Money,
    pub balance_due: Money,
}

impl Balance {
    pub fn new(invoice_total: Money, total_paid: Money) -> Self {
        Self {
            invoice_total,
            total_paid,
            balance_due: invoice_total - total_paid,
        }
    }
}

pub fn derive_payment_status(current: &PaymentState, balance: &Balance) -> PaymentStatus {
    if balance.total_paid >= balance.invoice_total {
        PaymentStatus::Paid
    } else if current.status == InvoiceStatus::Overdue {
        PaymentStatus::Overdue
    } else if balance.total_paid.is_positive() {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    }
}

/// Recompute the payment state from recorded payments.
pub fn reconcile(current: &PaymentState, balance: &Balance, now: DateTime<Utc>) -> PaymentState {
    transition_payment_state(current, derive_payment_status(current, balance), now)
}

fn ensure_payable(invoice: &Invoice) -> Result<(), DomainError> {
    if invoice.is_credit_note() {
        return Err(DomainError::validation(
            "Un avoir ne peut pas recevoir de paiement",
        ));
    }
    if invoice.status() == InvoiceStatus::Cancelled {
        return Err(DomainError::validation(
            "Facture annulée : paiement impossible",
        ));
    }
    Ok(())
}

/// A new payment must be positive and may not exceed the balance due.
pub fn ensure_payment_accepted(
    invoice: &Invoice,
    balance: &Balance,
    amount: Money,
) -> Result<(), DomainError> {
    ensure_payable(invoice)?;
    if !amount.is_positive() {
        return Err(DomainError::validation("Le montant doit être positif"));
    }
    if amount > balance.balance_due {
        return Err(DomainError::validation(format!(
            "Le montant dépasse le solde restant de {} €",
            balance.balance_due
        )));
    }
    Ok(())
}

/// What the legacy `paymentStatus` route has to do for a requested status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyPaymentPlan {
    /// Record a payment of this amount, then reconcile.
    Record(Money),
    /// Nothing to record; reconcile only.
    Reconcile,
    /// Apply the transition directly.
    Transition(PaymentStatus),
}

pub fn plan_legacy_payment(
    invoice: &Invoice,
    balance: &Balance,
    has_payments: bool,
    target: PaymentStatus,
    paid_amount: Option<Money>,
) -> Result<LegacyPaymentPlan, DomainError> {
    ensure_payable(invoice)?;

    match target {
        PaymentStatus::Paid if balance.balance_due.is_positive() => {
            Ok(LegacyPaymentPlan::Record(balance.balance_due))
        }
        PaymentStatus::Paid => Ok(LegacyPaymentPlan::Reconcile),
        PaymentStatus::Partial => {
            let amount = paid_amount.ok_or_else(|| {
                DomainError::validation("Le montant payé est requis pour un paiement partiel")
            })?;
            if !amount.is_positive() || amount >= balance.balance_due {
                return Err(DomainError::validation(format!(
                    "Le montant partiel doit être compris entre 0 et {} €",
                    balance.balance_due
                )));
            }
            Ok(LegacyPaymentPlan::Record(amount))
        }
        PaymentStatus::Unpaid if has_payments => Err(DomainError::validation(
            "Des paiements sont enregistrés : supprimez-les pour repasser en impayé",
        )),
        PaymentStatus::Unpaid => Ok(LegacyPaymentPlan::Transition(PaymentStatus::Unpaid)),
        PaymentStatus::Overdue if !balance.balance_due.is_positive() => Err(
            DomainError::validation("Facture soldée : elle ne peut pas être en retard"),
        ),
        PaymentStatus::Overdue => Ok(LegacyPaymentPlan::Transition(PaymentStatus::Overdue)),
    }
}

/// First day of the month containing `today`, and first day of the next month.
pub fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today - Days::new(u64::from(today.day0()));
    let end = start
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    (start, end)
}
