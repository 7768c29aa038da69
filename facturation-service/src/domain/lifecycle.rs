//! Invoice lifecycle rules.
//!
//! `status` is the workflow axis (draft, sent, paid, overdue, cancelled) and
//! `payment_status` the money axis. The two are only ever changed together
//! through [`transition_payment_state`].

use chrono::{DateTime, Days, NaiveDate, Utc};

use super::error::DomainError;
use crate::models::{Invoice, InvoiceStatus, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentState {
    pub status: InvoiceStatus,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    /// The invoice has been sent at least once.
    pub sent: bool,
}

/// Move an invoice to `target` on the money axis, keeping the workflow axis in step.
///
/// Leaving `paid` or `overdue` restores the workflow status the invoice had
/// reached: `sent` if it was ever sent, `draft` otherwise.
pub fn transition_payment_state(
    current: &PaymentState,
    target: PaymentStatus,
    now: DateTime<Utc>,
) -> PaymentState {
    match target {
        PaymentStatus::Paid => PaymentState {
            status: InvoiceStatus::Paid,
            payment_status: PaymentStatus::Paid,
            paid_at: current.paid_at.or(Some(now)),
            sent: current.sent,
        },
        PaymentStatus::Partial | PaymentStatus::Unpaid => PaymentState {
            status: match current.status {
                InvoiceStatus::Paid | InvoiceStatus::Overdue if current.sent => {
                    InvoiceStatus::Sent
                }
                InvoiceStatus::Paid | InvoiceStatus::Overdue => InvoiceStatus::Draft,
                other => other,
            },
            payment_status: target,
            paid_at: None,
            sent: current.sent,
        },
        PaymentStatus::Overdue => PaymentState {
            status: InvoiceStatus::Overdue,
            payment_status: PaymentStatus::Overdue,
            paid_at: None,
            sent: current.sent,
        },
    }
}

/// Financial content may only change on a non-final, unpaid, live invoice.
pub fn ensure_editable(invoice: &Invoice) -> Result<(), DomainError> {
    if invoice.is_credit_note() {
        return Err(DomainError::immutable("Un avoir ne peut pas être modifié"));
    }
    if invoice.is_finalized {
        return Err(DomainError::immutable(
            "Facture finalisée : modification impossible, émettez un avoir",
        ));
    }
    match invoice.status() {
        InvoiceStatus::Paid => Err(DomainError::immutable(
            "Facture payée : modification impossible, émettez un avoir",
        )),
        InvoiceStatus::Cancelled => Err(DomainError::immutable(
            "Facture annulée : modification impossible",
        )),
        _ => Ok(()),
    }
}

pub fn ensure_finalizable(invoice: &Invoice) -> Result<(), DomainError> {
    if invoice.is_finalized {
        return Err(DomainError::validation("Facture déjà finalisée"));
    }
    if invoice.status() != InvoiceStatus::Sent {
        return Err(DomainError::validation(
            "Seule une facture envoyée peut être finalisée",
        ));
    }
    Ok(())
}

/// `linked` is true when a credit note or a converted quote points at the invoice.
pub fn ensure_deletable(
    invoice: &Invoice,
    has_payments: bool,
    linked: bool,
) -> Result<(), DomainError> {
    if invoice.is_credit_note() || invoice.is_finalized {
        return Err(DomainError::immutable(
            "Document finalisé : suppression impossible",
        ));
    }
    if invoice.status() != InvoiceStatus::Draft {
        return Err(DomainError::immutable(
            "Seul un brouillon peut être supprimé",
        ));
    }
    if has_payments {
        return Err(DomainError::immutable(
            "Des paiements sont enregistrés sur cette facture",
        ));
    }
    if linked {
        return Err(DomainError::immutable(
            "Facture liée à un avoir ou à un devis : suppression impossible",
        ));
    }
    Ok(())
}

/// `date` plus `days` calendar days, used for due dates and quote validity.
pub fn days_after(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

pub fn ensure_due_date(issue_date: NaiveDate, due_date: NaiveDate) -> Result<(), DomainError> {
    if due_date < issue_date {
        return Err(DomainError::validation(
            "La date d'échéance ne peut pas précéder la date d'émission",
        ));
    }
    Ok(())
}

pub fn ensure_credit_note_source(invoice: &Invoice) -> Result<(), DomainError> {
    if invoice.is_credit_note() {
        return Err(DomainError::validation(
            "Impossible d'émettre un avoir sur un avoir",
        ));
    }
    Ok(())
}

pub fn credit_note_description(invoice_number: &str) -> String {
    format!("Avoir sur facture {invoice_number}")
}

/// Outcome of a workflow status change requested through an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Unchanged,
    Set(InvoiceStatus),
    /// Settle the remaining balance, which moves the invoice to paid.
    Settle,
}

pub fn plan_status_change(
    current: InvoiceStatus,
    target: InvoiceStatus,
    has_payments: bool,
) -> Result<StatusChange, DomainError> {
    use InvoiceStatus::*;

    match (current, target) {
        (from, to) if from == to => Ok(StatusChange::Unchanged),
        (Draft, Sent) => Ok(StatusChange::Set(Sent)),
        (Draft | Sent, Cancelled) if has_payments => Err(DomainError::validation(
            "Impossible d'annuler une facture ayant des paiements",
        )),
        (Draft | Sent, Cancelled) => Ok(StatusChange::Set(Cancelled)),
        (Sent | Overdue, Paid) => Ok(StatusChange::Settle),
        (from, to) => Err(DomainError::validation(format!(
            "Transition de statut non autorisée : {} → {}",
            from.as_str(),
            to.as_str()
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::money::Money;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    pub(crate) fn invoice(status: InvoiceStatus, is_finalized: bool) -> Invoice {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Invoice {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            invoice_number: "FAC-2025-0001".to_string(),
            number_year: 2025,
            number_seq: 1,
            invoice_type: "invoice".to_string(),
            related_invoice_id: None,
            subtotal: Money::from_cents(225_000),
            vat_rate: Decimal::from(20),
            vat_amount: Money::from_cents(45_000),
            total: Money::from_cents(270_000),
            status: status.as_str().to_string(),
            payment_status: "unpaid".to_string(),
            is_finalized,
            finalized_at: None,
            sent_at: (status != InvoiceStatus::Draft).then_some(created),
            issue_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            paid_at: None,
            description: None,
            notes: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn state(status: InvoiceStatus, payment_status: PaymentStatus) -> PaymentState {
        PaymentState {
            status,
            payment_status,
            paid_at: None,
            sent: status != InvoiceStatus::Draft,
        }
    }

    #[test]
    fn paid_forces_status_and_stamps_paid_at_once() {
        let first = Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 4, 2, 10, 0, 0).unwrap();

        let paid = transition_payment_state(
            &state(InvoiceStatus::Sent, PaymentStatus::Partial),
            PaymentStatus::Paid,
            first,
        );
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.paid_at, Some(first));

        let again = transition_payment_state(&paid, PaymentStatus::Paid, later);
        assert_eq!(again.paid_at, Some(first));
    }

    #[test]
    fn reverting_from_paid_goes_back_to_sent() {
        let now = Utc::now();
        let paid = transition_payment_state(
            &state(InvoiceStatus::Sent, PaymentStatus::Unpaid),
            PaymentStatus::Paid,
            now,
        );
        let unpaid = transition_payment_state(&paid, PaymentStatus::Unpaid, now);

        assert_eq!(unpaid.status, InvoiceStatus::Sent);
        assert_eq!(unpaid.payment_status, PaymentStatus::Unpaid);
        assert_eq!(unpaid.paid_at, None);
    }

    #[test]
    fn unpaying_a_never_sent_invoice_returns_it_to_draft() {
        let now = Utc::now();
        let paid = transition_payment_state(
            &state(InvoiceStatus::Draft, PaymentStatus::Unpaid),
            PaymentStatus::Paid,
            now,
        );
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(!paid.sent);

        let unpaid = transition_payment_state(&paid, PaymentStatus::Unpaid, now);
        assert_eq!(unpaid.status, InvoiceStatus::Draft);
        assert_eq!(unpaid.payment_status, PaymentStatus::Unpaid);

        let mut reverted = invoice(InvoiceStatus::Draft, false);
        reverted.status = unpaid.status.as_str().to_string();
        assert!(ensure_finalizable(&reverted).is_err());
    }

    #[test]
    fn partial_keeps_draft_status() {
        let next = transition_payment_state(
            &state(InvoiceStatus::Draft, PaymentStatus::Unpaid),
            PaymentStatus::Partial,
            Utc::now(),
        );
        assert_eq!(next.status, InvoiceStatus::Draft);
        assert_eq!(next.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn overdue_moves_both_axes() {
        let next = transition_payment_state(
            &state(InvoiceStatus::Sent, PaymentStatus::Partial),
            PaymentStatus::Overdue,
            Utc::now(),
        );
        assert_eq!(next.status, InvoiceStatus::Overdue);
        assert_eq!(next.payment_status, PaymentStatus::Overdue);
    }

    #[test]
    fn finalized_and_paid_invoices_are_immutable() {
        let finalized = invoice(InvoiceStatus::Sent, true);
        let paid = invoice(InvoiceStatus::Paid, false);
        let mut credit_note = invoice(InvoiceStatus::Sent, true);
        credit_note.invoice_type = "credit_note".to_string();

        assert!(matches!(ensure_editable(&finalized), Err(DomainError::Immutable(_))));
        assert!(matches!(ensure_editable(&paid), Err(DomainError::Immutable(_))));
        assert!(matches!(ensure_editable(&credit_note), Err(DomainError::Immutable(_))));
        assert!(ensure_editable(&invoice(InvoiceStatus::Draft, false)).is_ok());
        assert!(ensure_editable(&invoice(InvoiceStatus::Sent, false)).is_ok());
    }

    #[test]
    fn finalize_requires_sent_and_happens_once() {
        assert!(ensure_finalizable(&invoice(InvoiceStatus::Sent, false)).is_ok());
        assert!(ensure_finalizable(&invoice(InvoiceStatus::Draft, false)).is_err());
        assert!(matches!(
            ensure_finalizable(&invoice(InvoiceStatus::Sent, true)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn only_unpaid_drafts_can_be_deleted() {
        let draft = invoice(InvoiceStatus::Draft, false);
        assert!(ensure_deletable(&draft, false, false).is_ok());
        assert!(ensure_deletable(&draft, true, false).is_err());
        assert!(ensure_deletable(&draft, false, true).is_err());
        assert!(ensure_deletable(&invoice(InvoiceStatus::Sent, false), false, false).is_err());
    }

    #[test]
    fn status_changes_follow_the_workflow() {
        use InvoiceStatus::*;

        assert_eq!(plan_status_change(Draft, Sent, false), Ok(StatusChange::Set(Sent)));
        assert_eq!(plan_status_change(Sent, Sent, false), Ok(StatusChange::Unchanged));
        assert_eq!(plan_status_change(Sent, Paid, true), Ok(StatusChange::Settle));
        assert_eq!(plan_status_change(Overdue, Paid, false), Ok(StatusChange::Settle));
        assert_eq!(
            plan_status_change(Sent, Cancelled, false),
            Ok(StatusChange::Set(Cancelled))
        );
        assert!(plan_status_change(Sent, Cancelled, true).is_err());
        assert!(plan_status_change(Sent, Draft, false).is_err());
        assert!(plan_status_change(Draft, Paid, false).is_err());
        assert!(plan_status_change(Sent, Overdue, false).is_err());
    }

    #[test]
    fn due_date_cannot_precede_issue_date() {
        let issue = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(ensure_due_date(issue, issue).is_ok());
        assert!(ensure_due_date(issue, issue.pred_opt().unwrap()).is_err());
        assert_eq!(
            days_after(issue, 30),
            NaiveDate::from_ymd_opt(2025, 4, 9).unwrap()
        );
    }

    #[test]
    fn credit_notes_cannot_be_credited() {
        let mut credit_note = invoice(InvoiceStatus::Sent, true);
        credit_note.invoice_type = "credit_note".to_string();
        assert!(ensure_credit_note_source(&credit_note).is_err());
        assert!(ensure_credit_note_source(&invoice(InvoiceStatus::Draft, false)).is_ok());
        assert_eq!(
            credit_note_description("FAC-2025-0001"),
            "Avoir sur facture FAC-2025-0001"
        );
    }
}
