//! Quote rules and quote/invoice conversion.

use chrono::{DateTime, NaiveDate, Utc};

use super::error::DomainError;
use crate::models::{Invoice, Quote, QuoteStatus};

/// A quote that produced an invoice is frozen.
pub fn ensure_quote_editable(quote: &Quote) -> Result<(), DomainError> {
    if quote.is_converted() {
        return Err(DomainError::immutable(
            "Devis converti en facture : modification impossible",
        ));
    }
    Ok(())
}

pub fn ensure_quote_deletable(quote: &Quote) -> Result<(), DomainError> {
    if quote.is_converted() {
        return Err(DomainError::immutable(
            "Devis converti en facture : suppression impossible",
        ));
    }
    Ok(())
}

pub fn ensure_convertible(quote: &Quote) -> Result<(), DomainError> {
    if quote.is_converted() {
        return Err(DomainError::immutable("Devis déjà converti en facture"));
    }
    Ok(())
}

pub fn ensure_valid_until(issue_date: NaiveDate, valid_until: NaiveDate) -> Result<(), DomainError> {
    if valid_until < issue_date {
        return Err(DomainError::validation(
            "La date de validité ne peut pas précéder la date d'émission",
        ));
    }
    Ok(())
}

/// Only regular invoices can be turned back into a quote.
pub fn ensure_quotable(invoice: &Invoice) -> Result<(), DomainError> {
    if invoice.is_credit_note() {
        return Err(DomainError::validation(
            "Un avoir ne peut pas être converti en devis",
        ));
    }
    Ok(())
}

/// Acceptance timestamp after a status change requested through an update.
pub fn accepted_at_after(
    status: QuoteStatus,
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match status {
        QuoteStatus::Accepted => current.or(Some(now)),
        _ => None,
    }
}
