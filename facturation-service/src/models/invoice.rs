//! Invoice and credit note model for facturation-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::lifecycle::PaymentState;
use crate::domain::money::Money;
use crate::domain::numbering::DocumentKind;
use crate::domain::totals::{DocumentTotals, LineDraft};
use crate::models::InvoiceItem;

/// Invoice type. Credit notes live in the invoices table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Invoice,
    CreditNote,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Invoice => "invoice",
            InvoiceType::CreditNote => "credit_note",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "credit_note" => InvoiceType::CreditNote,
            _ => InvoiceType::Invoice,
        }
    }

    pub fn document_kind(&self) -> DocumentKind {
        match self {
            InvoiceType::Invoice => DocumentKind::Invoice,
            InvoiceType::CreditNote => DocumentKind::CreditNote,
        }
    }
}

/// Business status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => InvoiceStatus::Sent,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            "cancelled" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// Settlement status, derived from recorded payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "partial" => PaymentStatus::Partial,
            "paid" => PaymentStatus::Paid,
            "overdue" => PaymentStatus::Overdue,
            _ => PaymentStatus::Unpaid,
        }
    }
}

/// Invoice or credit note header.
#[derive(Debug, Clone, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub number_year: i32,
    pub number_seq: i32,
    pub invoice_type: String,
    pub related_invoice_id: Option<Uuid>,
    pub subtotal: Money,
    pub vat_rate: Decimal,
    pub vat_amount: Money,
    pub total: Money,
    pub status: String,
    pub payment_status: String,
    pub is_finalized: bool,
    pub finalized_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn invoice_type(&self) -> InvoiceType {
        InvoiceType::from_string(&self.invoice_type)
    }

    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::from_string(&self.payment_status)
    }

    pub fn is_credit_note(&self) -> bool {
        self.invoice_type() == InvoiceType::CreditNote
    }

    pub fn totals(&self) -> DocumentTotals {
        DocumentTotals {
            subtotal: self.subtotal,
            vat_rate: self.vat_rate,
            vat_amount: self.vat_amount,
            total: self.total,
        }
    }

    pub fn payment_state(&self) -> PaymentState {
        PaymentState {
            status: self.status(),
            payment_status: self.payment_status(),
            paid_at: self.paid_at,
            sent: self.sent_at.is_some(),
        }
    }
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub client_id: Option<Uuid>,
    pub invoice_type: Option<InvoiceType>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub client_id: Uuid,
    pub lines: Vec<LineDraft>,
    pub vat_rate: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub notes: Option<String>,
}

/// Input for updating an invoice. Lines, when present, replace all items.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub client_id: Option<Uuid>,
    pub lines: Option<Vec<LineDraft>>,
    pub vat_rate: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub status: Option<InvoiceStatus>,
}

/// Invoice header with its line items in display order.
#[derive(Debug, Clone)]
pub struct InvoiceWithItems {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}
