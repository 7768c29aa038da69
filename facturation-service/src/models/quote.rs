//! Quote (devis) model for facturation-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::money::Money;
use crate::domain::totals::{DocumentTotals, LineDraft};
use crate::models::QuoteItem;

/// Quote status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => QuoteStatus::Sent,
            "accepted" => QuoteStatus::Accepted,
            "rejected" => QuoteStatus::Rejected,
            "expired" => QuoteStatus::Expired,
            _ => QuoteStatus::Draft,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Quote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub quote_number: String,
    pub number_year: i32,
    pub number_seq: i32,
    pub subtotal: Money,
    pub vat_rate: Decimal,
    pub vat_amount: Money,
    pub total: Money,
    pub status: String,
    pub issue_date: NaiveDate,
    pub valid_until: NaiveDate,
    pub accepted_at: Option<DateTime<Utc>>,
    pub converted_to_invoice_id: Option<Uuid>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn status(&self) -> QuoteStatus {
        QuoteStatus::from_string(&self.status)
    }

    pub fn is_converted(&self) -> bool {
        self.converted_to_invoice_id.is_some()
    }

    pub fn totals(&self) -> DocumentTotals {
        DocumentTotals {
            subtotal: self.subtotal,
            vat_rate: self.vat_rate,
            vat_amount: self.vat_amount,
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuotesFilter {
    pub status: Option<QuoteStatus>,
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreateQuote {
    pub client_id: Uuid,
    pub lines: Vec<LineDraft>,
    pub vat_rate: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    pub description: Option<String>,
    pub notes: Option<String>,
}

/// Input for updating a quote. Lines, when present, replace all items.
#[derive(Debug, Clone, Default)]
pub struct UpdateQuote {
    pub client_id: Option<Uuid>,
    pub lines: Option<Vec<LineDraft>>,
    pub vat_rate: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub status: Option<QuoteStatus>,
}

/// Quote header with its line items in display order.
#[derive(Debug, Clone)]
pub struct QuoteWithItems {
    pub quote: Quote,
    pub items: Vec<QuoteItem>,
}
