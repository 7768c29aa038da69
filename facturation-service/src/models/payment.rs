//! Payment model for facturation-service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Card,
    Cash,
    Check,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Check => "check",
            PaymentMethod::Other => "other",
        }
    }
}

/// A payment received against an invoice. Payments are never edited.
#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Money,
    pub method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub payment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Payment joined with the number of the invoice it settles.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentWithInvoice {
    #[sqlx(flatten)]
    pub payment: Payment,
    pub invoice_number: String,
}

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub invoice_id: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OverdueSummary {
    pub count: i64,
    pub amount: Money,
}

/// Treasury figures for the current month.
#[derive(Debug, Clone)]
pub struct TreasuryStats {
    pub collected_this_month: Money,
    pub invoiced_this_month: Money,
    pub outstanding: Money,
    pub overdue: OverdueSummary,
    pub recent_payments: Vec<PaymentWithInvoice>,
}
