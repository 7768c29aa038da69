//! Line item models for invoices and quotes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::money::Money;
use crate::domain::totals::PricedLine;

/// Line item on an invoice or credit note.
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub discount: Decimal,
    pub vat_rate: Option<Decimal>,
    pub total: Money,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Line item on a quote.
#[derive(Debug, Clone, FromRow)]
pub struct QuoteItem {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub discount: Decimal,
    pub vat_rate: Option<Decimal>,
    pub total: Money,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<&InvoiceItem> for PricedLine {
    fn from(item: &InvoiceItem) -> Self {
        PricedLine {
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: item.discount,
            vat_rate: item.vat_rate,
            total: item.total,
            sort_order: item.sort_order,
        }
    }
}

impl From<&QuoteItem> for PricedLine {
    fn from(item: &QuoteItem) -> Self {
        PricedLine {
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: item.discount,
            vat_rate: item.vat_rate,
            total: item.total,
            sort_order: item.sort_order,
        }
    }
}
