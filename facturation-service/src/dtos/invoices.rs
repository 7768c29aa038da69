use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::items::{into_lines, ItemInput, ItemResponse};
use super::quotes::QuoteResponse;
use crate::domain::money::Money;
use crate::models::{
    CreateInvoice, Invoice, InvoiceStatus, InvoiceType, InvoiceWithItems, ListInvoicesFilter,
    PaymentStatus, UpdateInvoice,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,
    #[serde(default)]
    #[validate(length(min = 1, message = "Au moins une ligne est requise"), nested)]
    pub items: Vec<ItemInput>,
    pub vat_rate: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub notes: Option<String>,
}

impl CreateInvoiceRequest {
    pub fn into_model(self) -> CreateInvoice {
        CreateInvoice {
            client_id: self.client_id,
            lines: into_lines(self.items),
            vat_rate: self.vat_rate,
            due_date: self.due_date,
            description: self.description,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    pub client_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Au moins une ligne est requise"), nested)]
    pub items: Option<Vec<ItemInput>>,
    pub vat_rate: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub status: Option<InvoiceStatus>,
}

impl UpdateInvoiceRequest {
    pub fn into_model(self) -> UpdateInvoice {
        UpdateInvoice {
            client_id: self.client_id,
            lines: self.items.map(into_lines),
            vat_rate: self.vat_rate,
            due_date: self.due_date,
            description: self.description,
            notes: self.notes,
            status: self.status,
        }
    }
}

/// Legacy direct payment-status change.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusRequest {
    pub payment_status: PaymentStatus,
    pub paid_amount: Option<Money>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub client_id: Option<Uuid>,
    pub invoice_type: Option<InvoiceType>,
}

impl From<ListInvoicesQuery> for ListInvoicesFilter {
    fn from(query: ListInvoicesQuery) -> Self {
        ListInvoicesFilter {
            status: query.status,
            payment_status: query.payment_status,
            client_id: query.client_id,
            invoice_type: query.invoice_type,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub invoice_type: InvoiceType,
    pub related_invoice_id: Option<Uuid>,
    pub subtotal: Money,
    pub vat_rate: Decimal,
    pub vat_amount: Money,
    pub total: Money,
    pub status: InvoiceStatus,
    pub payment_status: PaymentStatus,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemResponse>>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            client_id: invoice.client_id,
            invoice_type: invoice.invoice_type(),
            status: invoice.status(),
            payment_status: invoice.payment_status(),
            invoice_number: invoice.invoice_number,
            related_invoice_id: invoice.related_invoice_id,
            subtotal: invoice.subtotal,
            vat_rate: invoice.vat_rate,
            vat_amount: invoice.vat_amount,
            total: invoice.total,
            is_finalized: invoice.is_finalized,
            finalized_at: invoice.finalized_at,
            sent_at: invoice.sent_at,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            paid_at: invoice.paid_at,
            description: invoice.description,
            notes: invoice.notes,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
            items: None,
        }
    }
}

impl From<InvoiceWithItems> for InvoiceResponse {
    fn from(value: InvoiceWithItems) -> Self {
        Self {
            items: Some(value.items.into_iter().map(ItemResponse::from).collect()),
            ..Self::from(value.invoice)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConvertToQuoteResponse {
    pub success: bool,
    pub quote: QuoteResponse,
}

#[derive(Debug, Serialize)]
pub struct MarkOverdueResponse {
    pub updated: u64,
}
