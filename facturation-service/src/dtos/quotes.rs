use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::invoices::InvoiceResponse;
use super::items::{into_lines, ItemInput, ItemResponse};
use crate::domain::money::Money;
use crate::models::{CreateQuote, ListQuotesFilter, Quote, QuoteStatus, QuoteWithItems, UpdateQuote};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuoteRequest {
    pub client_id: Uuid,
    #[serde(default)]
    #[validate(length(min = 1, message = "Au moins une ligne est requise"), nested)]
    pub items: Vec<ItemInput>,
    pub vat_rate: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    pub description: Option<String>,
    pub notes: Option<String>,
}

impl CreateQuoteRequest {
    pub fn into_model(self) -> CreateQuote {
        CreateQuote {
            client_id: self.client_id,
            lines: into_lines(self.items),
            vat_rate: self.vat_rate,
            valid_until: self.valid_until,
            description: self.description,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuoteRequest {
    pub client_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Au moins une ligne est requise"), nested)]
    pub items: Option<Vec<ItemInput>>,
    pub vat_rate: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub status: Option<QuoteStatus>,
}

impl UpdateQuoteRequest {
    pub fn into_model(self) -> UpdateQuote {
        UpdateQuote {
            client_id: self.client_id,
            lines: self.items.map(into_lines),
            vat_rate: self.vat_rate,
            valid_until: self.valid_until,
            description: self.description,
            notes: self.notes,
            status: self.status,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuotesQuery {
    pub status: Option<QuoteStatus>,
    pub client_id: Option<Uuid>,
}

impl From<ListQuotesQuery> for ListQuotesFilter {
    fn from(query: ListQuotesQuery) -> Self {
        ListQuotesFilter {
            status: query.status,
            client_id: query.client_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub id: Uuid,
    pub client_id: Uuid,
    pub quote_number: String,
    pub subtotal: Money,
    pub vat_rate: Decimal,
    pub vat_amount: Money,
    pub total: Money,
    pub status: QuoteStatus,
    pub issue_date: NaiveDate,
    pub valid_until: NaiveDate,
    pub accepted_at: Option<DateTime<Utc>>,
    pub converted_to_invoice_id: Option<Uuid>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemResponse>>,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            status: quote.status(),
            id: quote.id,
            client_id: quote.client_id,
            quote_number: quote.quote_number,
            subtotal: quote.subtotal,
            vat_rate: quote.vat_rate,
            vat_amount: quote.vat_amount,
            total: quote.total,
            issue_date: quote.issue_date,
            valid_until: quote.valid_until,
            accepted_at: quote.accepted_at,
            converted_to_invoice_id: quote.converted_to_invoice_id,
            description: quote.description,
            notes: quote.notes,
            created_at: quote.created_at,
            updated_at: quote.updated_at,
            items: None,
        }
    }
}

impl From<QuoteWithItems> for QuoteResponse {
    fn from(value: QuoteWithItems) -> Self {
        Self {
            items: Some(value.items.into_iter().map(ItemResponse::from).collect()),
            ..Self::from(value.quote)
        }
    }
}

/// Result of a quote to invoice conversion.
#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    pub quote: QuoteResponse,
    pub invoice: InvoiceResponse,
}
