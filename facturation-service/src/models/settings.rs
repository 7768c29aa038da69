//! Per-user document settings printed on invoices and quotes.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct DocumentSettings {
    pub user_id: Uuid,
    pub company_name: Option<String>,
    pub legal_form: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub legal_mentions: Option<String>,
    pub payment_terms: Option<String>,
    pub late_penalty: Option<String>,
    pub footer: Option<String>,
    pub theme: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateDocumentSettings {
    pub company_name: Option<String>,
    pub legal_form: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub legal_mentions: Option<String>,
    pub payment_terms: Option<String>,
    pub late_penalty: Option<String>,
    pub footer: Option<String>,
    pub theme: Option<serde_json::Value>,
}
