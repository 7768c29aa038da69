//! Client model for facturation-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Company,
    Individual,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Company => "company",
            ClientType::Individual => "individual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Pending,
    Inactive,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Active => "active",
            ClientStatus::Pending => "pending",
            ClientStatus::Inactive => "inactive",
        }
    }
}

/// Client with revenue figures computed at read time.
#[derive(Debug, Clone, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub client_type: String,
    pub parent_company_id: Option<Uuid>,
    pub status: String,
    pub notes: Option<String>,
    pub total_revenue: Money,
    pub invoice_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateClient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub client_type: ClientType,
    pub parent_company_id: Option<Uuid>,
    pub status: ClientStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateClient {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub client_type: Option<ClientType>,
    /// `Some(None)` detaches the client from its parent company.
    pub parent_company_id: Option<Option<Uuid>>,
    pub status: Option<ClientStatus>,
    pub notes: Option<String>,
}
