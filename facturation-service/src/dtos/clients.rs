use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::double_option;
use crate::domain::money::Money;
use crate::models::{Client, ClientStatus, ClientType, CreateClient, UpdateClient};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 255, message = "Le nom du client est requis"))]
    pub name: String,
    #[validate(email(message = "Adresse e-mail invalide"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[validate(length(max = 32))]
    pub siret: Option<String>,
    #[validate(length(max = 32))]
    pub vat_number: Option<String>,
    pub client_type: Option<ClientType>,
    pub parent_company_id: Option<Uuid>,
    pub status: Option<ClientStatus>,
    pub notes: Option<String>,
}

impl CreateClientRequest {
    pub fn into_model(self) -> CreateClient {
        CreateClient {
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            postal_code: self.postal_code,
            city: self.city,
            country: self.country,
            siret: self.siret,
            vat_number: self.vat_number,
            client_type: self.client_type.unwrap_or(ClientType::Company),
            parent_company_id: self.parent_company_id,
            status: self.status.unwrap_or(ClientStatus::Active),
            notes: self.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, max = 255, message = "Le nom du client est requis"))]
    pub name: Option<String>,
    #[validate(email(message = "Adresse e-mail invalide"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[validate(length(max = 32))]
    pub siret: Option<String>,
    #[validate(length(max = 32))]
    pub vat_number: Option<String>,
    pub client_type: Option<ClientType>,
    /// `null` detaches the client from its parent company.
    #[serde(default, deserialize_with = "double_option")]
    pub parent_company_id: Option<Option<Uuid>>,
    pub status: Option<ClientStatus>,
    pub notes: Option<String>,
}

impl UpdateClientRequest {
    pub fn into_model(self) -> UpdateClient {
        UpdateClient {
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            postal_code: self.postal_code,
            city: self.city,
            country: self.country,
            siret: self.siret,
            vat_number: self.vat_number,
            client_type: self.client_type,
            parent_company_id: self.parent_company_id,
            status: self.status,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub id: Uuid,
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

impl From<Client> for ClientResponse {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            name: client.name,
            email: client.email,
            phone: client.phone,
            address: client.address,
            postal_code: client.postal_code,
            city: client.city,
            country: client.country,
            siret: client.siret,
            vat_number: client.vat_number,
            client_type: client.client_type,
            parent_company_id: client.parent_company_id,
            status: client.status,
            notes: client.notes,
            total_revenue: client.total_revenue,
            invoice_count: client.invoice_count,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}
