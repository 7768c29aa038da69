use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::{DocumentSettings, UpdateDocumentSettings};

fn theme_is_object(theme: &serde_json::Value) -> Result<(), ValidationError> {
    if theme.is_object() {
        Ok(())
    } else {
        Err(ValidationError::new("theme_not_object"))
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub company_name: Option<String>,
    pub legal_form: Option<String>,
    #[validate(length(max = 32))]
    pub siret: Option<String>,
    #[validate(length(max = 32))]
    pub vat_number: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[validate(email(message = "Adresse e-mail invalide"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 64))]
    pub iban: Option<String>,
    #[validate(length(max = 32))]
    pub bic: Option<String>,
    pub legal_mentions: Option<String>,
    pub payment_terms: Option<String>,
    pub late_penalty: Option<String>,
    pub footer: Option<String>,
    #[validate(custom(function = "theme_is_object"))]
    pub theme: Option<serde_json::Value>,
}

impl UpdateSettingsRequest {
    pub fn into_model(self) -> UpdateDocumentSettings {
        UpdateDocumentSettings {
            company_name: self.company_name,
            legal_form: self.legal_form,
            siret: self.siret,
            vat_number: self.vat_number,
            address: self.address,
            postal_code: self.postal_code,
            city: self.city,
            country: self.country,
            email: self.email,
            phone: self.phone,
            iban: self.iban,
            bic: self.bic,
            legal_mentions: self.legal_mentions,
            payment_terms: self.payment_terms,
            late_penalty: self.late_penalty,
            footer: self.footer,
            theme: self.theme,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
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
    pub updated_at: DateTime<Utc>,
}

impl From<DocumentSettings> for SettingsResponse {
    fn from(settings: DocumentSettings) -> Self {
        Self {
            company_name: settings.company_name,
            legal_form: settings.legal_form,
            siret: settings.siret,
            vat_number: settings.vat_number,
            address: settings.address,
            postal_code: settings.postal_code,
            city: settings.city,
            country: settings.country,
            email: settings.email,
            phone: settings.phone,
            iban: settings.iban,
            bic: settings.bic,
            legal_mentions: settings.legal_mentions,
            payment_terms: settings.payment_terms,
            late_penalty: settings.late_penalty,
            footer: settings.footer,
            theme: settings.theme,
            updated_at: settings.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_must_be_an_object() {
        let ok: UpdateSettingsRequest = serde_json::from_value(serde_json::json!({
            "theme": { "primaryColor": "#1d4ed8", "template": "classic" }
        }))
        .unwrap();
        assert!(ok.validate().is_ok());

        let bad: UpdateSettingsRequest =
            serde_json::from_value(serde_json::json!({ "theme": "blue" })).unwrap();
        assert!(bad.validate().is_err());
    }
}
