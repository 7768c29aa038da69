use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::money::Money;
use crate::domain::totals::LineDraft;
use crate::models::{InvoiceItem, QuoteItem};

/// A line item as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ItemInput {
    #[validate(length(min = 1, message = "La description de la ligne est requise"))]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub vat_rate: Option<Decimal>,
}

impl From<ItemInput> for LineDraft {
    fn from(item: ItemInput) -> Self {
        LineDraft {
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: item.discount.unwrap_or(Decimal::ZERO),
            vat_rate: item.vat_rate,
        }
    }
}

pub(crate) fn into_lines(items: Vec<ItemInput>) -> Vec<LineDraft> {
    items.into_iter().map(LineDraft::from).collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub discount: Decimal,
    pub vat_rate: Option<Decimal>,
    pub total: Money,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<InvoiceItem> for ItemResponse {
    fn from(item: InvoiceItem) -> Self {
        Self {
            id: item.id,
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: item.discount,
            vat_rate: item.vat_rate,
            total: item.total,
            sort_order: item.sort_order,
            created_at: item.created_at,
        }
    }
}

impl From<QuoteItem> for ItemResponse {
    fn from(item: QuoteItem) -> Self {
        Self {
            id: item.id,
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: item.discount,
            vat_rate: item.vat_rate,
            total: item.total,
            sort_order: item.sort_order,
            created_at: item.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_accepts_numbers_and_strings() {
        let item: ItemInput = serde_json::from_value(serde_json::json!({
            "description": "Dev",
            "quantity": 5,
            "unitPrice": "450"
        }))
        .unwrap();

        let line = LineDraft::from(item);
        assert_eq!(line.quantity, Decimal::from(5));
        assert_eq!(line.unit_price, Money::from_cents(45_000));
        assert_eq!(line.discount, Decimal::ZERO);
        assert_eq!(line.vat_rate, None);
    }

    #[test]
    fn empty_description_fails_validation() {
        let item: ItemInput = serde_json::from_value(serde_json::json!({
            "description": "",
            "quantity": 1,
            "unitPrice": 10
        }))
        .unwrap();
        assert!(item.validate().is_err());
    }
}
