//! Request and response bodies of the REST API.
//!
//! JSON is camelCase. Amounts are strings with two decimals.

pub mod clients;
pub mod invoices;
pub mod items;
pub mod payments;
pub mod quotes;
pub mod settings;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub use clients::*;
pub use invoices::*;
pub use items::*;
pub use payments::*;
pub use quotes::*;
pub use settings::*;

/// Body returned by deletions.
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub id: Uuid,
}

impl DeletedResponse {
    pub fn new(id: Uuid) -> Self {
        Self { success: true, id }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
