//! Services module for facturation-service.

pub mod clients;
pub mod conversion;
pub mod database;
pub mod invoices;
pub mod metrics;
pub mod numbering;
pub mod payments;
pub mod quotes;
pub mod settings;
pub mod stats;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
