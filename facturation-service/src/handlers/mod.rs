//! HTTP handlers for facturation-service.

pub mod clients;
pub mod health;
pub mod invoices;
pub mod payments;
pub mod quotes;
pub mod settings;

use service_core::error::AppError;

use crate::services::metrics::ERRORS_TOTAL;

/// Count a failed request by error kind.
pub(crate) fn record_error(err: &AppError) {
    ERRORS_TOTAL.with_label_values(&[err.kind()]).inc();
}

/// Run `validator` rules on a request body.
pub(crate) fn validate<T: validator::Validate>(req: &T) -> Result<(), AppError> {
    req.validate().map_err(AppError::from).inspect_err(record_error)
}
