use service_core::error::AppError;
use thiserror::Error;

use super::money::MoneyError;

/// Business-rule violations raised by the pure domain layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Input rejected by a business rule (400).
    #[error("{0}")]
    Validation(String),

    /// Attempt to change a document that can no longer change (403).
    #[error("{0}")]
    Immutable(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    pub fn immutable(message: impl Into<String>) -> Self {
        DomainError::Immutable(message.into())
    }
}

impl From<MoneyError> for DomainError {
    fn from(_: MoneyError) -> Self {
        DomainError::validation("Montant hors limites")
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(message) => AppError::BadRequest(anyhow::anyhow!(message)),
            DomainError::Immutable(message) => AppError::Forbidden(anyhow::anyhow!(message)),
        }
    }
}
