//! Pure business rules: no I/O, no clock reads.

pub mod conversion;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod numbering;
pub mod reconciliation;
pub mod totals;

pub use error::DomainError;
pub use money::Money;
