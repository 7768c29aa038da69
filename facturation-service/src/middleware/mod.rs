//! Request extractors for facturation-service.

pub mod user;

pub use user::{CurrentUser, USER_ID_HEADER};
