//! Caller identity forwarded by the authentication gateway.
//!
//! Authentication itself happens upstream. The gateway resolves the session
//! and forwards the user id as a UUID in the `X-User-ID` header; every store
//! query is then scoped by that id.

use axum::{extract::FromRequestParts, http::request::Parts};
use service_core::error::AppError;
use uuid::Uuid;

use crate::services::metrics::ERRORS_TOTAL;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the authenticated user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0
    }
}

fn parse_user_id(parts: &Parts) -> Result<Uuid, AppError> {
    let raw = parts
        .headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Authentification requise")))?;

    raw.to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Identifiant utilisateur invalide")))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parse_user_id(parts) {
            Ok(user_id) => {
                tracing::Span::current().record("user_id", tracing::field::display(user_id));
                Ok(CurrentUser(user_id))
            }
            Err(err) => {
                tracing::warn!(path = %parts.uri.path(), "Request without a valid user id");
                ERRORS_TOTAL.with_label_values(&[err.kind()]).inc();
                Err(err)
            }
        }
    }
}
