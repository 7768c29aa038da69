//! Document number allocation.

use crate::domain::numbering::{DocumentKind, DocumentNumber};
use crate::services::database::db_error;
use crate::services::metrics::NUMBERING_RETRIES;
use service_core::error::AppError;
use sqlx::postgres::PgConnection;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_ATTEMPTS: u32 = 5;

/// Allocate the next number for `(user, kind, year)`.
///
/// Must run inside the transaction that inserts the document: the advisory
/// lock is held until that transaction ends.
pub(crate) async fn allocate_number(
    conn: &mut PgConnection,
    user_id: Uuid,
    kind: DocumentKind,
    year: i32,
) -> Result<DocumentNumber, AppError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(kind.lock_key(user_id, year))
        .execute(&mut *conn)
        .await
        .map_err(|e| db_error("acquire numbering lock", e))?;

    let highest = match kind {
        DocumentKind::Quote => {
            sqlx::query_scalar::<_, Option<i32>>(
                "SELECT MAX(number_seq) FROM quotes WHERE user_id = $1 AND number_year = $2",
            )
            .bind(user_id)
            .bind(year)
            .fetch_one(&mut *conn)
            .await
        }
        DocumentKind::Invoice | DocumentKind::CreditNote => {
            sqlx::query_scalar::<_, Option<i32>>(
                r#"
                SELECT MAX(number_seq) FROM invoices
                WHERE user_id = $1 AND invoice_type = $2 AND number_year = $3
                "#,
            )
            .bind(user_id)
            .bind(kind.as_str())
            .bind(year)
            .fetch_one(&mut *conn)
            .await
        }
    }
    .map_err(|e| db_error("read highest document number", e))?;

    let number = DocumentNumber::next(kind, year, highest);
    debug!(kind = kind.as_str(), number = %number, "Document number allocated");
    Ok(number)
}

/// Run `op` again when it fails on the number unique index.
///
/// `op` must open and commit its own transaction so that each attempt reads a
/// fresh maximum.
pub(crate) async fn retry_on_number_conflict<T, F, Fut>(
    kind: DocumentKind,
    mut op: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(AppError::Conflict(err)) if attempt < MAX_ATTEMPTS => {
                NUMBERING_RETRIES.with_label_values(&[kind.as_str()]).inc();
                warn!(kind = kind.as_str(), attempt, error = %err, "Document number conflict, retrying");
                tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                attempt += 1;
            }
            Err(AppError::Conflict(err)) => {
                return Err(AppError::InternalError(anyhow::anyhow!(
                    "Could not allocate a {} number after {} attempts: {}",
                    kind.as_str(),
                    MAX_ATTEMPTS,
                    err
                )));
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_conflicts_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_on_number_conflict(DocumentKind::Invoice, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::Conflict(anyhow::anyhow!("taken")))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AppError> = retry_on_number_conflict(DocumentKind::Quote, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Conflict(anyhow::anyhow!("taken")))
        })
        .await;

        assert!(matches!(result, Err(AppError::InternalError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AppError> = retry_on_number_conflict(DocumentKind::Invoice, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::BadRequest(anyhow::anyhow!("nope")))
        })
        .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
