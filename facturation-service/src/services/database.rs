//! Database service for facturation-service.
//!
//! Operations are split by aggregate across the sibling modules, each adding
//! methods to [`Database`]. Every mutating operation runs in one transaction
//! that re-reads its target rows `FOR UPDATE` before validating and writing.

use crate::domain::lifecycle::PaymentState;
use crate::domain::money::Money;
use crate::domain::totals::PricedLine;
use crate::models::{Invoice, InvoiceItem, Quote, QuoteItem};
use service_core::error::AppError;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "facturation-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Helpers shared by the per-aggregate modules. They take the caller's
// transaction connection so that reads and writes stay in one unit.
// -----------------------------------------------------------------------------

pub(crate) fn db_error(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("Failed to {}: {}", context, e))
}

/// Unique violations on a document insert surface as `Conflict`, which the
/// numbering retry loop understands.
pub(crate) fn insert_error(context: &str, e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("Document number already taken: {}", e))
        }
        _ => db_error(context, e),
    }
}

pub(crate) fn invoice_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Facture introuvable"))
}

pub(crate) fn quote_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Devis introuvable"))
}

pub(crate) async fn begin(pool: &PgPool) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, AppError> {
    pool.begin().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
    })
}

pub(crate) async fn commit(tx: sqlx::Transaction<'static, sqlx::Postgres>) -> Result<(), AppError> {
    tx.commit().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
    })
}

pub(crate) async fn lock_invoice(
    conn: &mut PgConnection,
    user_id: Uuid,
    invoice_id: Uuid,
) -> Result<Option<Invoice>, AppError> {
    sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE user_id = $1 AND id = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(invoice_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| db_error("lock invoice", e))
}

pub(crate) async fn lock_quote(
    conn: &mut PgConnection,
    user_id: Uuid,
    quote_id: Uuid,
) -> Result<Option<Quote>, AppError> {
    sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE user_id = $1 AND id = $2 FOR UPDATE")
        .bind(user_id)
        .bind(quote_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_error("lock quote", e))
}

pub(crate) async fn fetch_invoice_items(
    conn: &mut PgConnection,
    user_id: Uuid,
    invoice_id: Uuid,
) -> Result<Vec<InvoiceItem>, AppError> {
    sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT * FROM invoice_items
        WHERE user_id = $1 AND invoice_id = $2
        ORDER BY sort_order, created_at
        "#,
    )
    .bind(user_id)
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| db_error("fetch invoice items", e))
}

pub(crate) async fn fetch_quote_items(
    conn: &mut PgConnection,
    user_id: Uuid,
    quote_id: Uuid,
) -> Result<Vec<QuoteItem>, AppError> {
    sqlx::query_as::<_, QuoteItem>(
        r#"
        SELECT * FROM quote_items
        WHERE user_id = $1 AND quote_id = $2
        ORDER BY sort_order, created_at
        "#,
    )
    .bind(user_id)
    .bind(quote_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| db_error("fetch quote items", e))
}

/// Replace every item of an invoice. Runs inside the caller's transaction so
/// readers never observe a partial item set.
pub(crate) async fn replace_invoice_items(
    conn: &mut PgConnection,
    user_id: Uuid,
    invoice_id: Uuid,
    lines: &[PricedLine],
) -> Result<Vec<InvoiceItem>, AppError> {
    sqlx::query("DELETE FROM invoice_items WHERE user_id = $1 AND invoice_id = $2")
        .bind(user_id)
        .bind(invoice_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_error("delete invoice items", e))?;

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = sqlx::query_as::<_, InvoiceItem>(
            r#"
            INSERT INTO invoice_items (
                id, invoice_id, user_id, description, quantity, unit_price,
                discount, vat_rate, total, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(user_id)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.discount)
        .bind(line.vat_rate)
        .bind(line.total)
        .bind(line.sort_order)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| db_error("insert invoice item", e))?;
        items.push(item);
    }
    Ok(items)
}

pub(crate) async fn replace_quote_items(
    conn: &mut PgConnection,
    user_id: Uuid,
    quote_id: Uuid,
    lines: &[PricedLine],
) -> Result<Vec<QuoteItem>, AppError> {
    sqlx::query("DELETE FROM quote_items WHERE user_id = $1 AND quote_id = $2")
        .bind(user_id)
        .bind(quote_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_error("delete quote items", e))?;

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = sqlx::query_as::<_, QuoteItem>(
            r#"
            INSERT INTO quote_items (
                id, quote_id, user_id, description, quantity, unit_price,
                discount, vat_rate, total, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(quote_id)
        .bind(user_id)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.discount)
        .bind(line.vat_rate)
        .bind(line.total)
        .bind(line.sort_order)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| db_error("insert quote item", e))?;
        items.push(item);
    }
    Ok(items)
}

pub(crate) async fn client_exists(
    conn: &mut PgConnection,
    user_id: Uuid,
    client_id: Uuid,
) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM clients WHERE user_id = $1 AND id = $2)",
    )
    .bind(user_id)
    .bind(client_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| db_error("check client", e))
}

pub(crate) async fn ensure_client(
    conn: &mut PgConnection,
    user_id: Uuid,
    client_id: Uuid,
) -> Result<(), AppError> {
    if !client_exists(conn, user_id, client_id).await? {
        return Err(AppError::BadRequest(anyhow::anyhow!("Client introuvable")));
    }
    Ok(())
}

pub(crate) async fn total_paid(conn: &mut PgConnection, invoice_id: Uuid) -> Result<Money, AppError> {
    let cents = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments WHERE invoice_id = $1",
    )
    .bind(invoice_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| db_error("sum payments", e))?;
    Ok(Money::from_cents(cents))
}

pub(crate) async fn has_payments(conn: &mut PgConnection, invoice_id: Uuid) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM payments WHERE invoice_id = $1)")
        .bind(invoice_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| db_error("check payments", e))
}

/// Persist both status axes and `paid_at` in one statement.
pub(crate) async fn write_payment_state(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    state: &PaymentState,
) -> Result<Invoice, AppError> {
    sqlx::query_as::<_, Invoice>(
        r#"
        UPDATE invoices
        SET status = $2, payment_status = $3, paid_at = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(invoice_id)
    .bind(state.status.as_str())
    .bind(state.payment_status.as_str())
    .bind(state.paid_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| db_error("update payment state", e))
}
