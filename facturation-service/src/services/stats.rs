//! Monthly treasury figures.

use crate::domain::money::Money;
use crate::domain::reconciliation::month_bounds;
use crate::models::{OverdueSummary, PaymentWithInvoice, TreasuryStats};
use crate::services::database::{db_error, Database};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::NaiveDate;
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

const RECENT_PAYMENTS: i64 = 5;

impl Database {
    /// Treasury view for the month containing `today`. Outstanding and
    /// overdue amounts are remaining balances, not gross totals.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn treasury_stats(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<TreasuryStats, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["treasury_stats"])
            .start_timer();

        let (month_start, next_month) = month_bounds(today);

        let collected = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments
            WHERE user_id = $1 AND payment_date >= $2 AND payment_date < $3
            "#,
        )
        .bind(user_id)
        .bind(month_start)
        .bind(next_month)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("sum collected", e))?;

        let invoiced = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(total), 0)::BIGINT FROM invoices
            WHERE user_id = $1
              AND invoice_type = 'invoice'
              AND status <> 'cancelled'
              AND issue_date >= $2 AND issue_date < $3
            "#,
        )
        .bind(user_id)
        .bind(month_start)
        .bind(next_month)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("sum invoiced", e))?;

        let (outstanding, overdue_count, overdue_amount) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            WITH balances AS (
                SELECT i.payment_status,
                       i.total - COALESCE((SELECT SUM(p.amount) FROM payments p
                                           WHERE p.invoice_id = i.id), 0) AS balance_due
                FROM invoices i
                WHERE i.user_id = $1
                  AND i.invoice_type = 'invoice'
                  AND i.status <> 'cancelled'
            )
            SELECT
                COALESCE(SUM(balance_due) FILTER (WHERE payment_status IN ('unpaid', 'partial')), 0)::BIGINT,
                COUNT(*) FILTER (WHERE payment_status = 'overdue'),
                COALESCE(SUM(balance_due) FILTER (WHERE payment_status = 'overdue'), 0)::BIGINT
            FROM balances
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("sum balances", e))?;

        let recent_payments = sqlx::query_as::<_, PaymentWithInvoice>(
            r#"
            SELECT p.*, i.invoice_number
            FROM payments p
            JOIN invoices i ON i.id = p.invoice_id
            WHERE p.user_id = $1
            ORDER BY p.payment_date DESC, p.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(RECENT_PAYMENTS)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list recent payments", e))?;

        timer.observe_duration();

        Ok(TreasuryStats {
            collected_this_month: Money::from_cents(collected),
            invoiced_this_month: Money::from_cents(invoiced),
            outstanding: Money::from_cents(outstanding),
            overdue: OverdueSummary {
                count: overdue_count,
                amount: Money::from_cents(overdue_amount),
            },
            recent_payments,
        })
    }
}
