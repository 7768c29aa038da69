//! Payment records and the reconciliation they drive.

use crate::domain::lifecycle::transition_payment_state;
use crate::domain::money::Money;
use crate::domain::reconciliation::{
    ensure_payment_accepted, plan_legacy_payment, reconcile, Balance, LegacyPaymentPlan,
};
use crate::models::{
    CreatePayment, Invoice, InvoiceWithItems, Payment, PaymentMethod, PaymentStatus,
    PaymentWithInvoice,
};
use crate::services::database::{
    begin, commit, db_error, fetch_invoice_items, has_payments, invoice_not_found, lock_invoice,
    total_paid, write_payment_state, Database,
};
use crate::services::metrics::{DB_QUERY_DURATION, PAYMENTS_TOTAL, TRANSITIONS_TOTAL};
use chrono::{NaiveDate, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgConnection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub(crate) struct NewPaymentRow<'a> {
    pub invoice_id: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub payment_date: NaiveDate,
}

pub(crate) async fn insert_payment(
    conn: &mut PgConnection,
    user_id: Uuid,
    row: &NewPaymentRow<'_>,
) -> Result<Payment, AppError> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (id, user_id, invoice_id, amount, method, reference, notes, payment_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(row.invoice_id)
    .bind(row.amount)
    .bind(row.method.as_str())
    .bind(row.reference)
    .bind(row.notes)
    .bind(row.payment_date)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| db_error("insert payment", e))?;

    PAYMENTS_TOTAL
        .with_label_values(&[row.method.as_str()])
        .inc();

    Ok(payment)
}

/// Recompute and persist the payment state of a locked invoice.
async fn reconcile_invoice(
    conn: &mut PgConnection,
    invoice: &Invoice,
) -> Result<(Invoice, Balance), AppError> {
    let balance = Balance::new(invoice.total, total_paid(conn, invoice.id).await?);
    let current = invoice.payment_state();
    let next = reconcile(&current, &balance, Utc::now());
    if next == current {
        return Ok((invoice.clone(), balance));
    }

    let updated = write_payment_state(conn, invoice.id, &next).await?;
    TRANSITIONS_TOTAL.with_label_values(&["reconciled"]).inc();
    info!(
        invoice_id = %invoice.id,
        from = %invoice.payment_status,
        to = %updated.payment_status,
        status = %updated.status,
        "Payment status reconciled"
    );
    Ok((updated, balance))
}

impl Database {
    /// All of the caller's payments, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_payments(&self, user_id: Uuid) -> Result<Vec<PaymentWithInvoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, PaymentWithInvoice>(
            r#"
            SELECT p.*, i.invoice_number
            FROM payments p
            JOIN invoices i ON i.id = p.invoice_id
            WHERE p.user_id = $1
            ORDER BY p.payment_date DESC, p.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list payments", e))?;

        timer.observe_duration();

        Ok(payments)
    }

    /// Payments of one invoice with its balance.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn invoice_payments(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<(Vec<Payment>, Balance), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_payments"])
            .start_timer();

        let invoice_total = sqlx::query_scalar::<_, Money>(
            "SELECT total FROM invoices WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get invoice total", e))?
        .ok_or_else(invoice_not_found)?;

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE user_id = $1 AND invoice_id = $2
            ORDER BY payment_date DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list invoice payments", e))?;

        timer.observe_duration();

        let paid: Money = payments.iter().map(|p| p.amount).sum();
        Ok((payments, Balance::new(invoice_total, paid)))
    }

    /// Record a payment, then reconcile the invoice in the same transaction.
    #[instrument(skip(self, input), fields(user_id = %user_id, invoice_id = %input.invoice_id))]
    pub async fn record_payment(
        &self,
        user_id: Uuid,
        input: &CreatePayment,
    ) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let mut tx = begin(&self.pool).await?;
        let invoice = lock_invoice(&mut tx, user_id, input.invoice_id)
            .await?
            .ok_or_else(invoice_not_found)?;
        let balance = Balance::new(invoice.total, total_paid(&mut tx, invoice.id).await?);

        if let Err(e) = ensure_payment_accepted(&invoice, &balance, input.amount) {
            warn!(
                invoice_id = %invoice.id,
                amount = %input.amount,
                balance_due = %balance.balance_due,
                "Payment rejected"
            );
            return Err(e.into());
        }

        let payment = insert_payment(
            &mut tx,
            user_id,
            &NewPaymentRow {
                invoice_id: invoice.id,
                amount: input.amount,
                method: input.method,
                reference: input.reference.as_deref(),
                notes: input.notes.as_deref(),
                payment_date: input
                    .payment_date
                    .unwrap_or_else(|| Utc::now().date_naive()),
            },
        )
        .await?;
        reconcile_invoice(&mut tx, &invoice).await?;

        commit(tx).await?;
        timer.observe_duration();

        info!(
            payment_id = %payment.id,
            invoice_id = %invoice.id,
            amount = %payment.amount,
            method = %payment.method,
            "Payment recorded"
        );

        Ok(payment)
    }

    /// Delete a payment and reconcile its invoice, possibly moving it back
    /// from paid to partial or unpaid.
    #[instrument(skip(self), fields(user_id = %user_id, payment_id = %payment_id))]
    pub async fn delete_payment(&self, user_id: Uuid, payment_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_payment"])
            .start_timer();

        let mut tx = begin(&self.pool).await?;

        let invoice_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT invoice_id FROM payments WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("get payment", e))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Paiement introuvable")))?;

        // Invoice first, then the payment row, matching record_payment.
        let invoice = lock_invoice(&mut tx, user_id, invoice_id)
            .await?
            .ok_or_else(invoice_not_found)?;

        let deleted = sqlx::query("DELETE FROM payments WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(payment_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete payment", e))?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Paiement introuvable")));
        }

        let (invoice, _) = reconcile_invoice(&mut tx, &invoice).await?;

        commit(tx).await?;
        timer.observe_duration();

        info!(
            payment_id = %payment_id,
            invoice_id = %invoice.id,
            payment_status = %invoice.payment_status,
            "Payment deleted"
        );

        Ok(())
    }

    /// Set the payment status of an invoice directly.
    ///
    /// Kept for older clients. Every outcome is expressed through payment
    /// records so that the status stays derived from them.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id, target = target.as_str()))]
    pub async fn apply_payment_status(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        target: PaymentStatus,
        paid_amount: Option<Money>,
    ) -> Result<InvoiceWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_payment_status"])
            .start_timer();

        let now = Utc::now();
        let mut tx = begin(&self.pool).await?;
        let invoice = lock_invoice(&mut tx, user_id, invoice_id)
            .await?
            .ok_or_else(invoice_not_found)?;
        let balance = Balance::new(invoice.total, total_paid(&mut tx, invoice.id).await?);
        let paid_any = has_payments(&mut tx, invoice.id).await?;

        let plan = plan_legacy_payment(&invoice, &balance, paid_any, target, paid_amount)?;
        let invoice = match plan {
            LegacyPaymentPlan::Record(amount) => {
                insert_payment(
                    &mut tx,
                    user_id,
                    &NewPaymentRow {
                        invoice_id: invoice.id,
                        amount,
                        method: PaymentMethod::Other,
                        reference: None,
                        notes: None,
                        payment_date: now.date_naive(),
                    },
                )
                .await?;
                reconcile_invoice(&mut tx, &invoice).await?.0
            }
            LegacyPaymentPlan::Reconcile => reconcile_invoice(&mut tx, &invoice).await?.0,
            LegacyPaymentPlan::Transition(status) => {
                let next = transition_payment_state(&invoice.payment_state(), status, now);
                write_payment_state(&mut tx, invoice.id, &next).await?
            }
        };
        let items = fetch_invoice_items(&mut tx, user_id, invoice.id).await?;

        commit(tx).await?;
        timer.observe_duration();

        info!(
            invoice_id = %invoice.id,
            status = %invoice.status,
            payment_status = %invoice.payment_status,
            "Payment status applied"
        );

        Ok(InvoiceWithItems { invoice, items })
    }
}
