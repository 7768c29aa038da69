//! Invoice lifecycle: create, update, finalize, credit notes, overdue sweep.

use crate::config::BillingDefaults;
use crate::domain::lifecycle::{self, StatusChange};
use crate::domain::numbering::{DocumentKind, DocumentNumber};
use crate::domain::reconciliation::{reconcile, Balance};
use crate::domain::totals::{document_totals, price_lines, DocumentTotals, PricedLine};
use crate::models::{
    CreateInvoice, Invoice, InvoiceStatus, InvoiceType, InvoiceWithItems, ListInvoicesFilter,
    PaymentMethod, PaymentStatus, UpdateInvoice,
};
use crate::services::database::{
    begin, commit, db_error, ensure_client, fetch_invoice_items, has_payments, insert_error,
    invoice_not_found, lock_invoice, replace_invoice_items, total_paid, write_payment_state,
    Database,
};
use crate::services::metrics::{DB_QUERY_DURATION, INVOICES_TOTAL, TRANSITIONS_TOTAL};
use crate::services::numbering::{allocate_number, retry_on_number_conflict};
use crate::services::payments::{insert_payment, NewPaymentRow};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

/// Header values for a new row in `invoices`.
pub(crate) struct NewInvoiceRow<'a> {
    pub client_id: Uuid,
    pub invoice_type: InvoiceType,
    pub related_invoice_id: Option<Uuid>,
    pub totals: DocumentTotals,
    pub status: InvoiceStatus,
    pub payment_status: PaymentStatus,
    pub is_finalized: bool,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub description: Option<&'a str>,
    pub notes: Option<&'a str>,
}

impl<'a> NewInvoiceRow<'a> {
    /// A fresh unpaid draft.
    pub fn draft(
        client_id: Uuid,
        totals: DocumentTotals,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        description: Option<&'a str>,
        notes: Option<&'a str>,
    ) -> Self {
        Self {
            client_id,
            invoice_type: InvoiceType::Invoice,
            related_invoice_id: None,
            totals,
            status: InvoiceStatus::Draft,
            payment_status: PaymentStatus::Unpaid,
            is_finalized: false,
            issue_date,
            due_date,
            paid_at: None,
            description,
            notes,
        }
    }
}

/// Allocate a number and insert the header. A unique violation on the number
/// surfaces as `Conflict` for the retry loop.
pub(crate) async fn insert_invoice(
    conn: &mut PgConnection,
    user_id: Uuid,
    row: &NewInvoiceRow<'_>,
) -> Result<Invoice, AppError> {
    let kind = row.invoice_type.document_kind();
    let number: DocumentNumber =
        allocate_number(conn, user_id, kind, row.issue_date.year()).await?;

    sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (
            id, user_id, client_id, invoice_number, number_year, number_seq, invoice_type,
            related_invoice_id, subtotal, vat_rate, vat_amount, total, status, payment_status,
            is_finalized, finalized_at, sent_at, issue_date, due_date, paid_at, description, notes
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
            $15, CASE WHEN $15 THEN NOW() END, CASE WHEN $13 <> 'draft' THEN NOW() END,
            $16, $17, $18, $19, $20
        )
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(row.client_id)
    .bind(number.to_string())
    .bind(number.year)
    .bind(number.seq)
    .bind(row.invoice_type.as_str())
    .bind(row.related_invoice_id)
    .bind(row.totals.subtotal)
    .bind(row.totals.vat_rate)
    .bind(row.totals.vat_amount)
    .bind(row.totals.total)
    .bind(row.status.as_str())
    .bind(row.payment_status.as_str())
    .bind(row.is_finalized)
    .bind(row.issue_date)
    .bind(row.due_date)
    .bind(row.paid_at)
    .bind(row.description)
    .bind(row.notes)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| insert_error("insert invoice", e))
}

impl Database {
    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// List the caller's invoices and credit notes, newest first.
    #[instrument(skip(self, filter), fields(user_id = %user_id))]
    pub async fn list_invoices(
        &self,
        user_id: Uuid,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE user_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR payment_status = $3)
              AND ($4::uuid IS NULL OR client_id = $4)
              AND ($5::text IS NULL OR invoice_type = $5)
            ORDER BY issue_date DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.payment_status.map(|s| s.as_str()))
        .bind(filter.client_id)
        .bind(filter.invoice_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list invoices", e))?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceWithItems>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| db_error("acquire connection", e))?;

        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(invoice_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_error("get invoice", e))?;

        let result = match invoice {
            Some(invoice) => {
                let items = fetch_invoice_items(&mut conn, user_id, invoice.id).await?;
                Some(InvoiceWithItems { invoice, items })
            }
            None => None,
        };

        timer.observe_duration();

        Ok(result)
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Create a draft invoice with a freshly allocated `FAC` number.
    #[instrument(skip(self, input, defaults), fields(user_id = %user_id, client_id = %input.client_id))]
    pub async fn create_invoice(
        &self,
        user_id: Uuid,
        input: &CreateInvoice,
        defaults: &BillingDefaults,
    ) -> Result<InvoiceWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let lines = price_lines(input.lines.clone())?;
        let totals = document_totals(&lines, input.vat_rate.unwrap_or(defaults.vat_rate))?;
        let today = Utc::now().date_naive();
        let due_date = input
            .due_date
            .unwrap_or_else(|| lifecycle::days_after(today, defaults.payment_term_days));
        lifecycle::ensure_due_date(today, due_date)?;

        let row = NewInvoiceRow::draft(
            input.client_id,
            totals,
            today,
            due_date,
            input.description.as_deref(),
            input.notes.as_deref(),
        );

        let created = retry_on_number_conflict(DocumentKind::Invoice, || {
            self.create_invoice_once(user_id, &row, &lines)
        })
        .await?;

        timer.observe_duration();
        INVOICES_TOTAL
            .with_label_values(&[InvoiceType::Invoice.as_str()])
            .inc();

        info!(
            invoice_id = %created.invoice.id,
            invoice_number = %created.invoice.invoice_number,
            total = %created.invoice.total,
            "Invoice created"
        );

        Ok(created)
    }

    async fn create_invoice_once(
        &self,
        user_id: Uuid,
        row: &NewInvoiceRow<'_>,
        lines: &[PricedLine],
    ) -> Result<InvoiceWithItems, AppError> {
        let mut tx = begin(&self.pool).await?;
        ensure_client(&mut tx, user_id, row.client_id).await?;
        let invoice = insert_invoice(&mut tx, user_id, row).await?;
        let items = replace_invoice_items(&mut tx, user_id, invoice.id, lines).await?;
        commit(tx).await?;
        Ok(InvoiceWithItems { invoice, items })
    }

    /// Update an editable invoice. Items, when given, replace the current set.
    #[instrument(skip(self, input), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<InvoiceWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let now = Utc::now();
        let mut tx = begin(&self.pool).await?;

        let current = lock_invoice(&mut tx, user_id, invoice_id)
            .await?
            .ok_or_else(invoice_not_found)?;
        lifecycle::ensure_editable(&current)?;

        let paid_any = has_payments(&mut tx, current.id).await?;
        let change = match input.status {
            Some(target) => lifecycle::plan_status_change(current.status(), target, paid_any)?,
            None => StatusChange::Unchanged,
        };

        if let Some(client_id) = input.client_id {
            ensure_client(&mut tx, user_id, client_id).await?;
        }

        let due_date = input.due_date.unwrap_or(current.due_date);
        lifecycle::ensure_due_date(current.issue_date, due_date)?;

        let amounts_changed = input.lines.is_some() || input.vat_rate.is_some();
        let vat_rate = input.vat_rate.unwrap_or(current.vat_rate);
        let (items, totals) = match &input.lines {
            Some(lines) => {
                let priced = price_lines(lines.clone())?;
                let totals = document_totals(&priced, vat_rate)?;
                let items = replace_invoice_items(&mut tx, user_id, current.id, &priced).await?;
                (items, totals)
            }
            None => {
                let items = fetch_invoice_items(&mut tx, user_id, current.id).await?;
                let totals = if amounts_changed {
                    let priced: Vec<PricedLine> = items.iter().map(PricedLine::from).collect();
                    document_totals(&priced, vat_rate)?
                } else {
                    current.totals()
                };
                (items, totals)
            }
        };

        let status = match change {
            StatusChange::Set(status) => status,
            StatusChange::Unchanged | StatusChange::Settle => current.status(),
        };

        let mut invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET client_id = $3,
                subtotal = $4,
                vat_rate = $5,
                vat_amount = $6,
                total = $7,
                due_date = $8,
                description = COALESCE($9, description),
                notes = COALESCE($10, notes),
                status = $11,
                sent_at = CASE WHEN $11 = 'sent' THEN COALESCE(sent_at, NOW()) ELSE sent_at END,
                updated_at = NOW()
            WHERE user_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(current.id)
        .bind(input.client_id.unwrap_or(current.client_id))
        .bind(totals.subtotal)
        .bind(totals.vat_rate)
        .bind(totals.vat_amount)
        .bind(totals.total)
        .bind(due_date)
        .bind(input.description.as_deref())
        .bind(input.notes.as_deref())
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("update invoice", e))?;

        if change == StatusChange::Settle || (amounts_changed && paid_any) {
            let mut paid = total_paid(&mut tx, invoice.id).await?;
            if paid > invoice.total {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Le nouveau total est inférieur aux paiements déjà enregistrés ({} €)",
                    paid
                )));
            }
            if change == StatusChange::Settle && paid < invoice.total {
                let outstanding = invoice.total - paid;
                insert_payment(
                    &mut tx,
                    user_id,
                    &NewPaymentRow {
                        invoice_id: invoice.id,
                        amount: outstanding,
                        method: PaymentMethod::Other,
                        reference: None,
                        notes: Some("Règlement du solde"),
                        payment_date: now.date_naive(),
                    },
                )
                .await?;
                paid = invoice.total;
            }
            let balance = Balance::new(invoice.total, paid);
            let state = reconcile(&invoice.payment_state(), &balance, now);
            invoice = write_payment_state(&mut tx, invoice.id, &state).await?;
        }

        commit(tx).await?;
        timer.observe_duration();

        info!(
            invoice_id = %invoice.id,
            status = %invoice.status,
            payment_status = %invoice.payment_status,
            total = %invoice.total,
            "Invoice updated"
        );

        Ok(InvoiceWithItems { invoice, items })
    }

    /// Lock a sent invoice for good.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn finalize_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<InvoiceWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["finalize_invoice"])
            .start_timer();

        let mut tx = begin(&self.pool).await?;
        let current = lock_invoice(&mut tx, user_id, invoice_id)
            .await?
            .ok_or_else(invoice_not_found)?;
        lifecycle::ensure_finalizable(&current)?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET is_finalized = TRUE, finalized_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND id = $2 AND is_finalized = FALSE
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("finalize invoice", e))?;
        let items = fetch_invoice_items(&mut tx, user_id, invoice.id).await?;

        commit(tx).await?;
        timer.observe_duration();
        TRANSITIONS_TOTAL.with_label_values(&["finalized"]).inc();

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            "Invoice finalized"
        );

        Ok(InvoiceWithItems { invoice, items })
    }

    /// Issue a credit note (avoir) mirroring an invoice with negated amounts.
    ///
    /// The original invoice is left untouched. The credit note is born sent,
    /// paid and finalized.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn issue_credit_note(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<InvoiceWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["issue_credit_note"])
            .start_timer();

        let credit_note = retry_on_number_conflict(DocumentKind::CreditNote, || {
            self.issue_credit_note_once(user_id, invoice_id)
        })
        .await?;

        timer.observe_duration();
        INVOICES_TOTAL
            .with_label_values(&[InvoiceType::CreditNote.as_str()])
            .inc();

        info!(
            credit_note_id = %credit_note.invoice.id,
            credit_note_number = %credit_note.invoice.invoice_number,
            related_invoice_id = %invoice_id,
            total = %credit_note.invoice.total,
            "Credit note issued"
        );

        Ok(credit_note)
    }

    async fn issue_credit_note_once(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<InvoiceWithItems, AppError> {
        let now = Utc::now();
        let today = now.date_naive();
        let mut tx = begin(&self.pool).await?;

        let source = lock_invoice(&mut tx, user_id, invoice_id)
            .await?
            .ok_or_else(invoice_not_found)?;
        lifecycle::ensure_credit_note_source(&source)?;

        let source_items = fetch_invoice_items(&mut tx, user_id, source.id).await?;
        let lines: Vec<PricedLine> = source_items
            .iter()
            .map(|item| PricedLine::from(item).negated())
            .collect();
        let totals = source.totals().negated();
        let description = lifecycle::credit_note_description(&source.invoice_number);

        let row = NewInvoiceRow {
            client_id: source.client_id,
            invoice_type: InvoiceType::CreditNote,
            related_invoice_id: Some(source.id),
            totals,
            status: InvoiceStatus::Sent,
            payment_status: PaymentStatus::Paid,
            is_finalized: true,
            issue_date: today,
            due_date: today,
            paid_at: Some(now),
            description: Some(&description),
            notes: None,
        };
        let invoice = insert_invoice(&mut tx, user_id, &row).await?;
        let items = replace_invoice_items(&mut tx, user_id, invoice.id, &lines).await?;

        commit(tx).await?;
        Ok(InvoiceWithItems { invoice, items })
    }

    /// Delete an unpaid, unlinked draft.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = begin(&self.pool).await?;
        let invoice = lock_invoice(&mut tx, user_id, invoice_id)
            .await?
            .ok_or_else(invoice_not_found)?;

        let paid_any = has_payments(&mut tx, invoice.id).await?;
        let linked = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM invoices WHERE related_invoice_id = $1)
                OR EXISTS (SELECT 1 FROM quotes WHERE converted_to_invoice_id = $1)
            "#,
        )
        .bind(invoice.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("check invoice links", e))?;
        lifecycle::ensure_deletable(&invoice, paid_any, linked)?;

        sqlx::query("DELETE FROM invoices WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(invoice.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete invoice", e))?;

        commit(tx).await?;
        timer.observe_duration();

        info!(invoice_id = %invoice.id, invoice_number = %invoice.invoice_number, "Invoice deleted");

        Ok(())
    }

    /// Flag sent invoices past their due date with an outstanding balance.
    ///
    /// Returns the number of invoices moved to overdue.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn mark_overdue(&self, user_id: Uuid) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_overdue"])
            .start_timer();

        let now = Utc::now();
        let mut tx = begin(&self.pool).await?;

        let candidates = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE user_id = $1
              AND invoice_type = 'invoice'
              AND status = 'sent'
              AND payment_status IN ('unpaid', 'partial')
              AND due_date < $2
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(now.date_naive())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("select overdue invoices", e))?;

        let mut updated = 0u64;
        for invoice in &candidates {
            let state = lifecycle::transition_payment_state(
                &invoice.payment_state(),
                PaymentStatus::Overdue,
                now,
            );
            write_payment_state(&mut tx, invoice.id, &state).await?;
            updated += 1;
        }

        commit(tx).await?;
        timer.observe_duration();
        TRANSITIONS_TOTAL
            .with_label_values(&["overdue"])
            .inc_by(updated as f64);

        info!(updated = updated, "Overdue invoices flagged");

        Ok(updated)
    }
}
