//! Quote to invoice conversion, and back.

use crate::config::BillingDefaults;
use crate::domain::conversion::{ensure_convertible, ensure_quotable};
use crate::domain::lifecycle::days_after;
use crate::domain::numbering::DocumentKind;
use crate::domain::totals::PricedLine;
use crate::models::{InvoiceType, InvoiceWithItems, Quote, QuoteWithItems};
use crate::services::database::{
    begin, commit, db_error, fetch_invoice_items, fetch_quote_items, invoice_not_found,
    lock_invoice, lock_quote, quote_not_found, replace_invoice_items, replace_quote_items,
    Database,
};
use crate::services::invoices::{insert_invoice, NewInvoiceRow};
use crate::services::metrics::{DB_QUERY_DURATION, INVOICES_TOTAL, QUOTES_TOTAL};
use crate::services::numbering::retry_on_number_conflict;
use crate::services::quotes::{insert_quote, NewQuoteRow};
use chrono::Utc;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

impl Database {
    /// Turn a quote into a draft invoice and mark it accepted, exactly once.
    ///
    /// The quote row is locked for the whole transaction, so a concurrent
    /// conversion waits and then sees the quote as already converted.
    #[instrument(skip(self, defaults), fields(user_id = %user_id, quote_id = %quote_id))]
    pub async fn convert_quote_to_invoice(
        &self,
        user_id: Uuid,
        quote_id: Uuid,
        defaults: &BillingDefaults,
    ) -> Result<(Quote, InvoiceWithItems), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["convert_quote_to_invoice"])
            .start_timer();

        let (quote, invoice) = retry_on_number_conflict(DocumentKind::Invoice, || {
            self.convert_quote_once(user_id, quote_id, defaults)
        })
        .await?;

        timer.observe_duration();
        INVOICES_TOTAL
            .with_label_values(&[InvoiceType::Invoice.as_str()])
            .inc();

        info!(
            quote_id = %quote.id,
            quote_number = %quote.quote_number,
            invoice_id = %invoice.invoice.id,
            invoice_number = %invoice.invoice.invoice_number,
            "Quote converted to invoice"
        );

        Ok((quote, invoice))
    }

    async fn convert_quote_once(
        &self,
        user_id: Uuid,
        quote_id: Uuid,
        defaults: &BillingDefaults,
    ) -> Result<(Quote, InvoiceWithItems), AppError> {
        let today = Utc::now().date_naive();
        let mut tx = begin(&self.pool).await?;

        let source = lock_quote(&mut tx, user_id, quote_id)
            .await?
            .ok_or_else(quote_not_found)?;
        ensure_convertible(&source)?;

        let lines: Vec<PricedLine> = fetch_quote_items(&mut tx, user_id, source.id)
            .await?
            .iter()
            .map(PricedLine::from)
            .collect();
        let row = NewInvoiceRow::draft(
            source.client_id,
            source.totals(),
            today,
            days_after(today, defaults.payment_term_days),
            source.description.as_deref(),
            source.notes.as_deref(),
        );
        let invoice = insert_invoice(&mut tx, user_id, &row).await?;
        let items = replace_invoice_items(&mut tx, user_id, invoice.id, &lines).await?;

        let quote = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET status = 'accepted',
                accepted_at = COALESCE(accepted_at, NOW()),
                converted_to_invoice_id = $3,
                updated_at = NOW()
            WHERE user_id = $1 AND id = $2 AND converted_to_invoice_id IS NULL
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(source.id)
        .bind(invoice.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("mark quote converted", e))?;

        commit(tx).await?;
        Ok((quote, InvoiceWithItems { invoice, items }))
    }

    /// Copy an invoice into a new draft quote. Repeatable; no link is kept.
    #[instrument(skip(self, defaults), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn convert_invoice_to_quote(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        defaults: &BillingDefaults,
    ) -> Result<QuoteWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["convert_invoice_to_quote"])
            .start_timer();

        let quote = retry_on_number_conflict(DocumentKind::Quote, || {
            self.convert_invoice_once(user_id, invoice_id, defaults)
        })
        .await?;

        timer.observe_duration();
        QUOTES_TOTAL.with_label_values(&["invoice"]).inc();

        info!(
            invoice_id = %invoice_id,
            quote_id = %quote.quote.id,
            quote_number = %quote.quote.quote_number,
            "Invoice converted to quote"
        );

        Ok(quote)
    }

    async fn convert_invoice_once(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        defaults: &BillingDefaults,
    ) -> Result<QuoteWithItems, AppError> {
        let today = Utc::now().date_naive();
        let mut tx = begin(&self.pool).await?;

        let source = lock_invoice(&mut tx, user_id, invoice_id)
            .await?
            .ok_or_else(invoice_not_found)?;
        ensure_quotable(&source)?;

        let lines: Vec<PricedLine> = fetch_invoice_items(&mut tx, user_id, source.id)
            .await?
            .iter()
            .map(PricedLine::from)
            .collect();
        let row = NewQuoteRow {
            client_id: source.client_id,
            totals: source.totals(),
            issue_date: today,
            valid_until: days_after(today, defaults.quote_validity_days),
            description: source.description.as_deref(),
            notes: source.notes.as_deref(),
        };
        let quote = insert_quote(&mut tx, user_id, &row).await?;
        let items = replace_quote_items(&mut tx, user_id, quote.id, &lines).await?;

        commit(tx).await?;
        Ok(QuoteWithItems { quote, items })
    }
}
