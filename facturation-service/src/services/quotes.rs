//! Quotes (devis): CRUD and duplication.

use crate::config::BillingDefaults;
use crate::domain::conversion::{
    accepted_at_after, ensure_quote_deletable, ensure_quote_editable, ensure_valid_until,
};
use crate::domain::lifecycle::days_after;
use crate::domain::numbering::DocumentKind;
use crate::domain::totals::{document_totals, price_lines, DocumentTotals, PricedLine};
use crate::models::{CreateQuote, ListQuotesFilter, Quote, QuoteWithItems, UpdateQuote};
use crate::services::database::{
    begin, commit, db_error, ensure_client, fetch_quote_items, insert_error, lock_quote,
    quote_not_found, replace_quote_items, Database,
};
use crate::services::metrics::{DB_QUERY_DURATION, QUOTES_TOTAL};
use crate::services::numbering::{allocate_number, retry_on_number_conflict};
use chrono::{Datelike, NaiveDate, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

pub(crate) struct NewQuoteRow<'a> {
    pub client_id: Uuid,
    pub totals: DocumentTotals,
    pub issue_date: NaiveDate,
    pub valid_until: NaiveDate,
    pub description: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Insert a draft quote with a fresh `DEV` number.
pub(crate) async fn insert_quote(
    conn: &mut PgConnection,
    user_id: Uuid,
    row: &NewQuoteRow<'_>,
) -> Result<Quote, AppError> {
    let number = allocate_number(conn, user_id, DocumentKind::Quote, row.issue_date.year()).await?;

    sqlx::query_as::<_, Quote>(
        r#"
        INSERT INTO quotes (
            id, user_id, client_id, quote_number, number_year, number_seq,
            subtotal, vat_rate, vat_amount, total, status, issue_date, valid_until,
            description, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'draft', $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(row.client_id)
    .bind(number.to_string())
    .bind(number.year)
    .bind(number.seq)
    .bind(row.totals.subtotal)
    .bind(row.totals.vat_rate)
    .bind(row.totals.vat_amount)
    .bind(row.totals.total)
    .bind(row.issue_date)
    .bind(row.valid_until)
    .bind(row.description)
    .bind(row.notes)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| insert_error("insert quote", e))
}

impl Database {
    #[instrument(skip(self, filter), fields(user_id = %user_id))]
    pub async fn list_quotes(
        &self,
        user_id: Uuid,
        filter: &ListQuotesFilter,
    ) -> Result<Vec<Quote>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_quotes"])
            .start_timer();

        let quotes = sqlx::query_as::<_, Quote>(
            r#"
            SELECT * FROM quotes
            WHERE user_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR client_id = $3)
            ORDER BY issue_date DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list quotes", e))?;

        timer.observe_duration();

        Ok(quotes)
    }

    #[instrument(skip(self), fields(user_id = %user_id, quote_id = %quote_id))]
    pub async fn get_quote(
        &self,
        user_id: Uuid,
        quote_id: Uuid,
    ) -> Result<Option<QuoteWithItems>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_quote"])
            .start_timer();

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| db_error("acquire connection", e))?;

        let quote = sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(quote_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| db_error("get quote", e))?;

        let result = match quote {
            Some(quote) => {
                let items = fetch_quote_items(&mut conn, user_id, quote.id).await?;
                Some(QuoteWithItems { quote, items })
            }
            None => None,
        };

        timer.observe_duration();

        Ok(result)
    }

    #[instrument(skip(self, input, defaults), fields(user_id = %user_id, client_id = %input.client_id))]
    pub async fn create_quote(
        &self,
        user_id: Uuid,
        input: &CreateQuote,
        defaults: &BillingDefaults,
    ) -> Result<QuoteWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_quote"])
            .start_timer();

        let lines = price_lines(input.lines.clone())?;
        let totals = document_totals(&lines, input.vat_rate.unwrap_or(defaults.vat_rate))?;
        let today = Utc::now().date_naive();
        let valid_until = input
            .valid_until
            .unwrap_or_else(|| days_after(today, defaults.quote_validity_days));
        ensure_valid_until(today, valid_until)?;

        let row = NewQuoteRow {
            client_id: input.client_id,
            totals,
            issue_date: today,
            valid_until,
            description: input.description.as_deref(),
            notes: input.notes.as_deref(),
        };

        let created = retry_on_number_conflict(DocumentKind::Quote, || {
            self.create_quote_once(user_id, &row, &lines)
        })
        .await?;

        timer.observe_duration();
        QUOTES_TOTAL.with_label_values(&["new"]).inc();

        info!(
            quote_id = %created.quote.id,
            quote_number = %created.quote.quote_number,
            total = %created.quote.total,
            "Quote created"
        );

        Ok(created)
    }

    async fn create_quote_once(
        &self,
        user_id: Uuid,
        row: &NewQuoteRow<'_>,
        lines: &[PricedLine],
    ) -> Result<QuoteWithItems, AppError> {
        let mut tx = begin(&self.pool).await?;
        ensure_client(&mut tx, user_id, row.client_id).await?;
        let quote = insert_quote(&mut tx, user_id, row).await?;
        let items = replace_quote_items(&mut tx, user_id, quote.id, lines).await?;
        commit(tx).await?;
        Ok(QuoteWithItems { quote, items })
    }

    #[instrument(skip(self, input), fields(user_id = %user_id, quote_id = %quote_id))]
    pub async fn update_quote(
        &self,
        user_id: Uuid,
        quote_id: Uuid,
        input: &UpdateQuote,
    ) -> Result<QuoteWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_quote"])
            .start_timer();

        let now = Utc::now();
        let mut tx = begin(&self.pool).await?;

        let current = lock_quote(&mut tx, user_id, quote_id)
            .await?
            .ok_or_else(quote_not_found)?;
        ensure_quote_editable(&current)?;

        if let Some(client_id) = input.client_id {
            ensure_client(&mut tx, user_id, client_id).await?;
        }

        let valid_until = input.valid_until.unwrap_or(current.valid_until);
        ensure_valid_until(current.issue_date, valid_until)?;

        let vat_rate = input.vat_rate.unwrap_or(current.vat_rate);
        let (items, totals) = match &input.lines {
            Some(lines) => {
                let priced = price_lines(lines.clone())?;
                let totals = document_totals(&priced, vat_rate)?;
                let items = replace_quote_items(&mut tx, user_id, current.id, &priced).await?;
                (items, totals)
            }
            None => {
                let items = fetch_quote_items(&mut tx, user_id, current.id).await?;
                let priced: Vec<PricedLine> = items.iter().map(PricedLine::from).collect();
                let totals = document_totals(&priced, vat_rate)?;
                (items, totals)
            }
        };

        let status = input.status.unwrap_or_else(|| current.status());
        let accepted_at = match input.status {
            Some(status) => accepted_at_after(status, current.accepted_at, now),
            None => current.accepted_at,
        };

        let quote = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET client_id = $3,
                subtotal = $4,
                vat_rate = $5,
                vat_amount = $6,
                total = $7,
                valid_until = $8,
                description = COALESCE($9, description),
                notes = COALESCE($10, notes),
                status = $11,
                accepted_at = $12,
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
        .bind(valid_until)
        .bind(input.description.as_deref())
        .bind(input.notes.as_deref())
        .bind(status.as_str())
        .bind(accepted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("update quote", e))?;

        commit(tx).await?;
        timer.observe_duration();

        info!(quote_id = %quote.id, status = %quote.status, total = %quote.total, "Quote updated");

        Ok(QuoteWithItems { quote, items })
    }

    #[instrument(skip(self), fields(user_id = %user_id, quote_id = %quote_id))]
    pub async fn delete_quote(&self, user_id: Uuid, quote_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_quote"])
            .start_timer();

        let mut tx = begin(&self.pool).await?;
        let quote = lock_quote(&mut tx, user_id, quote_id)
            .await?
            .ok_or_else(quote_not_found)?;
        ensure_quote_deletable(&quote)?;

        sqlx::query("DELETE FROM quotes WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(quote.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete quote", e))?;

        commit(tx).await?;
        timer.observe_duration();

        info!(quote_id = %quote.id, quote_number = %quote.quote_number, "Quote deleted");

        Ok(())
    }

    /// Copy a quote under a new number, as a fresh draft.
    #[instrument(skip(self, defaults), fields(user_id = %user_id, quote_id = %quote_id))]
    pub async fn duplicate_quote(
        &self,
        user_id: Uuid,
        quote_id: Uuid,
        defaults: &BillingDefaults,
    ) -> Result<QuoteWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["duplicate_quote"])
            .start_timer();

        let source = self
            .get_quote(user_id, quote_id)
            .await?
            .ok_or_else(quote_not_found)?;

        let today = Utc::now().date_naive();
        let lines: Vec<PricedLine> = source.items.iter().map(PricedLine::from).collect();
        let row = NewQuoteRow {
            client_id: source.quote.client_id,
            totals: source.quote.totals(),
            issue_date: today,
            valid_until: days_after(today, defaults.quote_validity_days),
            description: source.quote.description.as_deref(),
            notes: source.quote.notes.as_deref(),
        };

        let copy = retry_on_number_conflict(DocumentKind::Quote, || {
            self.create_quote_once(user_id, &row, &lines)
        })
        .await?;

        timer.observe_duration();
        QUOTES_TOTAL.with_label_values(&["duplicate"]).inc();

        info!(
            quote_id = %copy.quote.id,
            quote_number = %copy.quote.quote_number,
            source_quote_id = %source.quote.id,
            "Quote duplicated"
        );

        Ok(copy)
    }
}
