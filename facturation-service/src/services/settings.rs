//! Per-user document settings.

use crate::models::{DocumentSettings, UpdateDocumentSettings};
use crate::services::database::{begin, commit, db_error, Database};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

async fn ensure_settings_row(conn: &mut PgConnection, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query("INSERT INTO document_settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_error("create document settings", e))?;
    Ok(())
}

impl Database {
    /// Settings of the caller, created with defaults on first read.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_settings(&self, user_id: Uuid) -> Result<DocumentSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_settings"])
            .start_timer();

        let mut tx = begin(&self.pool).await?;
        ensure_settings_row(&mut tx, user_id).await?;
        let settings = sqlx::query_as::<_, DocumentSettings>(
            "SELECT * FROM document_settings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("get document settings", e))?;
        commit(tx).await?;

        timer.observe_duration();

        Ok(settings)
    }

    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn update_settings(
        &self,
        user_id: Uuid,
        input: &UpdateDocumentSettings,
    ) -> Result<DocumentSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_settings"])
            .start_timer();

        let mut tx = begin(&self.pool).await?;
        ensure_settings_row(&mut tx, user_id).await?;

        let settings = sqlx::query_as::<_, DocumentSettings>(
            r#"
            UPDATE document_settings
            SET company_name = COALESCE($2, company_name),
                legal_form = COALESCE($3, legal_form),
                siret = COALESCE($4, siret),
                vat_number = COALESCE($5, vat_number),
                address = COALESCE($6, address),
                postal_code = COALESCE($7, postal_code),
                city = COALESCE($8, city),
                country = COALESCE($9, country),
                email = COALESCE($10, email),
                phone = COALESCE($11, phone),
                iban = COALESCE($12, iban),
                bic = COALESCE($13, bic),
                legal_mentions = COALESCE($14, legal_mentions),
                payment_terms = COALESCE($15, payment_terms),
                late_penalty = COALESCE($16, late_penalty),
                footer = COALESCE($17, footer),
                theme = COALESCE($18, theme),
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&input.company_name)
        .bind(&input.legal_form)
        .bind(&input.siret)
        .bind(&input.vat_number)
        .bind(&input.address)
        .bind(&input.postal_code)
        .bind(&input.city)
        .bind(&input.country)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.iban)
        .bind(&input.bic)
        .bind(&input.legal_mentions)
        .bind(&input.payment_terms)
        .bind(&input.late_penalty)
        .bind(&input.footer)
        .bind(&input.theme)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("update document settings", e))?;

        commit(tx).await?;
        timer.observe_duration();

        info!("Document settings updated");

        Ok(settings)
    }
}
