//! Clients and their company hierarchy.

use crate::models::{Client, ClientType, CreateClient, UpdateClient};
use crate::services::database::{begin, commit, db_error, Database};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::PgConnection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Client columns plus revenue figures. Revenue counts every issued document
/// (credit notes are negative); the count covers regular invoices only.
const CLIENT_SELECT: &str = r#"
    SELECT c.*,
           COALESCE((SELECT SUM(i.total) FROM invoices i
                     WHERE i.client_id = c.id
                       AND i.status NOT IN ('draft', 'cancelled')), 0)::BIGINT AS total_revenue,
           (SELECT COUNT(*) FROM invoices i
            WHERE i.client_id = c.id
              AND i.invoice_type = 'invoice'
              AND i.status NOT IN ('draft', 'cancelled')) AS invoice_count
    FROM clients c
"#;

pub(crate) fn client_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Client introuvable"))
}

async fn fetch_client(
    conn: &mut PgConnection,
    user_id: Uuid,
    client_id: Uuid,
) -> Result<Option<Client>, AppError> {
    sqlx::query_as::<_, Client>(&format!(
        "{CLIENT_SELECT} WHERE c.user_id = $1 AND c.id = $2"
    ))
    .bind(user_id)
    .bind(client_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| db_error("get client", e))
}

/// A parent must be another company of the same user.
async fn ensure_parent_company(
    conn: &mut PgConnection,
    user_id: Uuid,
    client_id: Option<Uuid>,
    parent_id: Uuid,
) -> Result<(), AppError> {
    if client_id == Some(parent_id) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Un client ne peut pas être sa propre société mère"
        )));
    }

    let parent_type = sqlx::query_scalar::<_, String>(
        "SELECT client_type FROM clients WHERE user_id = $1 AND id = $2",
    )
    .bind(user_id)
    .bind(parent_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| db_error("get parent company", e))?
    .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Société mère introuvable")))?;

    if parent_type != ClientType::Company.as_str() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "La société mère doit être une entreprise"
        )));
    }
    Ok(())
}

impl Database {
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_clients(&self, user_id: Uuid) -> Result<Vec<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_clients"])
            .start_timer();

        let clients = sqlx::query_as::<_, Client>(&format!(
            "{CLIENT_SELECT} WHERE c.user_id = $1 ORDER BY c.name, c.created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list clients", e))?;

        timer.observe_duration();

        Ok(clients)
    }

    #[instrument(skip(self), fields(user_id = %user_id, client_id = %client_id))]
    pub async fn get_client(&self, user_id: Uuid, client_id: Uuid) -> Result<Option<Client>, AppError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| db_error("acquire connection", e))?;
        fetch_client(&mut conn, user_id, client_id).await
    }

    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_client(&self, user_id: Uuid, input: &CreateClient) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let mut tx = begin(&self.pool).await?;
        if let Some(parent_id) = input.parent_company_id {
            ensure_parent_company(&mut tx, user_id, None, parent_id).await?;
        }

        let client_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO clients (
                id, user_id, name, email, phone, address, postal_code, city, country,
                siret, vat_number, client_type, parent_company_id, status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.postal_code)
        .bind(&input.city)
        .bind(&input.country)
        .bind(&input.siret)
        .bind(&input.vat_number)
        .bind(input.client_type.as_str())
        .bind(input.parent_company_id)
        .bind(input.status.as_str())
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("insert client", e))?;

        let client = fetch_client(&mut tx, user_id, client_id)
            .await?
            .ok_or_else(client_not_found)?;
        commit(tx).await?;
        timer.observe_duration();

        info!(client_id = %client.id, client_type = %client.client_type, "Client created");

        Ok(client)
    }

    #[instrument(skip(self, input), fields(user_id = %user_id, client_id = %client_id))]
    pub async fn update_client(
        &self,
        user_id: Uuid,
        client_id: Uuid,
        input: &UpdateClient,
    ) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_client"])
            .start_timer();

        let mut tx = begin(&self.pool).await?;
        if let Some(Some(parent_id)) = input.parent_company_id {
            ensure_parent_company(&mut tx, user_id, Some(client_id), parent_id).await?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE clients
            SET name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address),
                postal_code = COALESCE($7, postal_code),
                city = COALESCE($8, city),
                country = COALESCE($9, country),
                siret = COALESCE($10, siret),
                vat_number = COALESCE($11, vat_number),
                client_type = COALESCE($12, client_type),
                parent_company_id = CASE WHEN $13 THEN $14 ELSE parent_company_id END,
                status = COALESCE($15, status),
                notes = COALESCE($16, notes),
                updated_at = NOW()
            WHERE user_id = $1 AND id = $2
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.postal_code)
        .bind(&input.city)
        .bind(&input.country)
        .bind(&input.siret)
        .bind(&input.vat_number)
        .bind(input.client_type.map(|t| t.as_str()))
        .bind(input.parent_company_id.is_some())
        .bind(input.parent_company_id.flatten())
        .bind(input.status.map(|s| s.as_str()))
        .bind(&input.notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("update client", e))?;

        if updated.rows_affected() == 0 {
            return Err(client_not_found());
        }

        let client = fetch_client(&mut tx, user_id, client_id)
            .await?
            .ok_or_else(client_not_found)?;
        commit(tx).await?;
        timer.observe_duration();

        info!(client_id = %client.id, "Client updated");

        Ok(client)
    }

    /// Delete a client that no invoice or quote references.
    #[instrument(skip(self), fields(user_id = %user_id, client_id = %client_id))]
    pub async fn delete_client(&self, user_id: Uuid, client_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_client"])
            .start_timer();

        let mut tx = begin(&self.pool).await?;

        let referenced = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM invoices WHERE user_id = $1 AND client_id = $2)
                OR EXISTS (SELECT 1 FROM quotes WHERE user_id = $1 AND client_id = $2)
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("check client references", e))?;

        if referenced {
            warn!(client_id = %client_id, "Refusing to delete a client with documents");
            return Err(client_in_use());
        }

        let deleted = sqlx::query("DELETE FROM clients WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    client_in_use()
                }
                _ => db_error("delete client", e),
            })?;

        if deleted.rows_affected() == 0 {
            return Err(client_not_found());
        }

        commit(tx).await?;
        timer.observe_duration();

        info!(client_id = %client_id, "Client deleted");

        Ok(())
    }
}

fn client_in_use() -> AppError {
    AppError::BadRequest(anyhow::anyhow!(
        "Client lié à des factures ou devis : suppression impossible"
    ))
}
