//! Client handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use service_core::error::AppError;
use uuid::Uuid;

use super::{record_error, validate};
use crate::dtos::{ClientResponse, CreateClientRequest, DeletedResponse, UpdateClientRequest};
use crate::middleware::CurrentUser;
use crate::services::clients::client_not_found;
use crate::AppState;

/// GET /clients
pub async fn list_clients(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ClientResponse>>, AppError> {
    let clients = state
        .db
        .list_clients(user.id())
        .await
        .inspect_err(record_error)?;

    Ok(Json(clients.into_iter().map(ClientResponse::from).collect()))
}

/// GET /clients/:id
pub async fn get_client(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<ClientResponse>, AppError> {
    let client = state
        .db
        .get_client(user.id(), id)
        .await
        .and_then(|found| found.ok_or_else(client_not_found))
        .inspect_err(record_error)?;

    Ok(Json(client.into()))
}

/// POST /clients
pub async fn create_client(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(req), _): WithRejection<Json<CreateClientRequest>, AppError>,
) -> Result<(StatusCode, Json<ClientResponse>), AppError> {
    validate(&req)?;

    let client = state
        .db
        .create_client(user.id(), &req.into_model())
        .await
        .inspect_err(record_error)?;

    Ok((StatusCode::CREATED, Json(client.into())))
}

/// PUT /clients/:id
pub async fn update_client(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateClientRequest>, AppError>,
) -> Result<Json<ClientResponse>, AppError> {
    validate(&req)?;

    let client = state
        .db
        .update_client(user.id(), id, &req.into_model())
        .await
        .inspect_err(record_error)?;

    Ok(Json(client.into()))
}

/// DELETE /clients/:id
pub async fn delete_client(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<DeletedResponse>, AppError> {
    state
        .db
        .delete_client(user.id(), id)
        .await
        .inspect_err(record_error)?;

    Ok(Json(DeletedResponse::new(id)))
}
