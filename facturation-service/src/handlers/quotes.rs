//! Quote handlers, including conversion to an invoice.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use service_core::error::AppError;
use uuid::Uuid;

use super::{record_error, validate};
use crate::dtos::{
    ConversionResponse, CreateQuoteRequest, DeletedResponse, ListQuotesQuery, QuoteResponse,
    UpdateQuoteRequest,
};
use crate::middleware::CurrentUser;
use crate::services::database::quote_not_found;
use crate::AppState;

/// GET /quotes
pub async fn list_quotes(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Query(query), _): WithRejection<Query<ListQuotesQuery>, AppError>,
) -> Result<Json<Vec<QuoteResponse>>, AppError> {
    let quotes = state
        .db
        .list_quotes(user.id(), &query.into())
        .await
        .inspect_err(record_error)?;

    Ok(Json(quotes.into_iter().map(QuoteResponse::from).collect()))
}

/// GET /quotes/:id
pub async fn get_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<QuoteResponse>, AppError> {
    let quote = state
        .db
        .get_quote(user.id(), id)
        .await
        .and_then(|found| found.ok_or_else(quote_not_found))
        .inspect_err(record_error)?;

    Ok(Json(quote.into()))
}

/// POST /quotes
pub async fn create_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(req), _): WithRejection<Json<CreateQuoteRequest>, AppError>,
) -> Result<(StatusCode, Json<QuoteResponse>), AppError> {
    validate(&req)?;

    let quote = state
        .db
        .create_quote(user.id(), &req.into_model(), &state.defaults)
        .await
        .inspect_err(record_error)?;

    Ok((StatusCode::CREATED, Json(quote.into())))
}

/// PUT /quotes/:id
pub async fn update_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateQuoteRequest>, AppError>,
) -> Result<Json<QuoteResponse>, AppError> {
    validate(&req)?;

    let quote = state
        .db
        .update_quote(user.id(), id, &req.into_model())
        .await
        .inspect_err(record_error)?;

    Ok(Json(quote.into()))
}

/// DELETE /quotes/:id
pub async fn delete_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<DeletedResponse>, AppError> {
    state
        .db
        .delete_quote(user.id(), id)
        .await
        .inspect_err(record_error)?;

    Ok(Json(DeletedResponse::new(id)))
}

/// POST /quotes/:id/convert
pub async fn convert_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<ConversionResponse>, AppError> {
    let (quote, invoice) = state
        .db
        .convert_quote_to_invoice(user.id(), id, &state.defaults)
        .await
        .inspect_err(record_error)?;

    Ok(Json(ConversionResponse {
        quote: quote.into(),
        invoice: invoice.into(),
    }))
}

/// POST /quotes/:id/duplicate
pub async fn duplicate_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<(StatusCode, Json<QuoteResponse>), AppError> {
    let quote = state
        .db
        .duplicate_quote(user.id(), id, &state.defaults)
        .await
        .inspect_err(record_error)?;

    Ok((StatusCode::CREATED, Json(quote.into())))
}
