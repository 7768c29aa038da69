//! Invoice and credit-note handlers.

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
    ConvertToQuoteResponse, CreateInvoiceRequest, DeletedResponse, InvoiceResponse,
    ListInvoicesQuery, MarkOverdueResponse, PaymentStatusRequest, QuoteResponse,
    UpdateInvoiceRequest,
};
use crate::middleware::CurrentUser;
use crate::services::database::invoice_not_found;
use crate::AppState;

/// GET /invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Query(query), _): WithRejection<Query<ListInvoicesQuery>, AppError>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let invoices = state
        .db
        .list_invoices(user.id(), &query.into())
        .await
        .inspect_err(record_error)?;

    Ok(Json(invoices.into_iter().map(InvoiceResponse::from).collect()))
}

/// GET /invoices/:id
pub async fn get_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .db
        .get_invoice(user.id(), id)
        .await
        .and_then(|found| found.ok_or_else(invoice_not_found))
        .inspect_err(record_error)?;

    Ok(Json(invoice.into()))
}

/// POST /invoices
pub async fn create_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(req), _): WithRejection<Json<CreateInvoiceRequest>, AppError>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    validate(&req)?;

    let invoice = state
        .db
        .create_invoice(user.id(), &req.into_model(), &state.defaults)
        .await
        .inspect_err(record_error)?;

    Ok((StatusCode::CREATED, Json(invoice.into())))
}

/// PUT /invoices/:id
pub async fn update_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateInvoiceRequest>, AppError>,
) -> Result<Json<InvoiceResponse>, AppError> {
    validate(&req)?;

    let invoice = state
        .db
        .update_invoice(user.id(), id, &req.into_model())
        .await
        .inspect_err(record_error)?;

    Ok(Json(invoice.into()))
}

/// DELETE /invoices/:id
pub async fn delete_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<DeletedResponse>, AppError> {
    state
        .db
        .delete_invoice(user.id(), id)
        .await
        .inspect_err(record_error)?;

    Ok(Json(DeletedResponse::new(id)))
}

/// POST /invoices/:id/finalize
pub async fn finalize_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .db
        .finalize_invoice(user.id(), id)
        .await
        .inspect_err(record_error)?;

    Ok(Json(invoice.into()))
}

/// POST /invoices/:id/credit-note
pub async fn issue_credit_note(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    let credit_note = state
        .db
        .issue_credit_note(user.id(), id)
        .await
        .inspect_err(record_error)?;

    Ok((StatusCode::CREATED, Json(credit_note.into())))
}

/// PUT /invoices/:id/payment
///
/// Legacy direct status change. Routed through payment records so the
/// status stays derived from them.
pub async fn update_payment_status(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<PaymentStatusRequest>, AppError>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .db
        .apply_payment_status(user.id(), id, req.payment_status, req.paid_amount)
        .await
        .inspect_err(record_error)?;

    Ok(Json(invoice.into()))
}

/// POST /invoices/:id/convert-to-quote
pub async fn convert_to_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<ConvertToQuoteResponse>, AppError> {
    let quote = state
        .db
        .convert_invoice_to_quote(user.id(), id, &state.defaults)
        .await
        .inspect_err(record_error)?;

    Ok(Json(ConvertToQuoteResponse {
        success: true,
        quote: QuoteResponse::from(quote),
    }))
}

/// POST /invoices/mark-overdue
pub async fn mark_overdue(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MarkOverdueResponse>, AppError> {
    let updated = state
        .db
        .mark_overdue(user.id())
        .await
        .inspect_err(record_error)?;

    Ok(Json(MarkOverdueResponse { updated }))
}
