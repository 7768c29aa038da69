//! Payment handlers and treasury statistics.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;

use super::record_error;
use crate::dtos::{
    CreatePaymentRequest, DeletedResponse, InvoicePaymentsResponse, PaymentResponse,
    StatsResponse,
};
use crate::middleware::CurrentUser;
use crate::AppState;

/// GET /payments
pub async fn list_payments(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let payments = state
        .db
        .list_payments(user.id())
        .await
        .inspect_err(record_error)?;

    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

/// POST /payments
pub async fn create_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(req), _): WithRejection<Json<CreatePaymentRequest>, AppError>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let payment = state
        .db
        .record_payment(user.id(), &req.into_model())
        .await
        .inspect_err(record_error)?;

    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// DELETE /payments/:id
pub async fn delete_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<DeletedResponse>, AppError> {
    state
        .db
        .delete_payment(user.id(), id)
        .await
        .inspect_err(record_error)?;

    Ok(Json(DeletedResponse::new(id)))
}

/// GET /payments/invoice/:invoice_id
pub async fn invoice_payments(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(invoice_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<InvoicePaymentsResponse>, AppError> {
    let (payments, summary) = state
        .db
        .invoice_payments(user.id(), invoice_id)
        .await
        .inspect_err(record_error)?;

    Ok(Json(InvoicePaymentsResponse {
        payments: payments.into_iter().map(PaymentResponse::from).collect(),
        summary,
    }))
}

/// GET /payments/stats
pub async fn treasury_stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = state
        .db
        .treasury_stats(user.id(), Utc::now().date_naive())
        .await
        .inspect_err(record_error)?;

    Ok(Json(stats.into()))
}
