//! Document settings handlers.

use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use service_core::error::AppError;

use super::{record_error, validate};
use crate::dtos::{SettingsResponse, UpdateSettingsRequest};
use crate::middleware::CurrentUser;
use crate::AppState;

/// GET /settings
pub async fn get_settings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SettingsResponse>, AppError> {
    let settings = state
        .db
        .get_settings(user.id())
        .await
        .inspect_err(record_error)?;

    Ok(Json(settings.into()))
}

/// PUT /settings
pub async fn update_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(req), _): WithRejection<Json<UpdateSettingsRequest>, AppError>,
) -> Result<Json<SettingsResponse>, AppError> {
    validate(&req)?;

    let settings = state
        .db
        .update_settings(user.id(), &req.into_model())
        .await
        .inspect_err(record_error)?;

    Ok(Json(settings.into()))
}
