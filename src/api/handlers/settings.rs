//! Settings handlers. Every change is validated before it is stored and
//! lands in the admin log.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::api::dto::{
    EffectiveSettingsDto, SettingChangesResponse, SettingsResponse, UpdateChannelRequest,
    UpdatePricesRequest, UpdateScheduleRequest, UpdateThresholdRequest,
};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, SchedulerError};

/// `GET /settings`: Stored entries and effective values.
///
/// # Errors
///
/// Returns [`SchedulerError`] on store failures.
#[utoipa::path(
    get,
    path = "/api/v1/settings",
    tag = "Settings",
    summary = "Read settings",
    responses(
        (status = 200, description = "Settings", body = SettingsResponse),
    )
)]
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, SchedulerError> {
    let settings = state.post_service.settings();
    let entries = settings.store().all().await?;
    let effective = EffectiveSettingsDto {
        posts_per_day: settings.posts_per_day().await?,
        schedule_times: settings
            .schedule_times()
            .await?
            .iter()
            .map(ToString::to_string)
            .collect(),
        queue_price: settings.queue_price().await?.to_string(),
        priority_price: settings.priority_price().await?.to_string(),
        duplicate_threshold: settings.duplicate_threshold().await?,
        channel_id: settings.channel_id().await?,
    };
    Ok(Json(SettingsResponse { entries, effective }))
}

/// `PUT /settings/schedule`: Change the daily quota and/or slot list.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidRequest`] for an out-of-range quota or
/// a malformed slot list; nothing is stored in that case.
#[utoipa::path(
    put,
    path = "/api/v1/settings/schedule",
    tag = "Settings",
    summary = "Update schedule",
    request_body = UpdateScheduleRequest,
    responses(
        (status = 200, description = "Applied changes", body = SettingChangesResponse),
        (status = 400, description = "Invalid value", body = ErrorResponse),
    )
)]
pub async fn update_schedule(
    State(state): State<AppState>,
    Json(req): Json<UpdateScheduleRequest>,
) -> Result<impl IntoResponse, SchedulerError> {
    let changes = state
        .post_service
        .update_schedule(req.admin_id, req.posts_per_day, req.schedule_times.as_deref())
        .await?;
    Ok(Json(SettingChangesResponse::from(changes)))
}

/// `PUT /settings/prices`: Change placement prices.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidRequest`] for malformed prices.
#[utoipa::path(
    put,
    path = "/api/v1/settings/prices",
    tag = "Settings",
    summary = "Update prices",
    request_body = UpdatePricesRequest,
    responses(
        (status = 200, description = "Applied changes", body = SettingChangesResponse),
        (status = 400, description = "Invalid price", body = ErrorResponse),
    )
)]
pub async fn update_prices(
    State(state): State<AppState>,
    Json(req): Json<UpdatePricesRequest>,
) -> Result<impl IntoResponse, SchedulerError> {
    let changes = state
        .post_service
        .update_prices(
            req.admin_id,
            req.queue_price.as_deref(),
            req.priority_price.as_deref(),
        )
        .await?;
    Ok(Json(SettingChangesResponse::from(changes)))
}

/// `PUT /settings/channel`: Set the broadcast channel.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidRequest`] for a blank channel id.
#[utoipa::path(
    put,
    path = "/api/v1/settings/channel",
    tag = "Settings",
    summary = "Update channel",
    request_body = UpdateChannelRequest,
    responses(
        (status = 200, description = "Applied changes", body = SettingChangesResponse),
        (status = 400, description = "Invalid channel", body = ErrorResponse),
    )
)]
pub async fn update_channel(
    State(state): State<AppState>,
    Json(req): Json<UpdateChannelRequest>,
) -> Result<impl IntoResponse, SchedulerError> {
    let changes = state
        .post_service
        .update_channel(req.admin_id, &req.channel_id, req.username.as_deref())
        .await?;
    Ok(Json(SettingChangesResponse::from(changes)))
}

/// `PUT /settings/duplicate-threshold`: Change the duplicate threshold.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidRequest`] outside `0..=100`.
#[utoipa::path(
    put,
    path = "/api/v1/settings/duplicate-threshold",
    tag = "Settings",
    summary = "Update duplicate threshold",
    request_body = UpdateThresholdRequest,
    responses(
        (status = 200, description = "Applied change", body = SettingChangesResponse),
        (status = 400, description = "Out of range", body = ErrorResponse),
    )
)]
pub async fn update_duplicate_threshold(
    State(state): State<AppState>,
    Json(req): Json<UpdateThresholdRequest>,
) -> Result<impl IntoResponse, SchedulerError> {
    let change = state
        .post_service
        .update_duplicate_threshold(req.admin_id, req.threshold)
        .await?;
    Ok(Json(SettingChangesResponse::from(vec![change])))
}

/// Settings routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/settings", get(get_settings))
        .route("/settings/schedule", put(update_schedule))
        .route("/settings/prices", put(update_prices))
        .route("/settings/channel", put(update_channel))
        .route(
            "/settings/duplicate-threshold",
            put(update_duplicate_threshold),
        )
}
