//! Admin handlers: audit log, statistics, and manual dispatch.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{AdminLogResponse, LimitParams, StatsResponse, TickResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, SchedulerError};

/// `GET /admin/logs`: Most recent audit entries.
///
/// # Errors
///
/// Returns [`SchedulerError`] on store failures.
#[utoipa::path(
    get,
    path = "/api/v1/admin/logs",
    tag = "Admin",
    summary = "Admin log",
    params(LimitParams),
    responses(
        (status = 200, description = "Entries, newest first", body = AdminLogResponse),
    )
)]
pub async fn admin_logs(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, SchedulerError> {
    let data = state.post_service.admin_logs(params.clamped()).await?;
    Ok(Json(AdminLogResponse { data }))
}

/// `GET /stats`: Status counts and publication throughput.
///
/// # Errors
///
/// Returns [`SchedulerError`] on store failures.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "Admin",
    summary = "Scheduler statistics",
    responses(
        (status = 200, description = "Statistics", body = StatsResponse),
    )
)]
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, SchedulerError> {
    let stats = state.post_service.stats(Utc::now()).await?;
    Ok(Json(StatsResponse::from(stats)))
}

/// `POST /dispatch/tick`: Run one dispatch tick now.
///
/// The tick shares the dispatcher's slot ledger, so a slot the background
/// loop already served this minute is not served twice.
///
/// # Errors
///
/// Returns [`SchedulerError`] on store failures.
#[utoipa::path(
    post,
    path = "/api/v1/dispatch/tick",
    tag = "Admin",
    summary = "Trigger a dispatch tick",
    responses(
        (status = 200, description = "Tick report", body = TickResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn trigger_tick(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, SchedulerError> {
    let report = state.dispatcher.tick(Utc::now()).await?;
    Ok(Json(TickResponse::from(report)))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/logs", get(admin_logs))
        .route("/stats", get(stats))
        .route("/dispatch/tick", post(trigger_tick))
}
