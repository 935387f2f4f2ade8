//! Queue handlers: ordered listing, publication calendar, and compaction.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{CalendarParams, CalendarResponse, PostDto, QueueResponse, RenumberResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, SchedulerError};

/// `GET /queue`: The queue in publication order with estimates.
///
/// # Errors
///
/// Returns [`SchedulerError`] on store failures.
#[utoipa::path(
    get,
    path = "/api/v1/queue",
    tag = "Queue",
    summary = "List the queue",
    description = "Returns queued posts by position. Each post carries an advisory estimate derived from the current quota and slots.",
    responses(
        (status = 200, description = "Queue", body = QueueResponse),
    )
)]
pub async fn list_queue(State(state): State<AppState>) -> Result<impl IntoResponse, SchedulerError> {
    let views = state.post_service.queue(Utc::now()).await?;
    let total = views.len();
    Ok(Json(QueueResponse {
        data: views.into_iter().map(PostDto::from).collect(),
        total,
    }))
}

/// `GET /queue/calendar`: Upcoming queue publications.
///
/// # Errors
///
/// Returns [`SchedulerError`] on store failures.
#[utoipa::path(
    get,
    path = "/api/v1/queue/calendar",
    tag = "Queue",
    summary = "Publication calendar",
    params(CalendarParams),
    responses(
        (status = 200, description = "Calendar", body = CalendarResponse),
    )
)]
pub async fn calendar(
    State(state): State<AppState>,
    Query(params): Query<CalendarParams>,
) -> Result<impl IntoResponse, SchedulerError> {
    let calendar = state
        .post_service
        .queue_calendar(params.limit.clamp(1, 100), Utc::now())
        .await?;
    Ok(Json(CalendarResponse::from(calendar)))
}

/// `POST /queue/renumber`: Force queue positions back to `1..=N`.
///
/// # Errors
///
/// Returns [`SchedulerError`] on store failures.
#[utoipa::path(
    post,
    path = "/api/v1/queue/renumber",
    tag = "Queue",
    summary = "Renumber the queue",
    description = "Compacts positions preserving order. Idempotent.",
    responses(
        (status = 200, description = "Queue renumbered", body = RenumberResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn renumber(State(state): State<AppState>) -> Result<impl IntoResponse, SchedulerError> {
    let queue_len = state.post_service.renumber_queue(Utc::now()).await?;
    Ok(Json(RenumberResponse { queue_len }))
}

/// Queue routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/queue", get(list_queue))
        .route("/queue/calendar", get(calendar))
        .route("/queue/renumber", post(renumber))
}
