//! Post handlers: create, list, get, lane promotions, payment, delete, and
//! duplicate checks.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{
    CreatePostRequest, DeletePostParams, DuplicateCheckRequest, DuplicateCheckResponse,
    ListPostsParams, PaginationParams, PostDto, PostListResponse, SchedulePostRequest,
};
use crate::app_state::AppState;
use crate::domain::{NewPost, Payment, PostFilter, PostId};
use crate::error::{ErrorResponse, SchedulerError};

/// `POST /posts`: Submit a new post.
///
/// # Errors
///
/// Returns [`SchedulerError`] on an invalid lane or a missing payment.
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    tag = "Posts",
    summary = "Submit a post",
    description = "Creates a post as a draft, at the tail of the queue, or in the priority lane. The priority lane needs `scheduled_at` and a confirmed payment when the priority price is non-zero.",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = PostDto),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 402, description = "Priority placement not paid", body = ErrorResponse),
    )
)]
pub async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, SchedulerError> {
    let target = req.create_target()?;
    let new = NewPost {
        owner_id: req.owner_id,
        content: req.content,
        payment: req.payment,
    };
    let view = state
        .post_service
        .create_post(new, target, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(PostDto::from(view))))
}

/// `GET /posts`: List posts with optional status and owner filters.
///
/// # Errors
///
/// Returns [`SchedulerError`] on store failures.
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    tag = "Posts",
    summary = "List posts",
    description = "Returns a paginated list of posts. Queued posts come in queue order, scheduled posts by time, everything else newest first.",
    params(ListPostsParams),
    responses(
        (status = 200, description = "Paginated post list", body = PostListResponse),
    )
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListPostsParams>,
) -> Result<impl IntoResponse, SchedulerError> {
    let filter = PostFilter {
        status: params.status,
        owner_id: params.owner_id,
    };
    let posts = state.post_service.list_posts(filter).await?;
    let (page, pagination) =
        PaginationParams::from_parts(params.page, params.per_page).paginate(posts);

    Ok(Json(PostListResponse {
        data: page.into_iter().map(PostDto::from).collect(),
        pagination,
    }))
}

/// `GET /posts/{id}`: Get one post with its publish estimate.
///
/// # Errors
///
/// Returns [`SchedulerError::PostNotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    tag = "Posts",
    summary = "Get post",
    params(("id" = i64, Path, description = "Post identifier")),
    responses(
        (status = 200, description = "Post", body = PostDto),
        (status = 404, description = "Post not found", body = ErrorResponse),
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> Result<impl IntoResponse, SchedulerError> {
    let view = state.post_service.get_post(id, Utc::now()).await?;
    Ok(Json(PostDto::from(view)))
}

/// `POST /posts/{id}/queue`: Move a draft to the tail of the queue.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidTransition`] unless the post is a draft.
#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/queue",
    tag = "Posts",
    summary = "Queue a draft",
    params(("id" = i64, Path, description = "Post identifier")),
    responses(
        (status = 200, description = "Post queued", body = PostDto),
        (status = 404, description = "Post not found", body = ErrorResponse),
        (status = 409, description = "Post is not a draft", body = ErrorResponse),
    )
)]
pub async fn queue_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> Result<impl IntoResponse, SchedulerError> {
    let view = state.post_service.promote_to_queue(id, Utc::now()).await?;
    Ok(Json(PostDto::from(view)))
}

/// `POST /posts/{id}/schedule`: Move a draft to the priority lane.
///
/// # Errors
///
/// Returns [`SchedulerError::PaymentRequired`] when the priority placement
/// is unpaid.
#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/schedule",
    tag = "Posts",
    summary = "Schedule a draft",
    params(("id" = i64, Path, description = "Post identifier")),
    request_body = SchedulePostRequest,
    responses(
        (status = 200, description = "Post scheduled", body = PostDto),
        (status = 402, description = "Priority placement not paid", body = ErrorResponse),
        (status = 404, description = "Post not found", body = ErrorResponse),
        (status = 409, description = "Post is not a draft", body = ErrorResponse),
    )
)]
pub async fn schedule_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Json(req): Json<SchedulePostRequest>,
) -> Result<impl IntoResponse, SchedulerError> {
    let post = state
        .post_service
        .promote_to_scheduled(id, req.scheduled_at, Utc::now())
        .await?;
    Ok(Json(PostDto::from(post)))
}

/// `PUT /posts/{id}/payment`: Record the payment outcome.
///
/// # Errors
///
/// Returns [`SchedulerError::PostNotFound`] for unknown ids.
#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}/payment",
    tag = "Posts",
    summary = "Update payment",
    params(("id" = i64, Path, description = "Post identifier")),
    request_body = Payment,
    responses(
        (status = 200, description = "Payment recorded", body = PostDto),
        (status = 404, description = "Post not found", body = ErrorResponse),
    )
)]
pub async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Json(payment): Json<Payment>,
) -> Result<impl IntoResponse, SchedulerError> {
    let post = state
        .post_service
        .set_payment(id, payment, Utc::now())
        .await?;
    Ok(Json(PostDto::from(post)))
}

/// `DELETE /posts/{id}`: Remove a post and compact the queue.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidTransition`] for published posts.
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    tag = "Posts",
    summary = "Delete post",
    description = "Deletes a draft, queued, or scheduled post. Queue positions behind a deleted queued post shift down by one. The deletion is recorded in the admin log.",
    params(
        ("id" = i64, Path, description = "Post identifier"),
        DeletePostParams,
    ),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 404, description = "Post not found", body = ErrorResponse),
        (status = 409, description = "Post already published", body = ErrorResponse),
    )
)]
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Query(params): Query<DeletePostParams>,
) -> Result<impl IntoResponse, SchedulerError> {
    state
        .post_service
        .delete_post(id, params.admin_id, Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /posts/duplicates`: Score content against recent posts.
///
/// # Errors
///
/// Returns [`SchedulerError`] on store failures.
#[utoipa::path(
    post,
    path = "/api/v1/posts/duplicates",
    tag = "Posts",
    summary = "Check for duplicates",
    description = "Compares the content with queued, scheduled, and recently published posts.",
    request_body = DuplicateCheckRequest,
    responses(
        (status = 200, description = "Duplicate verdict", body = DuplicateCheckResponse),
    )
)]
pub async fn check_duplicate(
    State(state): State<AppState>,
    Json(req): Json<DuplicateCheckRequest>,
) -> Result<impl IntoResponse, SchedulerError> {
    let check = state
        .post_service
        .check_duplicate(&req.content, Utc::now())
        .await?;
    Ok(Json(DuplicateCheckResponse::from(check)))
}

/// Post routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post).get(list_posts))
        .route("/posts/duplicates", post(check_duplicate))
        .route("/posts/{id}", get(get_post).delete(delete_post))
        .route("/posts/{id}/queue", post(queue_post))
        .route("/posts/{id}/schedule", post(schedule_post))
        .route("/posts/{id}/payment", put(update_payment))
}
