//! Post request/response DTOs.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::dto::PaginationMeta;
use crate::domain::{
    ChannelRef, CreateTarget, DuplicateCheck, Estimate, Lane, Payment, Post, PostContent, PostId,
    PostState, PostStatus,
};
use crate::error::SchedulerError;
use crate::service::PostView;

/// Lane a new post is created into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetDto {
    /// Keep as a draft.
    #[default]
    Draft,
    /// Append to the FIFO queue.
    Queue,
    /// Priority lane; requires `scheduled_at`.
    Scheduled,
}

/// Request body for `POST /api/v1/posts`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    /// Submitting advertiser.
    pub owner_id: i64,
    /// Advertiser content.
    pub content: PostContent,
    /// Payment flags at submission time.
    #[serde(default)]
    pub payment: Payment,
    /// Initial lane (defaults to draft).
    #[serde(default)]
    pub target: TargetDto,
    /// Exact publish time for the scheduled lane.
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl CreatePostRequest {
    /// Resolves the lane.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] when `scheduled_at` is
    /// missing for the scheduled lane or given for another lane.
    pub fn create_target(&self) -> Result<CreateTarget, SchedulerError> {
        match (self.target, self.scheduled_at) {
            (TargetDto::Draft, None) => Ok(CreateTarget::Draft),
            (TargetDto::Queue, None) => Ok(CreateTarget::Queue),
            (TargetDto::Scheduled, Some(at)) => Ok(CreateTarget::Scheduled { at }),
            (TargetDto::Scheduled, None) => Err(SchedulerError::InvalidRequest(
                "scheduled_at is required for the scheduled lane".to_string(),
            )),
            (_, Some(_)) => Err(SchedulerError::InvalidRequest(
                "scheduled_at is only valid for the scheduled lane".to_string(),
            )),
        }
    }
}

/// Advisory publish estimate.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EstimateDto {
    /// Whole days after today.
    pub day_offset: u32,
    /// Slot (`HH:MM`) the post lands in.
    pub slot: String,
    /// Local wall-clock publish moment.
    pub publish_at: NaiveDateTime,
}

impl From<Estimate> for EstimateDto {
    fn from(e: Estimate) -> Self {
        Self {
            day_offset: e.day_offset,
            slot: e.slot.to_string(),
            publish_at: e.at,
        }
    }
}

/// Flat post representation for the admin API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PostDto {
    /// Post identifier.
    pub id: PostId,
    /// Submitting advertiser.
    pub owner_id: i64,
    /// Lifecycle status.
    pub status: PostStatus,
    /// Queue position, for queued posts.
    pub queue_position: Option<u32>,
    /// Target time, for scheduled posts.
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Publication moment, for published posts.
    pub published_at: Option<DateTime<Utc>>,
    /// Lane a published post left from.
    pub lane: Option<Lane>,
    /// Channel message, for published posts.
    pub channel_ref: Option<ChannelRef>,
    /// Payment flags.
    pub payment: Payment,
    /// Advertiser content.
    pub content: PostContent,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Publish estimate, for queued posts.
    pub estimate: Option<EstimateDto>,
}

impl PostDto {
    /// Builds the DTO from a post and an optional estimate.
    #[must_use]
    pub fn new(post: Post, estimate: Option<Estimate>) -> Self {
        let status = post.status();
        let queue_position = post.state.queue_position();
        let scheduled_time = post.state.scheduled_time();
        let (published_at, lane, channel_ref) = match post.state {
            PostState::Published {
                at,
                channel_ref,
                lane,
            } => (Some(at), Some(lane), Some(channel_ref)),
            _ => (None, None, None),
        };
        Self {
            id: post.id,
            owner_id: post.owner_id,
            status,
            queue_position,
            scheduled_time,
            published_at,
            lane,
            channel_ref,
            payment: post.payment,
            content: post.content,
            created_at: post.created_at,
            updated_at: post.updated_at,
            estimate: estimate.map(EstimateDto::from),
        }
    }
}

impl From<Post> for PostDto {
    fn from(post: Post) -> Self {
        Self::new(post, None)
    }
}

impl From<PostView> for PostDto {
    fn from(view: PostView) -> Self {
        Self::new(view.post, view.estimate)
    }
}

/// Query parameters for `GET /api/v1/posts`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListPostsParams {
    /// Only posts in this status.
    pub status: Option<PostStatus>,
    /// Only posts of this advertiser.
    pub owner_id: Option<i64>,
    /// Page number (1-indexed). Defaults to 1.
    pub page: Option<u32>,
    /// Items per page (max 100). Defaults to 20.
    pub per_page: Option<u32>,
}

/// Paginated post list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PostListResponse {
    /// Posts on this page.
    pub data: Vec<PostDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Request body for `POST /api/v1/posts/{id}/schedule`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SchedulePostRequest {
    /// Exact publish time.
    pub scheduled_at: DateTime<Utc>,
}

/// Query parameters for `DELETE /api/v1/posts/{id}`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct DeletePostParams {
    /// Admin performing the deletion.
    pub admin_id: i64,
}

/// Request body for `POST /api/v1/posts/duplicates`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DuplicateCheckRequest {
    /// Candidate content.
    pub content: PostContent,
}

/// Duplicate check verdict.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DuplicateCheckResponse {
    /// `true` when the best score meets the threshold.
    pub is_duplicate: bool,
    /// Closest existing post.
    pub best_match: Option<PostId>,
    /// Similarity of the closest post in percent.
    pub score: f64,
}

impl From<DuplicateCheck> for DuplicateCheckResponse {
    fn from(c: DuplicateCheck) -> Self {
        Self {
            is_duplicate: c.is_duplicate,
            best_match: c.best_match,
            score: c.score,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn request(json: &str) -> CreatePostRequest {
        serde_json::from_str(json).unwrap_or_else(|e| panic!("bad fixture: {e}"))
    }

    #[test]
    fn target_defaults_to_draft() {
        let req = request(r#"{"owner_id": 1, "content": {"product_name": "Lamp"}}"#);
        assert_eq!(req.create_target().ok(), Some(CreateTarget::Draft));
    }

    #[test]
    fn scheduled_target_needs_time() {
        let req = request(r#"{"owner_id": 1, "content": {}, "target": "scheduled"}"#);
        assert!(req.create_target().is_err());

        let req = request(
            r#"{"owner_id": 1, "content": {}, "target": "queue", "scheduled_at": "2026-01-01T10:00:00Z"}"#,
        );
        assert!(req.create_target().is_err());
    }
}
