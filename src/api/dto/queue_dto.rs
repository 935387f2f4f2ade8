//! Queue view DTOs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{EstimateDto, PostDto};
use crate::domain::PostId;
use crate::service::QueueCalendar;
use crate::service::post_service::DEFAULT_CALENDAR_LIMIT;

/// The queue in publication order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueResponse {
    /// Queued posts with estimates.
    pub data: Vec<PostDto>,
    /// Queue length.
    pub total: usize,
}

/// Query parameters for `GET /api/v1/queue/calendar`.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
pub struct CalendarParams {
    /// Number of entries (1..=100). Defaults to 20.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_CALENDAR_LIMIT
}

/// One calendar line.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CalendarEntryDto {
    /// Queued post.
    pub post_id: PostId,
    /// Queue position.
    pub position: u32,
    /// Product name.
    pub product_name: String,
    /// Estimated publication.
    pub estimate: Option<EstimateDto>,
}

/// Upcoming queue publications.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CalendarResponse {
    /// First entries of the queue.
    pub entries: Vec<CalendarEntryDto>,
    /// Total queue length.
    pub queue_len: u32,
    /// Estimated date of the last queued post.
    pub last_publish_date: Option<NaiveDate>,
}

impl From<QueueCalendar> for CalendarResponse {
    fn from(c: QueueCalendar) -> Self {
        Self {
            entries: c
                .entries
                .into_iter()
                .map(|e| CalendarEntryDto {
                    post_id: e.post_id,
                    position: e.position,
                    product_name: e.product_name,
                    estimate: e.estimate.map(EstimateDto::from),
                })
                .collect(),
            queue_len: c.queue_len,
            last_publish_date: c.last_publish_date,
        }
    }
}

/// Result of a renumbering pass.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RenumberResponse {
    /// Queue length after compaction.
    pub queue_len: usize,
}
