//! Admin, statistics, and dispatch DTOs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Lane, PostId};
use crate::persistence::{AdminLogEntry, StatusCounts};
use crate::service::{SchedulerStats, TickReport};

/// Audit entries, newest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminLogResponse {
    /// Entries.
    pub data: Vec<AdminLogEntry>,
}

/// `GET /api/v1/stats` response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Posts per status.
    pub counts: StatusCounts,
    /// Publications in the last 24 hours.
    pub published_last_24h: u64,
    /// Publications in the last 7 days.
    pub published_last_7d: u64,
    /// Estimated date the current queue drains.
    pub queue_drains_on: Option<NaiveDate>,
    /// Next priority publication.
    pub next_scheduled: Option<DateTime<Utc>>,
}

impl From<SchedulerStats> for StatsResponse {
    fn from(s: SchedulerStats) -> Self {
        Self {
            counts: s.counts,
            published_last_24h: s.published_last_24h,
            published_last_7d: s.published_last_7d,
            queue_drains_on: s.queue_drains_on,
            next_scheduled: s.next_scheduled,
        }
    }
}

/// One publication of a tick.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TickPublishedDto {
    /// Published post.
    pub post_id: PostId,
    /// Lane it left from.
    pub lane: Lane,
    /// Channel message id.
    pub message_id: i64,
}

/// One failed delivery of a tick.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TickFailureDto {
    /// Post that failed.
    pub post_id: PostId,
    /// Lane it was in.
    pub lane: Lane,
    /// Failure description.
    pub reason: String,
}

/// A delivered post whose publication is not stored yet. It is not sent
/// again; the next tick retries the write.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TickUnrecordedDto {
    /// Delivered post.
    pub post_id: PostId,
    /// Lane it left from.
    pub lane: Lane,
    /// Channel message id.
    pub message_id: i64,
    /// Store error.
    pub reason: String,
}

/// `POST /api/v1/dispatch/tick` response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TickResponse {
    /// Tick correlation id.
    pub tick_id: Uuid,
    /// Clock value the tick ran at.
    pub now: DateTime<Utc>,
    /// `channel_not_configured` or `sender_not_configured` when the tick
    /// was skipped.
    pub skipped: Option<String>,
    /// Queue slot served, `HH:MM`.
    pub slot: Option<String>,
    /// Publications.
    pub published: Vec<TickPublishedDto>,
    /// Failures.
    pub failures: Vec<TickFailureDto>,
    /// Delivered posts waiting to be recorded.
    pub unrecorded: Vec<TickUnrecordedDto>,
}

impl From<TickReport> for TickResponse {
    fn from(r: TickReport) -> Self {
        Self {
            tick_id: r.tick_id,
            now: r.now,
            skipped: r.skipped.map(|s| s.as_str().to_string()),
            slot: r.slot.map(|s| s.to_string()),
            published: r
                .published
                .into_iter()
                .map(|p| TickPublishedDto {
                    post_id: p.post_id,
                    lane: p.lane,
                    message_id: p.message_id,
                })
                .collect(),
            failures: r
                .failures
                .into_iter()
                .map(|f| TickFailureDto {
                    post_id: f.post_id,
                    lane: f.lane,
                    reason: f.reason,
                })
                .collect(),
            unrecorded: r
                .unrecorded
                .into_iter()
                .map(|u| TickUnrecordedDto {
                    post_id: u.post_id,
                    lane: u.lane,
                    message_id: u.message_id,
                    reason: u.reason,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{TickSkip, UnrecordedItem};

    #[test]
    fn tick_response_names_skip_reason_and_unrecorded_posts() {
        let report = TickReport {
            tick_id: Uuid::new_v4(),
            now: Utc::now(),
            skipped: Some(TickSkip::SenderNotConfigured),
            slot: None,
            published: Vec::new(),
            failures: Vec::new(),
            unrecorded: vec![UnrecordedItem {
                post_id: PostId::new(7),
                lane: Lane::Queue,
                message_id: 42,
                reason: "store down".to_string(),
            }],
        };
        let dto = TickResponse::from(report);
        assert_eq!(dto.skipped.as_deref(), Some("sender_not_configured"));
        assert_eq!(dto.unrecorded.len(), 1);
        assert_eq!(dto.unrecorded.first().map(|u| u.message_id), Some(42));
    }
}
