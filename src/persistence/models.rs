//! Database row models for posts and the admin log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    ChannelRef, Lane, Payment, Post, PostContent, PostId, PostState, PostStatus,
};
use crate::error::SchedulerError;

/// A stored row from the `admin_logs` table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminLogEntry {
    /// Auto-increment row ID.
    pub id: i64,
    /// Admin who performed the action.
    pub admin_id: i64,
    /// Action discriminator (e.g. `"delete_post"`).
    pub action: String,
    /// JSONB payload with action-specific data.
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An admin log entry about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAdminLog {
    /// Admin who performed the action.
    pub admin_id: i64,
    /// Action discriminator.
    pub action: String,
    /// Action-specific data.
    pub details: serde_json::Value,
}

/// Raw `posts` row. Lane-specific columns are nullable; [`PostRow::into_post`]
/// rebuilds the tagged state and rejects inconsistent rows.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    /// Row ID.
    pub id: i64,
    /// Submitting advertiser.
    pub owner_id: i64,
    /// Status string.
    pub status: String,
    /// Queue position, set iff `status = 'queue'`.
    pub queue_position: Option<i32>,
    /// Scheduled time, set iff `status = 'scheduled'`.
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Publication time.
    pub published_at: Option<DateTime<Utc>>,
    /// Lane the post was published from.
    pub published_lane: Option<String>,
    /// Channel message id.
    pub channel_message_id: Option<i64>,
    /// Channel message link.
    pub channel_post_url: Option<String>,
    /// Payment type string.
    pub payment_type: Option<String>,
    /// Payment status string.
    pub payment_status: Option<String>,
    /// Payment amount as a decimal string.
    pub payment_amount: Option<String>,
    /// Content payload.
    pub content: sqlx::types::Json<PostContent>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Column values that encode a [`PostState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateColumns {
    /// Status string.
    pub status: &'static str,
    /// Queue position.
    pub queue_position: Option<i32>,
    /// Scheduled time.
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Publication time.
    pub published_at: Option<DateTime<Utc>>,
    /// Lane string.
    pub published_lane: Option<&'static str>,
    /// Channel message id.
    pub channel_message_id: Option<i64>,
    /// Channel message link.
    pub channel_post_url: Option<String>,
}

impl StateColumns {
    /// Flattens a state into its columns.
    #[must_use]
    pub fn from_state(state: &PostState) -> Self {
        let mut cols = Self {
            status: state.status().as_str(),
            ..Self::default()
        };
        match state {
            PostState::Queued { position } => {
                cols.queue_position = Some(i32::try_from(*position).unwrap_or(i32::MAX));
            }
            PostState::Scheduled { at } => cols.scheduled_time = Some(*at),
            PostState::Published {
                at,
                channel_ref,
                lane,
            } => {
                cols.published_at = Some(*at);
                cols.published_lane = Some(lane.as_str());
                cols.channel_message_id = Some(channel_ref.message_id);
                cols.channel_post_url.clone_from(&channel_ref.url);
            }
            PostState::Draft | PostState::Rejected => {}
        }
        cols
    }
}

impl PostRow {
    /// Rebuilds the domain post.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Internal`] when the lane columns contradict
    /// the status.
    pub fn into_post(self) -> Result<Post, SchedulerError> {
        let id = PostId::new(self.id);
        let corrupt =
            |what: &str| SchedulerError::Internal(format!("post {id} row is inconsistent: {what}"));
        let status: PostStatus = self.status.parse()?;
        let state = match status {
            PostStatus::Draft => PostState::Draft,
            PostStatus::Rejected => PostState::Rejected,
            PostStatus::Queue => {
                let position = self
                    .queue_position
                    .and_then(|p| u32::try_from(p).ok())
                    .filter(|p| *p > 0)
                    .ok_or_else(|| corrupt("queued without a position"))?;
                PostState::Queued { position }
            }
            PostStatus::Scheduled => PostState::Scheduled {
                at: self
                    .scheduled_time
                    .ok_or_else(|| corrupt("scheduled without a time"))?,
            },
            PostStatus::Published => PostState::Published {
                at: self
                    .published_at
                    .ok_or_else(|| corrupt("published without a timestamp"))?,
                channel_ref: ChannelRef {
                    message_id: self
                        .channel_message_id
                        .ok_or_else(|| corrupt("published without a message id"))?,
                    url: self.channel_post_url,
                },
                lane: self
                    .published_lane
                    .as_deref()
                    .unwrap_or("queue")
                    .parse::<Lane>()?,
            },
        };

        let payment = Payment {
            payment_type: self.payment_type.as_deref().map(str::parse).transpose()?,
            status: self.payment_status.as_deref().map(str::parse).transpose()?,
            amount: self.payment_amount,
        };

        Ok(Post {
            id,
            owner_id: self.owner_id,
            state,
            payment,
            content: self.content.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
