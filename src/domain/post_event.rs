//! Domain events reflecting post lifecycle changes.
//!
//! Every state change emits a [`PostEvent`] through the [`super::EventBus`].
//! Subscribers (owner notifications, audit tooling) receive them in order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::post_state::{ChannelRef, Lane};
use super::PostId;

/// Domain event emitted after every post mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PostEvent {
    /// A post was stored (any initial lane).
    PostCreated {
        /// Post identifier.
        post_id: PostId,
        /// Submitting advertiser.
        owner_id: i64,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A post entered the FIFO queue.
    PostQueued {
        /// Post identifier.
        post_id: PostId,
        /// Allocated position.
        position: u32,
        /// Timestamp of the move.
        timestamp: DateTime<Utc>,
    },

    /// A post entered the priority lane.
    PostScheduled {
        /// Post identifier.
        post_id: PostId,
        /// Exact publish time.
        scheduled_for: DateTime<Utc>,
        /// Timestamp of the move.
        timestamp: DateTime<Utc>,
    },

    /// A post reached the channel.
    PostPublished {
        /// Post identifier.
        post_id: PostId,
        /// Advertiser to notify.
        owner_id: i64,
        /// Lane it went out from.
        lane: Lane,
        /// Channel-side reference.
        channel_ref: ChannelRef,
        /// Publication timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The channel sender failed; the post keeps its state.
    PublishFailed {
        /// Post identifier.
        post_id: PostId,
        /// Failure description.
        reason: String,
        /// Timestamp of the attempt.
        timestamp: DateTime<Utc>,
    },

    /// An admin removed a post.
    PostDeleted {
        /// Post identifier.
        post_id: PostId,
        /// Advertiser to notify.
        owner_id: i64,
        /// Timestamp of the removal.
        timestamp: DateTime<Utc>,
    },

    /// Queue positions were compacted.
    QueueRenumbered {
        /// Number of posts left in the queue.
        queue_len: usize,
        /// Timestamp of the pass.
        timestamp: DateTime<Utc>,
    },
}

impl PostEvent {
    /// Returns the post this event concerns, if any.
    #[must_use]
    pub const fn post_id(&self) -> Option<PostId> {
        match self {
            Self::PostCreated { post_id, .. }
            | Self::PostQueued { post_id, .. }
            | Self::PostScheduled { post_id, .. }
            | Self::PostPublished { post_id, .. }
            | Self::PublishFailed { post_id, .. }
            | Self::PostDeleted { post_id, .. } => Some(*post_id),
            Self::QueueRenumbered { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::PostCreated { .. } => "post_created",
            Self::PostQueued { .. } => "post_queued",
            Self::PostScheduled { .. } => "post_scheduled",
            Self::PostPublished { .. } => "post_published",
            Self::PublishFailed { .. } => "publish_failed",
            Self::PostDeleted { .. } => "post_deleted",
            Self::QueueRenumbered { .. } => "queue_renumbered",
        }
    }
}
