//! Post lifecycle state machine.
//!
//! [`PostState`] is the tagged union every post carries. The lane-specific
//! data (queue position, scheduled time, publication reference) lives inside
//! the variant that owns it, so "a queued post without a position" cannot be
//! represented. All moves go through [`PostState::apply`], which rejects
//! illegal transitions such as `published → queue`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::SchedulerError;

/// Fieldless projection of [`PostState`] used for storage and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Saved by the wizard, not yet submitted.
    Draft,
    /// Waiting in the FIFO queue lane.
    Queue,
    /// Waiting for an exact publish time in the priority lane.
    Scheduled,
    /// Sent to the channel (terminal).
    Published,
    /// Removed by an admin (terminal).
    Rejected,
}

impl PostStatus {
    /// Returns the storage string for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Queue => "queue",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Rejected => "rejected",
        }
    }

    /// Returns `true` for states no transition can leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Rejected)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "queue" => Ok(Self::Queue),
            "scheduled" => Ok(Self::Scheduled),
            "published" => Ok(Self::Published),
            "rejected" => Ok(Self::Rejected),
            other => Err(SchedulerError::InvalidRequest(format!(
                "unknown post status: {other}"
            ))),
        }
    }
}

/// Publication lane a post went out through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Free FIFO queue.
    Queue,
    /// Paid or admin-assigned exact slot.
    Priority,
}

impl Lane {
    /// Returns the storage string for this lane.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Priority => "priority",
        }
    }
}

impl FromStr for Lane {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(Self::Queue),
            "priority" => Ok(Self::Priority),
            other => Err(SchedulerError::InvalidRequest(format!(
                "unknown lane: {other}"
            ))),
        }
    }
}

/// Reference to the message a post became in the broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChannelRef {
    /// Channel-side message id.
    pub message_id: i64,
    /// Public link to the message, when the channel has one.
    pub url: Option<String>,
}

/// Current lifecycle state of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostState {
    /// Saved, not submitted.
    Draft,
    /// In the FIFO lane at a 1-based position.
    #[serde(rename = "queue")]
    Queued {
        /// Dense 1-based queue position.
        position: u32,
    },
    /// In the priority lane for an exact time.
    Scheduled {
        /// Publish no earlier than this instant.
        at: DateTime<Utc>,
    },
    /// Sent to the channel.
    Published {
        /// Moment of successful publication.
        at: DateTime<Utc>,
        /// Channel-side reference, set exactly once.
        channel_ref: ChannelRef,
        /// Lane the post was published from.
        lane: Lane,
    },
    /// Removed by an admin.
    Rejected,
}

/// A requested state move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// `draft → queue` at an allocated position.
    Enqueue {
        /// Position handed out by the allocator.
        position: u32,
    },
    /// `draft → scheduled` at an exact time.
    Schedule {
        /// Target publish time.
        at: DateTime<Utc>,
    },
    /// `queue | scheduled → published`.
    Publish {
        /// Publication instant.
        at: DateTime<Utc>,
        /// Reference returned by the channel sender.
        channel_ref: ChannelRef,
    },
    /// Admin removal of a non-terminal post.
    Reject,
    /// Position compaction for a queued post.
    Reposition {
        /// New dense position.
        position: u32,
    },
}

impl Transition {
    /// Short verb used in error messages and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Enqueue { .. } => "enqueue",
            Self::Schedule { .. } => "schedule",
            Self::Publish { .. } => "publish",
            Self::Reject => "reject",
            Self::Reposition { .. } => "reposition",
        }
    }
}

impl PostState {
    /// Returns the fieldless status of this state.
    #[must_use]
    pub const fn status(&self) -> PostStatus {
        match self {
            Self::Draft => PostStatus::Draft,
            Self::Queued { .. } => PostStatus::Queue,
            Self::Scheduled { .. } => PostStatus::Scheduled,
            Self::Published { .. } => PostStatus::Published,
            Self::Rejected => PostStatus::Rejected,
        }
    }

    /// Queue position, present iff the post is queued.
    #[must_use]
    pub const fn queue_position(&self) -> Option<u32> {
        match self {
            Self::Queued { position } => Some(*position),
            _ => None,
        }
    }

    /// Scheduled time, present iff the post is scheduled.
    #[must_use]
    pub const fn scheduled_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Scheduled { at } => Some(*at),
            _ => None,
        }
    }

    /// Applies a transition, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTransition`] when the move is not
    /// legal from the current state, and [`SchedulerError::InvalidRequest`]
    /// for a zero queue position.
    pub fn apply(&self, transition: Transition) -> Result<Self, SchedulerError> {
        let illegal = || SchedulerError::InvalidTransition {
            from: self.status(),
            action: transition.name(),
        };
        match (self, &transition) {
            (Self::Draft, Transition::Enqueue { position })
            | (Self::Queued { .. }, Transition::Reposition { position }) => {
                if *position == 0 {
                    return Err(SchedulerError::InvalidRequest(
                        "queue positions start at 1".to_string(),
                    ));
                }
                Ok(Self::Queued {
                    position: *position,
                })
            }
            (Self::Draft, Transition::Schedule { at }) => Ok(Self::Scheduled { at: *at }),
            (Self::Queued { .. }, Transition::Publish { at, channel_ref }) => Ok(Self::Published {
                at: *at,
                channel_ref: channel_ref.clone(),
                lane: Lane::Queue,
            }),
            (Self::Scheduled { .. }, Transition::Publish { at, channel_ref }) => {
                Ok(Self::Published {
                    at: *at,
                    channel_ref: channel_ref.clone(),
                    lane: Lane::Priority,
                })
            }
            (Self::Draft | Self::Queued { .. } | Self::Scheduled { .. }, Transition::Reject) => {
                Ok(Self::Rejected)
            }
            _ => Err(illegal()),
        }
    }
}
