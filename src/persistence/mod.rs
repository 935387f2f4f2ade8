//! Persistence layer: post repository, admin audit log, settings tables.
//!
//! [`PostRepository`] owns post rows and every status transition. Each
//! operation is atomic with respect to the queue density invariant: the
//! memory store serializes through one mutex, the PostgreSQL store through a
//! table lock taken at the start of each mutating transaction.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ChannelRef, CreateTarget, NewPost, Payment, Post, PostFilter, PostId};
use crate::error::SchedulerError;

pub use memory::{MemoryAdminLog, MemoryPostRepository};
pub use models::{AdminLogEntry, NewAdminLog};
pub use postgres::{PgAdminLog, PgPostRepository, PgSettingsStore};

/// Number of posts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    /// Drafts.
    pub draft: u64,
    /// Queued posts.
    pub queue: u64,
    /// Scheduled posts.
    pub scheduled: u64,
    /// Published posts.
    pub published: u64,
}

/// Durable store of posts and their lifecycle transitions.
#[async_trait]
pub trait PostRepository: Send + Sync + std::fmt::Debug {
    /// Stores a new post in the requested lane. A queue target allocates the
    /// next position in the same critical section.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn create(
        &self,
        new: NewPost,
        target: CreateTarget,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError>;

    /// Loads one post.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PostNotFound`] for an unknown id.
    async fn get(&self, id: PostId) -> Result<Post, SchedulerError>;

    /// Lists posts: queue by position, scheduled by time, everything else
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn list(&self, filter: PostFilter) -> Result<Vec<Post>, SchedulerError>;

    /// `draft → queue` at the next free position.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTransition`] unless the post is a
    /// draft, or [`SchedulerError::PostNotFound`].
    async fn promote_to_queue(&self, id: PostId, now: DateTime<Utc>)
    -> Result<Post, SchedulerError>;

    /// `draft → scheduled` at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTransition`] unless the post is a
    /// draft, or [`SchedulerError::PostNotFound`].
    async fn promote_to_scheduled(
        &self,
        id: PostId,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError>;

    /// `queue | scheduled → published`; renumbers the queue when the post
    /// was queued.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTransition`] for any other state, or
    /// [`SchedulerError::PostNotFound`].
    async fn mark_published(
        &self,
        id: PostId,
        channel_ref: ChannelRef,
        at: DateTime<Utc>,
    ) -> Result<Post, SchedulerError>;

    /// Hard-deletes a non-published post, returning it in the rejected
    /// state; renumbers the queue when the post was queued.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTransition`] for published posts, or
    /// [`SchedulerError::PostNotFound`].
    async fn delete(&self, id: PostId, now: DateTime<Utc>) -> Result<Post, SchedulerError>;

    /// Replaces the payment flags (payment collaborator hook).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTransition`] for terminal posts, or
    /// [`SchedulerError::PostNotFound`].
    async fn set_payment(
        &self,
        id: PostId,
        payment: Payment,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError>;

    /// `max(queue position) + 1`, or 1 for an empty queue.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn next_position(&self) -> Result<u32, SchedulerError>;

    /// Compacts queue positions to `1..=N` preserving order; returns `N`.
    /// Moved rows get `updated_at = now`. Idempotent and safe to call at any
    /// time.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn renumber(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError>;

    /// Scheduled posts with `at <= now`, oldest first (ties by id).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Post>, SchedulerError>;

    /// The queued post at position 1, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn queue_front(&self) -> Result<Option<Post>, SchedulerError>;

    /// Posts per status.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn count_by_status(&self) -> Result<StatusCounts, SchedulerError>;

    /// Posts published at or after `since`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn published_since(&self, since: DateTime<Utc>) -> Result<Vec<Post>, SchedulerError>;
}

/// Append-only audit trail of admin mutations.
#[async_trait]
pub trait AdminLogStore: Send + Sync + std::fmt::Debug {
    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn append(&self, entry: NewAdminLog) -> Result<AdminLogEntry, SchedulerError>;

    /// Most recent entries first.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn recent(&self, limit: u32) -> Result<Vec<AdminLogEntry>, SchedulerError>;
}
