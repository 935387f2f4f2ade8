//! In-process repositories used when persistence is disabled and in tests.
//!
//! Every post mutation runs under one `tokio::sync::Mutex`, which makes
//! allocation, transition, and renumbering a single critical section.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::models::{AdminLogEntry, NewAdminLog};
use super::{AdminLogStore, PostRepository, StatusCounts};
use crate::domain::queue::{is_dense, next_position, renumber_plan};
use crate::domain::{
    ChannelRef, CreateTarget, NewPost, Payment, Post, PostFilter, PostId, PostState, PostStatus,
    Transition,
};
use crate::error::SchedulerError;

#[derive(Debug, Default)]
struct Inner {
    posts: BTreeMap<PostId, Post>,
    next_id: i64,
}

impl Inner {
    fn allocate_id(&mut self) -> PostId {
        self.next_id += 1;
        PostId::new(self.next_id)
    }

    fn post_mut(&mut self, id: PostId) -> Result<&mut Post, SchedulerError> {
        self.posts
            .get_mut(&id)
            .ok_or(SchedulerError::PostNotFound(id))
    }

    fn transition(
        &mut self,
        id: PostId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let post = self.post_mut(id)?;
        post.state = post.state.apply(transition)?;
        post.updated_at = now;
        Ok(post.clone())
    }

    fn renumber(&mut self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        let plan = renumber_plan(self.posts.values());
        let len = plan.len();
        for (id, position) in plan {
            let post = self.post_mut(id)?;
            if post.state.queue_position() != Some(position) {
                post.state = post.state.apply(Transition::Reposition { position })?;
                post.updated_at = now;
            }
        }
        debug_assert!(is_dense(
            &self
                .posts
                .values()
                .filter_map(|p| p.state.queue_position())
                .collect::<Vec<_>>()
        ));
        Ok(len)
    }
}

/// Post repository backed by a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryPostRepository {
    inner: Mutex<Inner>,
}

impl MemoryPostRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_listing(posts: &mut [Post], filter: &PostFilter) {
    match filter.status {
        Some(PostStatus::Queue) => posts.sort_by_key(|p| (p.state.queue_position(), p.id)),
        Some(PostStatus::Scheduled) => posts.sort_by_key(|p| (p.state.scheduled_time(), p.id)),
        _ => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))),
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn create(
        &self,
        new: NewPost,
        target: CreateTarget,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let mut inner = self.inner.lock().await;
        let state = match target {
            CreateTarget::Draft => PostState::Draft,
            CreateTarget::Queue => PostState::Draft.apply(Transition::Enqueue {
                position: next_position(inner.posts.values()),
            })?,
            CreateTarget::Scheduled { at } => {
                PostState::Draft.apply(Transition::Schedule { at })?
            }
        };
        let id = inner.allocate_id();
        let post = Post {
            id,
            owner_id: new.owner_id,
            state,
            payment: new.payment,
            content: new.content,
            created_at: now,
            updated_at: now,
        };
        inner.posts.insert(id, post.clone());
        Ok(post)
    }

    async fn get(&self, id: PostId) -> Result<Post, SchedulerError> {
        self.inner
            .lock()
            .await
            .posts
            .get(&id)
            .cloned()
            .ok_or(SchedulerError::PostNotFound(id))
    }

    async fn list(&self, filter: PostFilter) -> Result<Vec<Post>, SchedulerError> {
        let mut posts: Vec<Post> = self
            .inner
            .lock()
            .await
            .posts
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        sort_listing(&mut posts, &filter);
        Ok(posts)
    }

    async fn promote_to_queue(
        &self,
        id: PostId,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let mut inner = self.inner.lock().await;
        let position = next_position(inner.posts.values());
        inner.transition(id, Transition::Enqueue { position }, now)
    }

    async fn promote_to_scheduled(
        &self,
        id: PostId,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        self.inner
            .lock()
            .await
            .transition(id, Transition::Schedule { at }, now)
    }

    async fn mark_published(
        &self,
        id: PostId,
        channel_ref: ChannelRef,
        at: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let mut inner = self.inner.lock().await;
        let post = inner.transition(id, Transition::Publish { at, channel_ref }, at)?;
        inner.renumber(at)?;
        Ok(post)
    }

    async fn delete(&self, id: PostId, now: DateTime<Utc>) -> Result<Post, SchedulerError> {
        let mut inner = self.inner.lock().await;
        let post = inner.post_mut(id)?;
        let rejected = post.state.apply(Transition::Reject)?;
        let was_queued = post.status() == PostStatus::Queue;
        let mut removed = inner
            .posts
            .remove(&id)
            .ok_or(SchedulerError::PostNotFound(id))?;
        removed.state = rejected;
        if was_queued {
            inner.renumber(now)?;
        }
        Ok(removed)
    }

    async fn set_payment(
        &self,
        id: PostId,
        payment: Payment,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let mut inner = self.inner.lock().await;
        let post = inner.post_mut(id)?;
        if post.status().is_terminal() {
            return Err(SchedulerError::InvalidTransition {
                from: post.status(),
                action: "set_payment",
            });
        }
        post.payment = payment;
        post.updated_at = now;
        Ok(post.clone())
    }

    async fn next_position(&self) -> Result<u32, SchedulerError> {
        Ok(next_position(self.inner.lock().await.posts.values()))
    }

    async fn renumber(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        self.inner.lock().await.renumber(now)
    }

    async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Post>, SchedulerError> {
        let mut due: Vec<Post> = self
            .inner
            .lock()
            .await
            .posts
            .values()
            .filter(|p| p.state.scheduled_time().is_some_and(|at| at <= now))
            .cloned()
            .collect();
        due.sort_by_key(|p| (p.state.scheduled_time(), p.id));
        Ok(due)
    }

    async fn queue_front(&self) -> Result<Option<Post>, SchedulerError> {
        Ok(self
            .inner
            .lock()
            .await
            .posts
            .values()
            .filter(|p| p.state.queue_position().is_some())
            .min_by_key(|p| (p.state.queue_position(), p.id))
            .cloned())
    }

    async fn count_by_status(&self) -> Result<StatusCounts, SchedulerError> {
        let inner = self.inner.lock().await;
        let mut counts = StatusCounts::default();
        for post in inner.posts.values() {
            match post.status() {
                PostStatus::Draft => counts.draft += 1,
                PostStatus::Queue => counts.queue += 1,
                PostStatus::Scheduled => counts.scheduled += 1,
                PostStatus::Published => counts.published += 1,
                PostStatus::Rejected => {}
            }
        }
        Ok(counts)
    }

    async fn published_since(&self, since: DateTime<Utc>) -> Result<Vec<Post>, SchedulerError> {
        let published_at = |p: &Post| match p.state {
            PostState::Published { at, .. } => Some(at),
            _ => None,
        };
        let mut posts: Vec<Post> = self
            .inner
            .lock()
            .await
            .posts
            .values()
            .filter(|p| published_at(p).is_some_and(|at| at >= since))
            .cloned()
            .collect();
        posts.sort_by(|a, b| published_at(b).cmp(&published_at(a)).then(b.id.cmp(&a.id)));
        Ok(posts)
    }
}

/// Admin log kept in a `Vec`.
#[derive(Debug, Default)]
pub struct MemoryAdminLog {
    entries: Mutex<Vec<AdminLogEntry>>,
}

impl MemoryAdminLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdminLogStore for MemoryAdminLog {
    async fn append(&self, entry: NewAdminLog) -> Result<AdminLogEntry, SchedulerError> {
        let mut entries = self.entries.lock().await;
        let id = i64::try_from(entries.len())
            .map_err(|e| SchedulerError::Internal(e.to_string()))?
            + 1;
        let stored = AdminLogEntry {
            id,
            admin_id: entry.admin_id,
            action: entry.action,
            details: entry.details,
            created_at: Utc::now(),
        };
        entries.push(stored.clone());
        Ok(stored)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<AdminLogEntry>, SchedulerError> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}
