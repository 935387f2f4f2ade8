//! Post service: orchestrates post lifecycle operations and emits events.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;

use crate::domain::estimator::last_publish_date;
use crate::domain::{
    ChannelRef, CreateTarget, DuplicateCheck, DuplicateDetector, Estimate, EventBus, Lane,
    NewPost, Payment, Post, PostContent, PostEvent, PostFilter, PostId, PostState, PostStatus,
    PublishSchedule, estimate_publish_time,
};
use crate::error::SchedulerError;
use crate::persistence::{AdminLogEntry, AdminLogStore, NewAdminLog, PostRepository, StatusCounts};
use crate::settings::{SettingChange, Settings};

/// Published posts younger than this take part in duplicate checks.
pub const DUPLICATE_LOOKBACK_DAYS: i64 = 30;

/// Default number of entries in the queue calendar.
pub const DEFAULT_CALENDAR_LIMIT: u32 = 20;

/// A post together with its advisory publish estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    /// The post.
    pub post: Post,
    /// Estimated publication, present for queued posts.
    pub estimate: Option<Estimate>,
}

/// One line of the queue calendar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEntry {
    /// Queued post.
    pub post_id: PostId,
    /// Queue position.
    pub position: u32,
    /// Product name, for display.
    pub product_name: String,
    /// Estimated publication.
    pub estimate: Option<Estimate>,
}

/// Upcoming queue publications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueCalendar {
    /// First entries of the queue, in order.
    pub entries: Vec<CalendarEntry>,
    /// Total queue length.
    pub queue_len: u32,
    /// Estimated date of the last queued post.
    pub last_publish_date: Option<NaiveDate>,
}

/// Dashboard numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStats {
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

/// Orchestration layer for every post operation.
///
/// Stateless coordinator: owns the repository for state, the settings view
/// for operational parameters, the admin log for audit, and the
/// [`EventBus`] for notifications. Each mutation follows the pattern:
/// validate → call the repository → audit → emit events → return.
#[derive(Debug, Clone)]
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    admin_log: Arc<dyn AdminLogStore>,
    settings: Settings,
    event_bus: EventBus,
    utc_offset: FixedOffset,
}

impl PostService {
    /// Creates a new `PostService`. `utc_offset` is the wall clock the
    /// publication slots are expressed in.
    #[must_use]
    pub fn new(
        repo: Arc<dyn PostRepository>,
        admin_log: Arc<dyn AdminLogStore>,
        settings: Settings,
        event_bus: EventBus,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            repo,
            admin_log,
            settings,
            event_bus,
            utc_offset,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the settings view.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn PostRepository> {
        &self.repo
    }

    /// Wall-clock offset of the publication slots.
    #[must_use]
    pub const fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    /// Local calendar date of `now`.
    #[must_use]
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.utc_offset).date_naive()
    }

    async fn view(
        &self,
        post: Post,
        schedule: Option<&PublishSchedule>,
        now: DateTime<Utc>,
    ) -> Result<PostView, SchedulerError> {
        let estimate = match (post.state.queue_position(), schedule) {
            (Some(position), Some(schedule)) => {
                estimate_publish_time(position, schedule, self.local_date(now))
            }
            (Some(position), None) => {
                let schedule = self.settings.publish_schedule().await?;
                estimate_publish_time(position, &schedule, self.local_date(now))
            }
            (None, _) => None,
        };
        Ok(PostView { post, estimate })
    }

    async fn ensure_paid_for_priority(
        &self,
        id: Option<PostId>,
        payment: &Payment,
    ) -> Result<(), SchedulerError> {
        let price = self.settings.priority_price().await?;
        if price.is_zero() || payment.is_paid() {
            return Ok(());
        }
        Err(SchedulerError::PaymentRequired(id))
    }

    fn emit_lane_entry(&self, post: &Post, now: DateTime<Utc>) {
        match post.state {
            PostState::Queued { position } => {
                let _ = self.event_bus.publish(PostEvent::PostQueued {
                    post_id: post.id,
                    position,
                    timestamp: now,
                });
            }
            PostState::Scheduled { at } => {
                let _ = self.event_bus.publish(PostEvent::PostScheduled {
                    post_id: post.id,
                    scheduled_for: at,
                    timestamp: now,
                });
            }
            _ => {}
        }
    }

    /// Announces a compaction that already committed. The event is
    /// best-effort: a failed count is logged and never undoes the caller.
    async fn emit_renumbered(&self, now: DateTime<Utc>) {
        match self.repo.count_by_status().await {
            Ok(counts) => {
                let _ = self.event_bus.publish(PostEvent::QueueRenumbered {
                    queue_len: usize::try_from(counts.queue).unwrap_or(usize::MAX),
                    timestamp: now,
                });
            }
            Err(e) => tracing::warn!(error = %e, "queue renumbered, event not emitted"),
        }
    }

    /// Stores a new post in the requested lane.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PaymentRequired`] for an unpaid scheduled
    /// post while priority placement costs money.
    pub async fn create_post(
        &self,
        new: NewPost,
        target: CreateTarget,
        now: DateTime<Utc>,
    ) -> Result<PostView, SchedulerError> {
        if matches!(target, CreateTarget::Scheduled { .. }) {
            self.ensure_paid_for_priority(None, &new.payment).await?;
        }
        let post = self.repo.create(new, target, now).await?;

        let _ = self.event_bus.publish(PostEvent::PostCreated {
            post_id: post.id,
            owner_id: post.owner_id,
            timestamp: now,
        });
        self.emit_lane_entry(&post, now);

        tracing::info!(post_id = %post.id, owner_id = post.owner_id, status = %post.status(), "post created");
        self.view(post, None, now).await
    }

    /// Loads one post with its estimate.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PostNotFound`] for an unknown id.
    pub async fn get_post(&self, id: PostId, now: DateTime<Utc>) -> Result<PostView, SchedulerError> {
        let post = self.repo.get(id).await?;
        self.view(post, None, now).await
    }

    /// Lists posts matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>, SchedulerError> {
        self.repo.list(filter).await
    }

    /// Moves a draft to the back of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTransition`] unless the post is a
    /// draft.
    pub async fn promote_to_queue(
        &self,
        id: PostId,
        now: DateTime<Utc>,
    ) -> Result<PostView, SchedulerError> {
        let post = self.repo.promote_to_queue(id, now).await?;
        self.emit_lane_entry(&post, now);
        tracing::info!(post_id = %id, position = ?post.state.queue_position(), "post queued");
        self.view(post, None, now).await
    }

    /// Moves a draft into the priority lane at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PaymentRequired`] when priority placement
    /// costs money and the post is unpaid, or
    /// [`SchedulerError::InvalidTransition`] unless the post is a draft.
    pub async fn promote_to_scheduled(
        &self,
        id: PostId,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let current = self.repo.get(id).await?;
        if current.status() != PostStatus::Draft {
            return Err(SchedulerError::InvalidTransition {
                from: current.status(),
                action: "schedule",
            });
        }
        self.ensure_paid_for_priority(Some(id), &current.payment).await?;

        let post = self.repo.promote_to_scheduled(id, at, now).await?;
        self.emit_lane_entry(&post, now);
        tracing::info!(post_id = %id, scheduled_for = %at, "post scheduled");
        Ok(post)
    }

    /// Records a successful channel delivery.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTransition`] unless the post is
    /// queued or scheduled.
    pub async fn mark_published(
        &self,
        id: PostId,
        channel_ref: ChannelRef,
        at: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let post = self.repo.mark_published(id, channel_ref.clone(), at).await?;
        let lane = match post.state {
            PostState::Published { lane, .. } => lane,
            _ => Lane::Queue,
        };
        let _ = self.event_bus.publish(PostEvent::PostPublished {
            post_id: id,
            owner_id: post.owner_id,
            lane,
            channel_ref: channel_ref.clone(),
            timestamp: at,
        });
        if lane == Lane::Queue {
            self.emit_renumbered(at).await;
        }
        tracing::info!(post_id = %id, lane = lane.as_str(), message_id = channel_ref.message_id, "post published");
        Ok(post)
    }

    /// Reports a failed delivery; the post keeps its state.
    pub fn report_publish_failure(&self, id: PostId, reason: &str, at: DateTime<Utc>) {
        let _ = self.event_bus.publish(PostEvent::PublishFailed {
            post_id: id,
            reason: reason.to_string(),
            timestamp: at,
        });
    }

    /// Admin removal: hard-deletes the post and records an audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTransition`] for published posts, or
    /// [`SchedulerError::PostNotFound`].
    pub async fn delete_post(
        &self,
        id: PostId,
        admin_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let before = self.repo.get(id).await?;
        let post = self.repo.delete(id, now).await?;

        self.admin_log
            .append(NewAdminLog {
                admin_id,
                action: "delete_post".to_string(),
                details: json!({
                    "post_id": id,
                    "owner_id": post.owner_id,
                    "status": before.status(),
                    "product_name": post.content.product_name,
                }),
            })
            .await?;

        let _ = self.event_bus.publish(PostEvent::PostDeleted {
            post_id: id,
            owner_id: post.owner_id,
            timestamp: now,
        });
        if before.status() == PostStatus::Queue {
            self.emit_renumbered(now).await;
        }
        tracing::info!(post_id = %id, admin_id, was = %before.status(), "post deleted");
        Ok(post)
    }

    /// Replaces the payment flags of a non-terminal post.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTransition`] for terminal posts.
    pub async fn set_payment(
        &self,
        id: PostId,
        payment: Payment,
        now: DateTime<Utc>,
    ) -> Result<Post, SchedulerError> {
        let post = self.repo.set_payment(id, payment, now).await?;
        tracing::info!(post_id = %id, status = ?post.payment.status, "payment updated");
        Ok(post)
    }

    /// The queue in order, each post with its estimate.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn queue(&self, now: DateTime<Utc>) -> Result<Vec<PostView>, SchedulerError> {
        let schedule = self.settings.publish_schedule().await?;
        let posts = self.repo.list(PostFilter::status(PostStatus::Queue)).await?;
        let mut views = Vec::with_capacity(posts.len());
        for post in posts {
            views.push(self.view(post, Some(&schedule), now).await?);
        }
        Ok(views)
    }

    /// The first `limit` queued posts with estimates and the queue's drain
    /// date.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn queue_calendar(
        &self,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<QueueCalendar, SchedulerError> {
        let schedule = self.settings.publish_schedule().await?;
        let today = self.local_date(now);
        let posts = self.repo.list(PostFilter::status(PostStatus::Queue)).await?;
        let queue_len = u32::try_from(posts.len()).unwrap_or(u32::MAX);

        let entries = posts
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .filter_map(|post| {
                let position = post.state.queue_position()?;
                Some(CalendarEntry {
                    post_id: post.id,
                    position,
                    product_name: post.content.product_name,
                    estimate: estimate_publish_time(position, &schedule, today),
                })
            })
            .collect();

        Ok(QueueCalendar {
            entries,
            queue_len,
            last_publish_date: last_publish_date(queue_len, &schedule, today),
        })
    }

    /// Runs the invariant repair pass and returns the queue length.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn renumber_queue(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        let queue_len = self.repo.renumber(now).await?;
        let _ = self.event_bus.publish(PostEvent::QueueRenumbered {
            queue_len,
            timestamp: now,
        });
        tracing::info!(queue_len, "queue renumbered");
        Ok(queue_len)
    }

    /// Scores `candidate` against queued, scheduled, and recently published
    /// posts using the configured threshold.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn check_duplicate(
        &self,
        candidate: &PostContent,
        now: DateTime<Utc>,
    ) -> Result<DuplicateCheck, SchedulerError> {
        let detector = DuplicateDetector::new(self.settings.duplicate_threshold().await?);
        let mut existing = self.repo.list(PostFilter::status(PostStatus::Queue)).await?;
        existing.extend(self.repo.list(PostFilter::status(PostStatus::Scheduled)).await?);
        existing.extend(
            self.repo
                .published_since(now - Duration::days(DUPLICATE_LOOKBACK_DAYS))
                .await?,
        );

        let check = detector.check(candidate, &existing);
        if check.is_duplicate {
            tracing::info!(best_match = ?check.best_match, score = check.score, "duplicate detected");
        }
        Ok(check)
    }

    async fn audit_changes(
        &self,
        admin_id: i64,
        changes: &[SettingChange],
    ) -> Result<(), SchedulerError> {
        for change in changes {
            self.admin_log
                .append(NewAdminLog {
                    admin_id,
                    action: "update_setting".to_string(),
                    details: json!({
                        "key": change.key,
                        "old": change.old,
                        "new": change.new,
                    }),
                })
                .await?;
        }
        Ok(())
    }

    /// Updates the daily quota and/or the slot list.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] for out-of-range or
    /// malformed input; nothing is written when validation fails.
    pub async fn update_schedule(
        &self,
        admin_id: i64,
        posts_per_day: Option<u32>,
        times: Option<&str>,
    ) -> Result<Vec<SettingChange>, SchedulerError> {
        if let Some(times) = times {
            crate::domain::schedule::parse_slot_list(times)?;
        }
        let mut changes = Vec::new();
        if let Some(count) = posts_per_day {
            changes.push(self.settings.set_posts_per_day(count).await?);
        }
        if let Some(times) = times {
            changes.push(self.settings.set_schedule_times(times).await?);
        }
        self.audit_changes(admin_id, &changes).await?;
        Ok(changes)
    }

    /// Updates one or both placement prices.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] for negative or malformed
    /// amounts; nothing is written when validation fails.
    pub async fn update_prices(
        &self,
        admin_id: i64,
        queue_price: Option<&str>,
        priority_price: Option<&str>,
    ) -> Result<Vec<SettingChange>, SchedulerError> {
        for input in [queue_price, priority_price].into_iter().flatten() {
            input.parse::<crate::settings::Price>()?;
        }
        let mut changes = Vec::new();
        if let Some(price) = queue_price {
            changes.push(self.settings.set_queue_price(price).await?);
        }
        if let Some(price) = priority_price {
            changes.push(self.settings.set_priority_price(price).await?);
        }
        self.audit_changes(admin_id, &changes).await?;
        Ok(changes)
    }

    /// Points the dispatcher at a broadcast channel.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] for a blank channel id.
    pub async fn update_channel(
        &self,
        admin_id: i64,
        channel_id: &str,
        username: Option<&str>,
    ) -> Result<Vec<SettingChange>, SchedulerError> {
        let changes = self.settings.set_channel(channel_id, username).await?;
        self.audit_changes(admin_id, &changes).await?;
        Ok(changes)
    }

    /// Updates the duplicate threshold.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] outside `0..=100`.
    pub async fn update_duplicate_threshold(
        &self,
        admin_id: i64,
        threshold: f64,
    ) -> Result<SettingChange, SchedulerError> {
        let change = self.settings.set_duplicate_threshold(threshold).await?;
        self.audit_changes(admin_id, std::slice::from_ref(&change))
            .await?;
        Ok(change)
    }

    /// Most recent audit entries first.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn admin_logs(&self, limit: u32) -> Result<Vec<AdminLogEntry>, SchedulerError> {
        self.admin_log.recent(limit).await
    }

    /// Dashboard numbers.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<SchedulerStats, SchedulerError> {
        let counts = self.repo.count_by_status().await?;
        let last_week = self.repo.published_since(now - Duration::days(7)).await?;
        let day_ago = now - Duration::hours(24);
        let published_last_24h = last_week
            .iter()
            .filter(|p| matches!(p.state, PostState::Published { at, .. } if at >= day_ago))
            .count();

        let schedule = self.settings.publish_schedule().await?;
        let queue_len = u32::try_from(counts.queue).unwrap_or(u32::MAX);
        let next_scheduled = self
            .repo
            .list(PostFilter::status(PostStatus::Scheduled))
            .await?
            .first()
            .and_then(|p| p.state.scheduled_time());

        Ok(SchedulerStats {
            counts,
            published_last_24h: u64::try_from(published_last_24h).unwrap_or(u64::MAX),
            published_last_7d: u64::try_from(last_week.len()).unwrap_or(u64::MAX),
            queue_drains_on: last_publish_date(queue_len, &schedule, self.local_date(now)),
            next_scheduled,
        })
    }
}
