//! Dispatch scheduler: publishes due posts on each tick.
//!
//! One tick runs two passes. The priority pass publishes every scheduled post
//! whose time has come, oldest first. The queue pass publishes the queue
//! front when the local wall-clock minute matches a configured slot. Ticks
//! never overlap; a fired-slot ledger makes each `(date, slot)` pair publish
//! at most once even when a manual tick races the timer.
//!
//! A post the channel accepted but the store failed to record is never sent
//! again: the dispatcher keeps its channel reference and retries only the
//! bookkeeping on later ticks.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use uuid::Uuid;

use super::PostService;
use crate::channel::{ChannelSender, OutboundPost, SendError};
use crate::domain::{ChannelRef, Lane, Post, PostId, SlotTime};
use crate::error::SchedulerError;

/// Dispatcher tuning, loaded from the process configuration.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Upper bound on one channel send.
    pub send_timeout: Duration,
    /// Minutes after a slot during which a late tick may still serve it.
    pub slot_catch_up_minutes: u32,
    /// Wall clock the `HH:MM` slots are expressed in.
    pub utc_offset: FixedOffset,
}

/// Why a tick did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickSkip {
    /// No `channel_id` setting.
    ChannelNotConfigured,
    /// The process runs without a channel sender.
    SenderNotConfigured,
}

impl TickSkip {
    /// Returns the wire name of the skip reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChannelNotConfigured => "channel_not_configured",
            Self::SenderNotConfigured => "sender_not_configured",
        }
    }
}

/// A post that reached the channel during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedItem {
    /// Published post.
    pub post_id: PostId,
    /// Lane it left from.
    pub lane: Lane,
    /// Channel-side message id.
    pub message_id: i64,
}

/// A post whose delivery failed; it keeps its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// Post that failed.
    pub post_id: PostId,
    /// Lane it was in.
    pub lane: Lane,
    /// Failure description.
    pub reason: String,
}

/// A post the channel accepted whose publication could not be stored yet.
/// It is not sent again; recording is retried on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnrecordedItem {
    /// Delivered post.
    pub post_id: PostId,
    /// Lane it left from.
    pub lane: Lane,
    /// Channel-side message id.
    pub message_id: i64,
    /// Store error.
    pub reason: String,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Correlation id, also recorded on the tick's tracing span.
    pub tick_id: Uuid,
    /// Injected clock value.
    pub now: DateTime<Utc>,
    /// Set when the whole tick was skipped.
    pub skipped: Option<TickSkip>,
    /// Queue slot served by this tick.
    pub slot: Option<SlotTime>,
    /// Successful publications in order.
    pub published: Vec<PublishedItem>,
    /// Failed deliveries in order.
    pub failures: Vec<FailedItem>,
    /// Delivered posts still waiting to be recorded as published.
    pub unrecorded: Vec<UnrecordedItem>,
}

impl TickReport {
    fn new(tick_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            tick_id,
            now,
            skipped: None,
            slot: None,
            published: Vec::new(),
            failures: Vec::new(),
            unrecorded: Vec::new(),
        }
    }

    /// Returns `true` when the tick changed nothing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.published.is_empty() && self.failures.is_empty() && self.unrecorded.is_empty()
    }
}

#[derive(Debug, Default)]
struct Ledger {
    served: HashSet<(NaiveDate, SlotTime)>,
    /// Delivered but not yet recorded, keyed by post.
    unrecorded: BTreeMap<PostId, (Lane, ChannelRef)>,
}

impl Ledger {
    fn prune(&mut self, oldest: NaiveDate) {
        self.served.retain(|(date, _)| *date >= oldest);
    }

    fn is_served(&self, date: NaiveDate, slot: SlotTime) -> bool {
        self.served.contains(&(date, slot))
    }

    fn mark(&mut self, date: NaiveDate, slot: SlotTime) {
        self.served.insert((date, slot));
    }
}

/// Periodic publisher.
///
/// [`Dispatcher::tick`] is the whole algorithm with an injected clock;
/// [`Dispatcher::run`] drives it from a timer. Both paths share one mutex,
/// so a manual tick and the timer never interleave.
#[derive(Debug)]
pub struct Dispatcher {
    service: PostService,
    sender: Option<Arc<dyn ChannelSender>>,
    config: DispatcherConfig,
    ledger: Mutex<Ledger>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        service: PostService,
        sender: Arc<dyn ChannelSender>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            service,
            sender: Some(sender),
            config,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Creates a dispatcher with nothing to deliver through. Every tick is
    /// skipped with [`TickSkip::SenderNotConfigured`], so no post is marked
    /// published without reaching a channel.
    #[must_use]
    pub fn without_sender(service: PostService, config: DispatcherConfig) -> Self {
        Self {
            service,
            sender: None,
            config,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Runs one dispatch pass at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] when the store cannot be
    /// read. Delivery failures are not errors; they are listed in the
    /// report.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, SchedulerError> {
        let mut ledger = self.ledger.lock().await;
        let tick_id = Uuid::new_v4();
        let span = tracing::info_span!("dispatch_tick", %tick_id);
        self.tick_locked(&mut ledger, tick_id, now)
            .instrument(span)
            .await
    }

    async fn tick_locked(
        &self,
        ledger: &mut Ledger,
        tick_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TickReport, SchedulerError> {
        let mut report = TickReport::new(tick_id, now);
        self.record_delivered(ledger, now, &mut report).await;

        let Some(channel_id) = self.service.settings().channel_id().await? else {
            tracing::warn!("channel_id is not configured, skipping dispatch");
            report.skipped = Some(TickSkip::ChannelNotConfigured);
            return Ok(report);
        };
        let Some(sender) = self.sender.as_deref() else {
            tracing::warn!("no channel sender configured, skipping dispatch");
            report.skipped = Some(TickSkip::SenderNotConfigured);
            return Ok(report);
        };

        for post in self.service.repository().due_scheduled(now).await? {
            if ledger.unrecorded.contains_key(&post.id) {
                continue;
            }
            self.publish(sender, &channel_id, &post, Lane::Priority, now, ledger, &mut report)
                .await;
        }

        let local_now = now.with_timezone(&self.config.utc_offset).naive_local();
        let today = local_now.date();
        let yesterday = today.pred_opt().unwrap_or(today);
        ledger.prune(yesterday);

        // Slots are matched on their full local datetime so a window that
        // starts before midnight still covers the minutes after it.
        let schedule = self.service.settings().publish_schedule().await?;
        let slots = schedule.slots();
        let window = TimeDelta::minutes(i64::from(self.config.slot_catch_up_minutes) + 1);
        let due_slot = [yesterday, today]
            .into_iter()
            .flat_map(|date| slots.iter().map(move |slot| (date, *slot)))
            .find(|(date, slot)| {
                let elapsed = local_now - date.and_time(slot.as_time());
                elapsed >= TimeDelta::zero()
                    && elapsed < window
                    && !ledger.is_served(*date, *slot)
            });

        if let Some((date, slot)) = due_slot {
            match self.service.repository().queue_front().await? {
                None => {
                    tracing::debug!(%slot, "queue empty at slot");
                    ledger.mark(date, slot);
                }
                Some(front) if ledger.unrecorded.contains_key(&front.id) => {
                    tracing::warn!(post_id = %front.id, %slot, "queue front delivered but unrecorded, holding slot");
                }
                Some(front) => {
                    let delivered = self
                        .publish(sender, &channel_id, &front, Lane::Queue, now, ledger, &mut report)
                        .await;
                    if delivered {
                        ledger.mark(date, slot);
                        report.slot = Some(slot);
                    }
                }
            }
        }

        tracing::debug!(
            published = report.published.len(),
            failed = report.failures.len(),
            unrecorded = report.unrecorded.len(),
            "dispatch tick finished"
        );
        Ok(report)
    }

    /// Retries the bookkeeping for posts an earlier tick delivered.
    async fn record_delivered(&self, ledger: &mut Ledger, now: DateTime<Utc>, report: &mut TickReport) {
        let pending = std::mem::take(&mut ledger.unrecorded);
        for (post_id, (lane, channel_ref)) in pending {
            let message_id = channel_ref.message_id;
            match self
                .service
                .mark_published(post_id, channel_ref.clone(), now)
                .await
            {
                Ok(_) => {
                    tracing::info!(post_id = %post_id, message_id, "delivered post recorded");
                    report.published.push(PublishedItem {
                        post_id,
                        lane,
                        message_id,
                    });
                }
                Err(e @ (SchedulerError::InvalidTransition { .. } | SchedulerError::PostNotFound(_))) => {
                    tracing::error!(post_id = %post_id, message_id, error = %e, "delivered post can no longer be recorded");
                }
                Err(e) => {
                    tracing::error!(post_id = %post_id, message_id, error = %e, "delivered post still unrecorded");
                    report.unrecorded.push(UnrecordedItem {
                        post_id,
                        lane,
                        message_id,
                        reason: e.to_string(),
                    });
                    ledger.unrecorded.insert(post_id, (lane, channel_ref));
                }
            }
        }
    }

    /// Sends one post and records it. Returns `true` once the channel has
    /// the message, whether or not the store caught up.
    #[allow(clippy::too_many_arguments)]
    async fn publish(
        &self,
        sender: &dyn ChannelSender,
        channel_id: &str,
        post: &Post,
        lane: Lane,
        now: DateTime<Utc>,
        ledger: &mut Ledger,
        report: &mut TickReport,
    ) -> bool {
        let message = OutboundPost::from_post(channel_id, post);
        let timeout_secs = self.config.send_timeout.as_secs();
        let sent = match tokio::time::timeout(self.config.send_timeout, sender.send(&message)).await
        {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout(timeout_secs)),
        };

        let channel_ref = match sent {
            Ok(channel_ref) => channel_ref,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(post_id = %post.id, lane = lane.as_str(), %reason, "publish failed");
                self.service.report_publish_failure(post.id, &reason, now);
                report.failures.push(FailedItem {
                    post_id: post.id,
                    lane,
                    reason,
                });
                return false;
            }
        };

        let message_id = channel_ref.message_id;
        match self
            .service
            .mark_published(post.id, channel_ref.clone(), now)
            .await
        {
            Ok(_) => {
                report.published.push(PublishedItem {
                    post_id: post.id,
                    lane,
                    message_id,
                });
            }
            Err(e) => {
                tracing::error!(
                    post_id = %post.id,
                    lane = lane.as_str(),
                    message_id,
                    error = %e,
                    "post delivered but not recorded as published"
                );
                report.unrecorded.push(UnrecordedItem {
                    post_id: post.id,
                    lane,
                    message_id,
                    reason: e.to_string(),
                });
                ledger.unrecorded.insert(post.id, (lane, channel_ref));
            }
        }
        true
    }

    /// Ticks every `interval` until `shutdown` resolves. Tick errors are
    /// logged and the loop continues.
    pub async fn run<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        tracing::info!(interval_secs = interval.as_secs(), "dispatcher started");

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        tracing::error!(error = %e, "dispatch tick failed");
                    }
                }
            }
        }
        tracing::info!("dispatcher stopped");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tokio_test::assert_ok;

    use super::*;
    use crate::channel::testing::RecordingSender;
    use crate::domain::{
        CreateTarget, EventBus, NewPost, Payment, PaymentStatus, PostContent, PostState,
        PostStatus,
    };
    use crate::domain::{ChannelRef, PostFilter};
    use crate::persistence::{MemoryAdminLog, MemoryPostRepository, PostRepository, StatusCounts};
    use crate::settings::{MemorySettings, Settings, keys};

    struct Harness {
        dispatcher: Dispatcher,
        service: PostService,
        sender: Arc<RecordingSender>,
    }

    fn offset() -> FixedOffset {
        let Some(offset) = FixedOffset::east_opt(3 * 3600) else {
            panic!("valid offset");
        };
        offset
    }

    /// Memory repository whose writes can be made to fail after the fact.
    #[derive(Debug, Default)]
    struct FlakyRepository {
        inner: MemoryPostRepository,
        fail_publish: AtomicBool,
        fail_counts: AtomicBool,
    }

    fn store_down() -> SchedulerError {
        SchedulerError::PersistenceError("connection reset".to_string())
    }

    #[async_trait]
    impl PostRepository for FlakyRepository {
        async fn create(
            &self,
            new: NewPost,
            target: CreateTarget,
            now: DateTime<Utc>,
        ) -> Result<Post, SchedulerError> {
            self.inner.create(new, target, now).await
        }
        async fn get(&self, id: PostId) -> Result<Post, SchedulerError> {
            self.inner.get(id).await
        }
        async fn list(&self, filter: PostFilter) -> Result<Vec<Post>, SchedulerError> {
            self.inner.list(filter).await
        }
        async fn promote_to_queue(&self, id: PostId, now: DateTime<Utc>) -> Result<Post, SchedulerError> {
            self.inner.promote_to_queue(id, now).await
        }
        async fn promote_to_scheduled(
            &self,
            id: PostId,
            at: DateTime<Utc>,
            now: DateTime<Utc>,
        ) -> Result<Post, SchedulerError> {
            self.inner.promote_to_scheduled(id, at, now).await
        }
        async fn mark_published(
            &self,
            id: PostId,
            channel_ref: ChannelRef,
            at: DateTime<Utc>,
        ) -> Result<Post, SchedulerError> {
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(store_down());
            }
            self.inner.mark_published(id, channel_ref, at).await
        }
        async fn delete(&self, id: PostId, now: DateTime<Utc>) -> Result<Post, SchedulerError> {
            self.inner.delete(id, now).await
        }
        async fn set_payment(
            &self,
            id: PostId,
            payment: Payment,
            now: DateTime<Utc>,
        ) -> Result<Post, SchedulerError> {
            self.inner.set_payment(id, payment, now).await
        }
        async fn next_position(&self) -> Result<u32, SchedulerError> {
            self.inner.next_position().await
        }
        async fn renumber(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
            self.inner.renumber(now).await
        }
        async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Post>, SchedulerError> {
            self.inner.due_scheduled(now).await
        }
        async fn queue_front(&self) -> Result<Option<Post>, SchedulerError> {
            self.inner.queue_front().await
        }
        async fn count_by_status(&self) -> Result<StatusCounts, SchedulerError> {
            if self.fail_counts.load(Ordering::SeqCst) {
                return Err(store_down());
            }
            self.inner.count_by_status().await
        }
        async fn published_since(&self, since: DateTime<Utc>) -> Result<Vec<Post>, SchedulerError> {
            self.inner.published_since(since).await
        }
    }

    fn harness_with(pairs: &[(&'static str, &'static str)], catch_up: u32) -> Harness {
        harness_over(Arc::new(MemoryPostRepository::new()), pairs, catch_up)
    }

    fn harness_over(
        repo: Arc<dyn PostRepository>,
        pairs: &[(&'static str, &'static str)],
        catch_up: u32,
    ) -> Harness {
        let settings = Settings::new(Arc::new(MemorySettings::with_values(pairs.iter().copied())));
        let service = PostService::new(
            repo,
            Arc::new(MemoryAdminLog::new()),
            settings,
            EventBus::new(64),
            offset(),
        );
        let sender = Arc::new(RecordingSender::new());
        let dispatcher = Dispatcher::new(
            service.clone(),
            Arc::clone(&sender) as Arc<dyn ChannelSender>,
            DispatcherConfig {
                send_timeout: Duration::from_millis(50),
                slot_catch_up_minutes: catch_up,
                utc_offset: offset(),
            },
        );
        Harness {
            dispatcher,
            service,
            sender,
        }
    }

    fn harness() -> Harness {
        harness_with(&[(keys::CHANNEL_ID, "-1001")], 0)
    }

    /// `h:m` local time (UTC+3) on 2026-05-04.
    fn local(h: u32, m: u32) -> DateTime<Utc> {
        let Some(t) = offset().with_ymd_and_hms(2026, 5, 4, h, m, 0).single() else {
            panic!("valid timestamp");
        };
        t.with_timezone(&Utc)
    }

    fn paid(name: &str) -> NewPost {
        NewPost {
            owner_id: 5,
            payment: Payment {
                status: Some(PaymentStatus::Paid),
                ..Payment::default()
            },
            content: PostContent {
                product_name: name.to_string(),
                ..PostContent::default()
            },
        }
    }

    async fn create(h: &Harness, name: &str, target: CreateTarget) -> PostId {
        let Ok(view) = h.service.create_post(paid(name), target, local(8, 0)).await else {
            panic!("create should succeed");
        };
        view.post.id
    }

    async fn tick(h: &Harness, now: DateTime<Utc>) -> TickReport {
        let Ok(report) = h.dispatcher.tick(now).await else {
            panic!("tick should succeed");
        };
        report
    }

    async fn status(h: &Harness, id: PostId) -> PostStatus {
        let Ok(post) = h.service.repository().get(id).await else {
            panic!("post should exist");
        };
        post.status()
    }

    #[tokio::test]
    async fn queue_fires_only_on_exact_slot_minute() {
        let h = harness();
        let a = create(&h, "a", CreateTarget::Queue).await;
        let b = create(&h, "b", CreateTarget::Queue).await;

        let early = tick(&h, local(9, 59)).await;
        assert!(early.is_idle());
        assert_eq!(status(&h, a).await, PostStatus::Queue);

        let on_time = tick(&h, local(10, 0)).await;
        assert_eq!(on_time.slot, SlotTime::new(10, 0).ok());
        assert_eq!(h.sender.sent_ids().await, vec![a]);
        assert_eq!(status(&h, a).await, PostStatus::Published);

        let Ok(front) = h.service.repository().queue_front().await else {
            panic!("front should load");
        };
        assert_eq!(front.map(|p| (p.id, p.state.queue_position())), Some((b, Some(1))));

        let late = tick(&h, local(10, 1)).await;
        assert!(late.is_idle());
    }

    #[tokio::test]
    async fn priority_posts_publish_in_time_order_without_cap() {
        let h = harness();
        let late = create(&h, "late", CreateTarget::Scheduled { at: local(11, 30) }).await;
        let early = create(&h, "early", CreateTarget::Scheduled { at: local(11, 0) }).await;
        let future = create(&h, "future", CreateTarget::Scheduled { at: local(15, 0) }).await;
        let queued = create(&h, "queued", CreateTarget::Queue).await;

        let report = tick(&h, local(12, 0)).await;
        assert_eq!(h.sender.sent_ids().await, vec![early, late]);
        assert!(report.published.iter().all(|p| p.lane == Lane::Priority));
        assert_eq!(status(&h, future).await, PostStatus::Scheduled);
        assert_eq!(status(&h, queued).await, PostStatus::Queue);

        let Ok(post) = h.service.repository().get(early).await else {
            panic!("post should exist");
        };
        let PostState::Published { at, lane, .. } = post.state else {
            panic!("post should be published");
        };
        assert_eq!(at, local(12, 0));
        assert_eq!(lane, Lane::Priority);
    }

    #[tokio::test]
    async fn priority_and_queue_both_fire_in_one_tick() {
        let h = harness();
        let scheduled = create(&h, "s", CreateTarget::Scheduled { at: local(12, 50) }).await;
        let queued = create(&h, "q", CreateTarget::Queue).await;

        let report = tick(&h, local(13, 0)).await;
        assert_eq!(report.published.len(), 2);
        assert_eq!(h.sender.sent_ids().await, vec![scheduled, queued]);
    }

    #[tokio::test]
    async fn failed_send_keeps_state_and_continues() {
        let h = harness();
        let broken = create(&h, "broken", CreateTarget::Scheduled { at: local(9, 0) }).await;
        let fine = create(&h, "fine", CreateTarget::Scheduled { at: local(9, 30) }).await;
        h.sender.fail_for(broken).await;
        let mut events = h.service.event_bus().subscribe();

        let report = tick(&h, local(9, 45)).await;
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures.first().map(|f| f.post_id), Some(broken));
        assert_eq!(report.published.first().map(|p| p.post_id), Some(fine));
        assert_eq!(status(&h, broken).await, PostStatus::Scheduled);

        let Ok(event) = events.recv().await else {
            panic!("failure should be announced");
        };
        assert_eq!(event.event_type_str(), "publish_failed");

        // retried on the next tick
        let _ = tick(&h, local(9, 46)).await;
        assert_eq!(status(&h, broken).await, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn stalled_send_times_out() {
        let h = harness();
        let stuck = create(&h, "stuck", CreateTarget::Queue).await;
        h.sender.stall_for(stuck).await;

        let report = tick(&h, local(10, 0)).await;
        let Some(failure) = report.failures.first() else {
            panic!("timeout should be reported");
        };
        assert!(failure.reason.contains("timed out"));
        assert_eq!(status(&h, stuck).await, PostStatus::Queue);
        assert_eq!(report.slot, None);
    }

    #[tokio::test]
    async fn missing_channel_skips_whole_tick() {
        let h = harness_with(&[], 0);
        let scheduled = create(&h, "s", CreateTarget::Scheduled { at: local(9, 0) }).await;
        let queued = create(&h, "q", CreateTarget::Queue).await;

        let report = tick(&h, local(10, 0)).await;
        assert_eq!(report.skipped, Some(TickSkip::ChannelNotConfigured));
        assert!(h.sender.sent_ids().await.is_empty());
        assert_eq!(status(&h, scheduled).await, PostStatus::Scheduled);
        assert_eq!(status(&h, queued).await, PostStatus::Queue);
    }

    #[tokio::test]
    async fn repeated_tick_in_same_minute_fires_once() {
        let h = harness();
        let a = create(&h, "a", CreateTarget::Queue).await;
        create(&h, "b", CreateTarget::Queue).await;

        let first = tick(&h, local(16, 0)).await;
        let second = tick(&h, local(16, 0)).await;
        assert_eq!(first.published.len(), 1);
        assert!(second.is_idle());
        assert_eq!(h.sender.sent_ids().await, vec![a]);
    }

    #[tokio::test]
    async fn empty_queue_at_slot_is_a_no_op() {
        let h = harness();
        let report = tick(&h, local(10, 0)).await;
        assert!(report.is_idle());
        assert_eq!(report.skipped, None);
    }

    #[tokio::test]
    async fn catch_up_window_serves_late_tick_and_retries_failures() {
        let h = harness_with(&[(keys::CHANNEL_ID, "-1001")], 5);
        let a = create(&h, "a", CreateTarget::Queue).await;
        h.sender.fail_for(a).await;

        let failed = tick(&h, local(10, 2)).await;
        assert_eq!(failed.failures.len(), 1);

        let retry = tick(&h, local(10, 4)).await;
        assert_eq!(retry.failures.len(), 1, "slot stays unserved after a failure");

        let outside = tick(&h, local(10, 6)).await;
        assert!(outside.is_idle());
    }

    #[tokio::test]
    async fn ledger_forgets_previous_days() {
        let h = harness();
        create(&h, "a", CreateTarget::Queue).await;
        create(&h, "b", CreateTarget::Queue).await;

        let _ = tick(&h, local(10, 0)).await;
        let next_day = local(10, 0) + chrono::Duration::days(1);
        let report = tick(&h, next_day).await;
        assert_eq!(report.published.len(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let h = harness();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let _ = tx.send(());
        let shutdown = async {
            let _ = rx.await;
        };
        h.dispatcher.run(Duration::from_secs(3600), shutdown).await;
        assert_ok!(h.dispatcher.tick(local(3, 0)).await);
    }

    #[tokio::test]
    async fn delivered_but_unrecorded_post_is_not_sent_again() {
        let repo = Arc::new(FlakyRepository::default());
        let h = harness_over(
            Arc::clone(&repo) as Arc<dyn PostRepository>,
            &[(keys::CHANNEL_ID, "-1001")],
            0,
        );
        let id = create(&h, "kettle", CreateTarget::Scheduled { at: local(9, 0) }).await;
        let mut events = h.service.event_bus().subscribe();
        repo.fail_publish.store(true, Ordering::SeqCst);

        let first = tick(&h, local(9, 5)).await;
        assert!(first.failures.is_empty());
        assert_eq!(first.unrecorded.first().map(|u| u.post_id), Some(id));
        assert_eq!(status(&h, id).await, PostStatus::Scheduled);
        assert!(events.try_recv().is_err(), "no failure is announced");

        let still_down = tick(&h, local(9, 6)).await;
        assert_eq!(still_down.unrecorded.len(), 1);
        assert_eq!(h.sender.sent_ids().await, vec![id]);

        repo.fail_publish.store(false, Ordering::SeqCst);
        let recovered = tick(&h, local(9, 7)).await;
        assert_eq!(recovered.published.first().map(|p| p.post_id), Some(id));
        assert!(recovered.unrecorded.is_empty());
        assert_eq!(h.sender.sent_ids().await, vec![id]);
        assert_eq!(status(&h, id).await, PostStatus::Published);
    }

    #[tokio::test]
    async fn unrecorded_queue_front_still_serves_its_slot() {
        let repo = Arc::new(FlakyRepository::default());
        let h = harness_over(
            Arc::clone(&repo) as Arc<dyn PostRepository>,
            &[(keys::CHANNEL_ID, "-1001")],
            0,
        );
        let a = create(&h, "a", CreateTarget::Queue).await;
        create(&h, "b", CreateTarget::Queue).await;
        repo.fail_publish.store(true, Ordering::SeqCst);

        let at_slot = tick(&h, local(10, 0)).await;
        assert_eq!(at_slot.slot, SlotTime::new(10, 0).ok());
        assert_eq!(at_slot.unrecorded.len(), 1);

        let next_slot = tick(&h, local(13, 0)).await;
        assert_eq!(next_slot.slot, None, "front is held until it is recorded");
        assert_eq!(h.sender.sent_ids().await, vec![a]);
    }

    #[tokio::test]
    async fn failed_event_count_does_not_undo_publication() {
        let repo = Arc::new(FlakyRepository::default());
        let h = harness_over(
            Arc::clone(&repo) as Arc<dyn PostRepository>,
            &[(keys::CHANNEL_ID, "-1001")],
            0,
        );
        let a = create(&h, "a", CreateTarget::Queue).await;
        repo.fail_counts.store(true, Ordering::SeqCst);

        let report = tick(&h, local(10, 0)).await;
        assert_eq!(report.published.first().map(|p| p.post_id), Some(a));
        assert!(report.failures.is_empty());
        assert!(report.unrecorded.is_empty());
        assert_eq!(status(&h, a).await, PostStatus::Published);
    }

    #[tokio::test]
    async fn catch_up_window_crosses_midnight() {
        let h = harness_with(
            &[(keys::CHANNEL_ID, "-1001"), (keys::SCHEDULE_TIMES, "23:58")],
            5,
        );
        let a = create(&h, "a", CreateTarget::Queue).await;
        create(&h, "b", CreateTarget::Queue).await;

        let Some(after_midnight) = offset().with_ymd_and_hms(2026, 5, 5, 0, 1, 0).single() else {
            panic!("valid timestamp");
        };
        let report = tick(&h, after_midnight.with_timezone(&Utc)).await;
        assert_eq!(report.slot, SlotTime::new(23, 58).ok());
        assert_eq!(h.sender.sent_ids().await, vec![a]);

        let again = tick(&h, (after_midnight + chrono::Duration::minutes(1)).with_timezone(&Utc)).await;
        assert!(again.is_idle(), "yesterday's slot is served once");
    }

    #[tokio::test]
    async fn missing_sender_publishes_nothing() {
        let h = harness();
        let dispatcher = Dispatcher::without_sender(
            h.service.clone(),
            DispatcherConfig {
                send_timeout: Duration::from_millis(50),
                slot_catch_up_minutes: 0,
                utc_offset: offset(),
            },
        );
        let scheduled = create(&h, "s", CreateTarget::Scheduled { at: local(9, 0) }).await;

        let Ok(report) = dispatcher.tick(local(10, 0)).await else {
            panic!("tick should succeed");
        };
        assert_eq!(report.skipped, Some(TickSkip::SenderNotConfigured));
        assert_eq!(status(&h, scheduled).await, PostStatus::Scheduled);
    }
}
