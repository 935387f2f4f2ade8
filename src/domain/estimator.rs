//! Publish-time estimation for queued posts.
//!
//! Advisory only: the dispatcher decides when a post actually goes out. The
//! estimate drifts when admins change the quota or slots, or when priority
//! posts jump ahead.

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::schedule::{PublishSchedule, SlotTime};

/// Estimated publication moment for one queue position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Estimate {
    /// Whole days after `today`.
    pub day_offset: u32,
    /// 0-based index of the post within its day.
    pub index_within_day: u32,
    /// Slot the post lands in.
    pub slot: SlotTime,
    /// Local wall-clock publish moment.
    pub at: NaiveDateTime,
}

/// Estimates when the post at 1-based `position` publishes.
///
/// Overflow (quota larger than the slot list) falls back to the last slot.
/// Returns `None` for position 0 or an empty slot list.
#[must_use]
pub fn estimate_publish_time(
    position: u32,
    schedule: &PublishSchedule,
    today: NaiveDate,
) -> Option<Estimate> {
    let zero_based = position.checked_sub(1)?;
    let per_day = schedule.posts_per_day().max(1);
    let day_offset = zero_based / per_day;
    let index_within_day = zero_based % per_day;

    let slots = schedule.slots();
    let slot = usize::try_from(index_within_day)
        .ok()
        .and_then(|i| slots.get(i))
        .or_else(|| slots.last())
        .copied()?;

    let date = today.checked_add_days(Days::new(u64::from(day_offset)))?;
    Some(Estimate {
        day_offset,
        index_within_day,
        slot,
        at: date.and_time(slot.as_time()),
    })
}

/// Estimated date of the post at the back of a queue of `queue_len` posts.
#[must_use]
pub fn last_publish_date(
    queue_len: u32,
    schedule: &PublishSchedule,
    today: NaiveDate,
) -> Option<NaiveDate> {
    estimate_publish_time(queue_len, schedule, today).map(|e| e.at.date())
}
