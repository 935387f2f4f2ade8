//! Daily publication slots.
//!
//! A [`SlotTime`] is one configured `HH:MM` wall-clock time. A
//! [`PublishSchedule`] bundles the sorted, deduplicated slot list with the
//! posts-per-day quota the estimator and dispatcher work from.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SchedulerError;

/// A daily `HH:MM` publication slot (minute granularity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime {
    hour: u8,
    minute: u8,
}

impl SlotTime {
    /// Creates a slot, validating the 24h clock range.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] when `hour > 23` or
    /// `minute > 59`.
    pub fn new(hour: u8, minute: u8) -> Result<Self, SchedulerError> {
        if hour > 23 || minute > 59 {
            return Err(SchedulerError::InvalidRequest(format!(
                "invalid slot time {hour}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// Truncates a wall-clock time to its minute slot.
    #[must_use]
    pub fn from_time(time: NaiveTime) -> Self {
        // chrono guarantees hour < 24 and minute < 60
        #[allow(clippy::cast_possible_truncation)]
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    /// Hour component.
    #[must_use]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    /// Minute component.
    #[must_use]
    pub const fn minute(self) -> u8 {
        self.minute
    }

    /// The slot as a wall-clock time at second zero.
    #[must_use]
    pub fn as_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for SlotTime {
    type Err = SchedulerError;

    /// Parses `H:MM` or `HH:MM` on a 24h clock.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchedulerError::InvalidRequest(format!("invalid time format: {s:?}"));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses a comma-separated slot list strictly: every entry must be a
/// valid time, at least one entry is required, and duplicates are rejected.
/// The result is sorted.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidRequest`] on any malformed, missing, or
/// repeated entry.
pub fn parse_slot_list(input: &str) -> Result<Vec<SlotTime>, SchedulerError> {
    let mut slots = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<SlotTime>, _>>()?;
    if slots.is_empty() {
        return Err(SchedulerError::InvalidRequest(
            "at least one publication time is required".to_string(),
        ));
    }
    let before = slots.len();
    slots.sort_unstable();
    slots.dedup();
    if slots.len() != before {
        return Err(SchedulerError::InvalidRequest(
            "publication times must be unique".to_string(),
        ));
    }
    Ok(slots)
}

/// Renders a slot list the way it is stored in settings.
#[must_use]
pub fn format_slot_list(slots: &[SlotTime]) -> String {
    slots
        .iter()
        .map(SlotTime::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Posts-per-day quota plus the ordered daily slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishSchedule {
    posts_per_day: u32,
    slots: Vec<SlotTime>,
}

impl PublishSchedule {
    /// Builds a schedule; slots are sorted and deduplicated, a zero quota is
    /// raised to one.
    #[must_use]
    pub fn new(posts_per_day: u32, mut slots: Vec<SlotTime>) -> Self {
        slots.sort_unstable();
        slots.dedup();
        Self {
            posts_per_day: posts_per_day.max(1),
            slots,
        }
    }

    /// Daily queue quota (at least 1).
    #[must_use]
    pub const fn posts_per_day(&self) -> u32 {
        self.posts_per_day
    }

    /// Chronologically sorted slots.
    #[must_use]
    pub fn slots(&self) -> &[SlotTime] {
        &self.slots
    }

    /// Returns `true` when `slot` is one of the configured times.
    #[must_use]
    pub fn contains(&self, slot: SlotTime) -> bool {
        self.slots.binary_search(&slot).is_ok()
    }
}
