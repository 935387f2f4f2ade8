//! Operational settings: the injected key-value provider and its typed view.
//!
//! The engine never reads a global settings table. A [`SettingsStore`] is
//! passed in at construction; [`Settings`] wraps it with typed, defaulted
//! accessors and the validated setters the admin surface calls.

pub mod memory;
pub mod price;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::duplicate::DEFAULT_DUPLICATE_THRESHOLD;
use crate::domain::schedule::{format_slot_list, parse_slot_list};
use crate::domain::{PublishSchedule, SlotTime};
use crate::error::SchedulerError;

pub use memory::MemorySettings;
pub use price::Price;

/// Setting keys and their defaults.
pub mod keys {
    /// Queue posts published per day.
    pub const POSTS_PER_DAY: &str = "posts_per_day";
    /// Comma-separated `HH:MM` publication slots.
    pub const SCHEDULE_TIMES: &str = "schedule_times";
    /// Price of a queue placement.
    pub const QUEUE_PRICE: &str = "queue_price";
    /// Price of a priority placement.
    pub const PRIORITY_PRICE: &str = "priority_price";
    /// Duplicate similarity threshold in percent.
    pub const DUPLICATE_THRESHOLD: &str = "duplicate_threshold";
    /// Broadcast channel id the dispatcher sends to.
    pub const CHANNEL_ID: &str = "channel_id";
    /// Public username of the broadcast channel.
    pub const CHANNEL_USERNAME: &str = "channel_username";

    /// Default for [`POSTS_PER_DAY`].
    pub const DEFAULT_POSTS_PER_DAY: &str = "5";
    /// Default for [`SCHEDULE_TIMES`].
    pub const DEFAULT_SCHEDULE_TIMES: &str = "10:00,13:00,16:00,19:00,22:00";
    /// Default for [`QUEUE_PRICE`].
    pub const DEFAULT_QUEUE_PRICE: &str = "0";
    /// Default for [`PRIORITY_PRICE`].
    pub const DEFAULT_PRIORITY_PRICE: &str = "500";

    /// Human-readable description stored next to each key.
    #[must_use]
    pub fn description(key: &str) -> Option<&'static str> {
        match key {
            POSTS_PER_DAY => Some("Queue posts published per day"),
            SCHEDULE_TIMES => Some("Daily publication times, HH:MM, comma-separated"),
            QUEUE_PRICE => Some("Price of a queue placement"),
            PRIORITY_PRICE => Some("Price of a priority placement"),
            DUPLICATE_THRESHOLD => Some("Similarity percent at which a post is a duplicate"),
            CHANNEL_ID => Some("Broadcast channel id"),
            CHANNEL_USERNAME => Some("Broadcast channel username"),
            _ => None,
        }
    }
}

/// Upper bound for the daily queue quota.
pub const MAX_POSTS_PER_DAY: u32 = 50;

/// One stored setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SettingEntry {
    /// Setting key.
    pub key: String,
    /// Raw string value.
    pub value: String,
    /// Optional description.
    pub description: Option<String>,
    /// Last overwrite.
    pub updated_at: DateTime<Utc>,
}

/// Key-value provider for operational settings. Values are strings; the
/// typed parsing lives in [`Settings`].
#[async_trait]
pub trait SettingsStore: Send + Sync + std::fmt::Debug {
    /// Reads a raw value.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn get(&self, key: &str) -> Result<Option<String>, SchedulerError>;

    /// Overwrites a value in place (no history).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn set(&self, key: &str, value: &str) -> Result<(), SchedulerError>;

    /// Lists every stored setting ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    async fn all(&self) -> Result<Vec<SettingEntry>, SchedulerError>;
}

/// Result of a validated settings change, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingChange {
    /// Changed key.
    pub key: &'static str,
    /// Previous raw value, if any.
    pub old: Option<String>,
    /// New raw value.
    pub new: String,
}

/// Typed view over a [`SettingsStore`].
#[derive(Debug, Clone)]
pub struct Settings {
    store: Arc<dyn SettingsStore>,
}

impl Settings {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    /// Raw read with a default.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn get_or(&self, key: &str, default: &str) -> Result<String, SchedulerError> {
        Ok(self
            .store
            .get(key)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Daily queue quota, at least 1.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn posts_per_day(&self) -> Result<u32, SchedulerError> {
        let raw = self
            .get_or(keys::POSTS_PER_DAY, keys::DEFAULT_POSTS_PER_DAY)
            .await?;
        Ok(match raw.trim().parse::<u32>() {
            Ok(n) if n >= 1 => n,
            _ => {
                tracing::warn!(value = %raw, "malformed posts_per_day setting, using default");
                5
            }
        })
    }

    /// Configured slots, sorted and deduplicated. Malformed entries are
    /// skipped; if nothing valid remains the default slots are used.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn schedule_times(&self) -> Result<Vec<SlotTime>, SchedulerError> {
        let raw = self
            .get_or(keys::SCHEDULE_TIMES, keys::DEFAULT_SCHEDULE_TIMES)
            .await?;
        let mut slots = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match entry.parse::<SlotTime>() {
                Ok(slot) => slots.push(slot),
                Err(_) => tracing::warn!(entry, "skipping malformed schedule time"),
            }
        }
        if slots.is_empty() {
            tracing::warn!(value = %raw, "no usable schedule times, using defaults");
            slots = parse_slot_list(keys::DEFAULT_SCHEDULE_TIMES)?;
        }
        slots.sort_unstable();
        slots.dedup();
        Ok(slots)
    }

    /// Quota plus slots in one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn publish_schedule(&self) -> Result<PublishSchedule, SchedulerError> {
        let posts_per_day = self.posts_per_day().await?;
        let slots = self.schedule_times().await?;
        Ok(PublishSchedule::new(posts_per_day, slots))
    }

    /// Price of a queue placement.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn queue_price(&self) -> Result<Price, SchedulerError> {
        self.price(keys::QUEUE_PRICE, keys::DEFAULT_QUEUE_PRICE)
            .await
    }

    /// Price of a priority placement.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn priority_price(&self) -> Result<Price, SchedulerError> {
        self.price(keys::PRIORITY_PRICE, keys::DEFAULT_PRIORITY_PRICE)
            .await
    }

    async fn price(&self, key: &str, default: &str) -> Result<Price, SchedulerError> {
        let raw = self.get_or(key, default).await?;
        match raw.parse::<Price>() {
            Ok(price) => Ok(price),
            Err(_) => {
                tracing::warn!(key, value = %raw, "malformed price setting, using default");
                default.parse()
            }
        }
    }

    /// Duplicate threshold in `0..=100`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn duplicate_threshold(&self) -> Result<f64, SchedulerError> {
        let Some(raw) = self.store.get(keys::DUPLICATE_THRESHOLD).await? else {
            return Ok(DEFAULT_DUPLICATE_THRESHOLD);
        };
        Ok(match raw.trim().parse::<f64>() {
            Ok(t) if (0.0..=100.0).contains(&t) => t,
            _ => {
                tracing::warn!(value = %raw, "malformed duplicate_threshold, using default");
                DEFAULT_DUPLICATE_THRESHOLD
            }
        })
    }

    /// Target channel, `None` when unset or blank.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PersistenceError`] on store failure.
    pub async fn channel_id(&self) -> Result<Option<String>, SchedulerError> {
        Ok(self
            .store
            .get(keys::CHANNEL_ID)
            .await?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    /// Sets the daily quota (`1..=50`).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] when out of range.
    pub async fn set_posts_per_day(&self, count: u32) -> Result<SettingChange, SchedulerError> {
        if !(1..=MAX_POSTS_PER_DAY).contains(&count) {
            return Err(SchedulerError::InvalidRequest(format!(
                "posts per day must be between 1 and {MAX_POSTS_PER_DAY}"
            )));
        }
        self.replace(keys::POSTS_PER_DAY, count.to_string()).await
    }

    /// Replaces the slot list from admin input (`"10:00, 14:00"`); stored
    /// sorted.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] for malformed, empty, or
    /// duplicated times.
    pub async fn set_schedule_times(&self, input: &str) -> Result<SettingChange, SchedulerError> {
        let slots = parse_slot_list(input)?;
        self.replace(keys::SCHEDULE_TIMES, format_slot_list(&slots))
            .await
    }

    /// Sets the queue placement price.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] for a negative or
    /// malformed amount.
    pub async fn set_queue_price(&self, input: &str) -> Result<SettingChange, SchedulerError> {
        let price: Price = input.parse()?;
        self.replace(keys::QUEUE_PRICE, price.to_string()).await
    }

    /// Sets the priority placement price.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] for a negative or
    /// malformed amount.
    pub async fn set_priority_price(&self, input: &str) -> Result<SettingChange, SchedulerError> {
        let price: Price = input.parse()?;
        self.replace(keys::PRIORITY_PRICE, price.to_string()).await
    }

    /// Sets the duplicate threshold (`0..=100`).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] when out of range.
    pub async fn set_duplicate_threshold(
        &self,
        threshold: f64,
    ) -> Result<SettingChange, SchedulerError> {
        if !(0.0..=100.0).contains(&threshold) {
            return Err(SchedulerError::InvalidRequest(
                "duplicate threshold must be between 0 and 100".to_string(),
            ));
        }
        self.replace(keys::DUPLICATE_THRESHOLD, threshold.to_string())
            .await
    }

    /// Points the dispatcher at a broadcast channel.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidRequest`] for a blank channel id.
    pub async fn set_channel(
        &self,
        channel_id: &str,
        username: Option<&str>,
    ) -> Result<Vec<SettingChange>, SchedulerError> {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return Err(SchedulerError::InvalidRequest(
                "channel id must not be empty".to_string(),
            ));
        }
        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(channel_id)
            .trim_start_matches('@')
            .to_string();
        Ok(vec![
            self.replace(keys::CHANNEL_ID, channel_id.to_string())
                .await?,
            self.replace(keys::CHANNEL_USERNAME, username).await?,
        ])
    }

    async fn replace(
        &self,
        key: &'static str,
        value: String,
    ) -> Result<SettingChange, SchedulerError> {
        let old = self.store.get(key).await?;
        self.store.set(key, &value).await?;
        tracing::info!(key, old = ?old, new = %value, "setting updated");
        Ok(SettingChange {
            key,
            old,
            new: value,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::new(Arc::new(MemorySettings::new()))
    }

    #[tokio::test]
    async fn defaults_apply_when_unset() {
        let s = settings();
        assert_eq!(s.posts_per_day().await.ok(), Some(5));
        let Ok(schedule) = s.publish_schedule().await else {
            panic!("schedule expected");
        };
        assert_eq!(schedule.slots().len(), 5);
        assert_eq!(s.priority_price().await.ok(), Some(Price::from_major(500)));
        assert_eq!(s.queue_price().await.ok(), Some(Price::ZERO));
        assert_eq!(s.channel_id().await.ok(), Some(None));
    }

    #[tokio::test]
    async fn malformed_values_fall_back() {
        let s = settings();
        let _ = s.store().set(keys::POSTS_PER_DAY, "zero").await;
        let _ = s.store().set(keys::SCHEDULE_TIMES, "10:00, nope, 09:30").await;
        let _ = s.store().set(keys::DUPLICATE_THRESHOLD, "250").await;

        assert_eq!(s.posts_per_day().await.ok(), Some(5));
        let Ok(slots) = s.schedule_times().await else {
            panic!("slots expected");
        };
        let rendered: Vec<String> = slots.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["09:30", "10:00"]);
        assert_eq!(s.duplicate_threshold().await.ok(), Some(80.0));
    }

    #[tokio::test]
    async fn setters_validate_and_report_old_value() {
        let s = settings();
        assert!(s.set_posts_per_day(0).await.is_err());
        assert!(s.set_posts_per_day(51).await.is_err());

        let Ok(change) = s.set_posts_per_day(3).await else {
            panic!("valid quota");
        };
        assert_eq!(change.old, None);
        assert_eq!(change.new, "3");

        let Ok(change) = s.set_posts_per_day(4).await else {
            panic!("valid quota");
        };
        assert_eq!(change.old.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn schedule_is_stored_sorted() {
        let s = settings();
        let Ok(change) = s.set_schedule_times("18:00, 9:00").await else {
            panic!("valid schedule");
        };
        assert_eq!(change.new, "09:00, 18:00");
        assert!(s.set_schedule_times("09:00, 09:00").await.is_err());
    }

    #[tokio::test]
    async fn negative_price_is_rejected() {
        let s = settings();
        assert!(s.set_priority_price("-1").await.is_err());
        let Ok(change) = s.set_priority_price("749.50").await else {
            panic!("valid price");
        };
        assert_eq!(change.new, "749.50");
    }

    #[tokio::test]
    async fn channel_username_defaults_to_id() {
        let s = settings();
        assert!(s.set_channel("  ", None).await.is_err());
        let Ok(changes) = s.set_channel("-100123", Some("@deals")).await else {
            panic!("valid channel");
        };
        assert_eq!(changes.len(), 2);
        assert_eq!(s.channel_id().await.ok(), Some(Some("-100123".to_string())));
        assert_eq!(
            s.store().get(keys::CHANNEL_USERNAME).await.ok().flatten(),
            Some("deals".to_string())
        );
    }
}
