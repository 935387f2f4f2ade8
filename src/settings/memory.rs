//! In-process settings store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{SettingEntry, SettingsStore, keys};
use crate::error::SchedulerError;

/// Settings kept in a `RwLock<BTreeMap>`; used when persistence is disabled
/// and in tests.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<BTreeMap<String, (String, DateTime<Utc>)>>,
}

impl MemorySettings {
    /// Creates an empty store; every read falls back to defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with `pairs`.
    #[must_use]
    pub fn with_values<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let now = Utc::now();
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), (v.to_string(), now)))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>, SchedulerError> {
        Ok(self.values.read().await.get(key).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SchedulerError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), Utc::now()));
        Ok(())
    }

    async fn all(&self) -> Result<Vec<SettingEntry>, SchedulerError> {
        Ok(self
            .values
            .read()
            .await
            .iter()
            .map(|(key, (value, updated_at))| SettingEntry {
                key: key.clone(),
                value: value.clone(),
                description: keys::description(key).map(str::to_string),
                updated_at: *updated_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_overwrites_in_place() {
        let store = MemorySettings::with_values([(keys::POSTS_PER_DAY, "5")]);
        assert_eq!(store.get(keys::POSTS_PER_DAY).await.ok().flatten().as_deref(), Some("5"));

        let _ = store.set(keys::POSTS_PER_DAY, "7").await;
        let all = store.all().await.unwrap_or_default();
        assert_eq!(all.len(), 1);
        assert_eq!(all.first().map(|e| e.value.as_str()), Some("7"));
        assert!(all.first().and_then(|e| e.description.as_ref()).is_some());
    }

    #[tokio::test]
    async fn missing_key_reads_none() {
        let store = MemorySettings::new();
        assert_eq!(store.get("nope").await.ok(), Some(None));
    }
}
