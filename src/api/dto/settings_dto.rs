//! Settings request/response DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::settings::{SettingChange, SettingEntry};

/// Typed values the engine is currently running with.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EffectiveSettingsDto {
    /// Queue posts per day.
    pub posts_per_day: u32,
    /// Publication slots, `HH:MM`.
    pub schedule_times: Vec<String>,
    /// Queue placement price.
    pub queue_price: String,
    /// Priority placement price.
    pub priority_price: String,
    /// Duplicate threshold in percent.
    pub duplicate_threshold: f64,
    /// Broadcast channel.
    pub channel_id: Option<String>,
}

/// `GET /api/v1/settings` response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingsResponse {
    /// Stored raw entries.
    pub entries: Vec<SettingEntry>,
    /// Parsed values with defaults applied.
    pub effective: EffectiveSettingsDto,
}

/// Request body for `PUT /api/v1/settings/schedule`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateScheduleRequest {
    /// Admin performing the change.
    pub admin_id: i64,
    /// New daily quota (1..=50).
    pub posts_per_day: Option<u32>,
    /// New slot list, e.g. `"10:00, 14:00, 18:00"`.
    pub schedule_times: Option<String>,
}

/// Request body for `PUT /api/v1/settings/prices`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePricesRequest {
    /// Admin performing the change.
    pub admin_id: i64,
    /// New queue price, decimal string.
    pub queue_price: Option<String>,
    /// New priority price, decimal string.
    pub priority_price: Option<String>,
}

/// Request body for `PUT /api/v1/settings/channel`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateChannelRequest {
    /// Admin performing the change.
    pub admin_id: i64,
    /// Broadcast channel id.
    pub channel_id: String,
    /// Public username, with or without `@`.
    pub username: Option<String>,
}

/// Request body for `PUT /api/v1/settings/duplicate-threshold`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateThresholdRequest {
    /// Admin performing the change.
    pub admin_id: i64,
    /// Similarity percent (0..=100).
    pub threshold: f64,
}

/// One applied change.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingChangeDto {
    /// Changed key.
    pub key: String,
    /// Previous value.
    pub old: Option<String>,
    /// New value.
    pub new: String,
}

/// Applied changes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingChangesResponse {
    /// Changes in application order.
    pub changes: Vec<SettingChangeDto>,
}

impl From<Vec<SettingChange>> for SettingChangesResponse {
    fn from(changes: Vec<SettingChange>) -> Self {
        Self {
            changes: changes
                .into_iter()
                .map(|c| SettingChangeDto {
                    key: c.key.to_string(),
                    old: c.old,
                    new: c.new,
                })
                .collect(),
        }
    }
}
