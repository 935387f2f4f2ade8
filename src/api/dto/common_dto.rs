//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Pagination window for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    pub per_page: u32,
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u32,
    /// Total number of pages.
    pub total_pages: u32,
}

/// Query parameter for endpoints returning the most recent `limit` items.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
pub struct LimitParams {
    /// Maximum number of items (1..=500). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub limit: u32,
}

impl LimitParams {
    /// Clamps `limit` to `1..=500`.
    #[must_use]
    pub fn clamped(self) -> u32 {
        self.limit.clamp(1, 500)
    }
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl PaginationParams {
    /// Builds clamped parameters from optional query values.
    #[must_use]
    pub fn from_parts(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or_else(default_page),
            per_page: per_page.unwrap_or_else(default_per_page),
        }
        .clamped()
    }

    /// Clamps `per_page` to the allowed maximum of 100.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 100),
        }
    }

    /// Cuts one page out of `items`.
    #[must_use]
    pub fn paginate<T>(&self, items: Vec<T>) -> (Vec<T>, PaginationMeta) {
        let total = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let total_pages = if total == 0 {
            0
        } else {
            total.div_ceil(self.per_page)
        };
        let start = usize::try_from((self.page - 1).saturating_mul(self.per_page))
            .unwrap_or(usize::MAX);
        let take = usize::try_from(self.per_page).unwrap_or(usize::MAX);
        let data = items.into_iter().skip(start).take(take).collect();
        (
            data,
            PaginationMeta {
                page: self.page,
                per_page: self.per_page,
                total,
                total_pages,
            },
        )
    }
}
