//! Non-negative money amount stored in minor units.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::SchedulerError;

/// Placement price in minor currency units (two decimal places).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Price(u64);

impl Price {
    /// Free placement.
    pub const ZERO: Self = Self(0);

    /// Price from whole currency units.
    #[must_use]
    pub const fn from_major(units: u64) -> Self {
        Self(units.saturating_mul(100))
    }

    /// Price from minor units.
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor(self) -> u64 {
        self.0
    }

    /// Returns `true` for a free placement.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor) = (self.0 / 100, self.0 % 100);
        if minor == 0 {
            write!(f, "{major}")
        } else {
            write!(f, "{major}.{minor:02}")
        }
    }
}

impl FromStr for Price {
    type Err = SchedulerError;

    /// Accepts `500`, `500.5`, `500.50`, or `500,50`. Rejects signs,
    /// exponents, and more than two decimals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            SchedulerError::InvalidRequest(format!(
                "invalid price {s:?}: expected a non-negative amount"
            ))
        };
        let normalized = s.trim().replace(',', ".");
        let (major, minor) = normalized
            .split_once('.')
            .unwrap_or((normalized.as_str(), ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if major.is_empty() || !all_digits(major) || !all_digits(minor) || minor.len() > 2 {
            return Err(invalid());
        }
        let major: u64 = major.parse().map_err(|_| invalid())?;
        let minor: u64 = match minor.len() {
            0 => 0,
            1 => minor.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => minor.parse().map_err(|_| invalid())?,
        };
        major
            .checked_mul(100)
            .and_then(|m| m.checked_add(minor))
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
