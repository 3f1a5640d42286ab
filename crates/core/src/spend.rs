//! Billing windows and spend observations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, UtcOffset};

/// A half-open `[start, end)` billing interval in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendWindow {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

impl SpendWindow {
    /// From UTC midnight of `now`'s day up to `now`.
    pub fn day_to_date(now: OffsetDateTime) -> Self {
        let now = now.to_offset(UtcOffset::UTC);
        SpendWindow {
            start: now.date().midnight().assume_utc(),
            end: now,
        }
    }

    /// From UTC midnight on the first of `now`'s month up to `now`.
    pub fn month_to_date(now: OffsetDateTime) -> Self {
        let now = now.to_offset(UtcOffset::UTC);
        let date = now.date();
        let first = date - Duration::days(i64::from(date.day()) - 1);
        SpendWindow {
            start: first.midnight().assume_utc(),
            end: now,
        }
    }
}

/// Spend-to-date for one window, as reported by the provider.
///
/// Recomputed on every check and never cached across invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendSnapshot {
    #[serde(with = "time::serde::rfc3339")]
    pub window_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub window_end: OffsetDateTime,
    pub amount: Decimal,
    pub currency: String,
}

impl SpendSnapshot {
    pub fn new(window: SpendWindow, amount: Decimal, currency: impl Into<String>) -> Self {
        SpendSnapshot {
            window_start: window.start,
            window_end: window.end,
            amount,
            currency: currency.into(),
        }
    }
}
