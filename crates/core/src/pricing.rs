//! Injectable pricing table and savings arithmetic.
//!
//! Rates are `rust_decimal::Decimal`; no `f64` touches money.

use std::collections::BTreeMap;
use std::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceKind};

/// Hours in a billing day.
pub const HOURS_PER_DAY: u32 = 24;
/// Days in a billing month, as the savings estimate counts them.
pub const DAYS_PER_MONTH: u32 = 30;

/// Type-class → hourly rate, with an explicit rate for unknown classes.
///
/// The default rate must be non-zero: assuming an unknown instance is free
/// would understate the cost of leaving it running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingTable {
    pub hourly: BTreeMap<String, Decimal>,
    pub default_hourly: Decimal,
    /// Monthly storage rate per GB for volumes.
    pub volume_gb_month: Decimal,
    /// Monthly storage rate per GB for snapshots.
    pub snapshot_gb_month: Decimal,
}

impl Default for PricingTable {
    fn default() -> Self {
        let hourly = [
            ("m5.2xlarge", Decimal::new(384, 3)),
            ("m5.xlarge", Decimal::new(192, 3)),
            ("t3.large", Decimal::new(832, 4)),
            ("t3.medium", Decimal::new(416, 4)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        PricingTable {
            hourly,
            default_hourly: Decimal::new(10, 2),
            volume_gb_month: Decimal::new(10, 2),
            snapshot_gb_month: Decimal::new(5, 2),
        }
    }
}

impl PricingTable {
    /// A table with no known classes, pricing everything at `default_hourly`.
    pub fn flat(default_hourly: Decimal) -> Self {
        PricingTable {
            hourly: BTreeMap::new(),
            default_hourly,
            ..PricingTable::default()
        }
    }

    pub fn with_rate(mut self, type_class: impl Into<String>, hourly: Decimal) -> Self {
        self.hourly.insert(type_class.into(), hourly);
        self
    }

    /// Hourly rate for `type_class`, or the conservative default.
    pub fn hourly_rate(&self, type_class: &str) -> Decimal {
        self.hourly
            .get(type_class)
            .copied()
            .unwrap_or(self.default_hourly)
    }

    /// Monthly storage cost of a volume or snapshot; zero for other kinds or
    /// when the provider did not report a size.
    pub fn storage_monthly_cost(&self, resource: &Resource) -> Decimal {
        let size = Decimal::from(resource.size_gb.unwrap_or(0));
        match resource.kind {
            ResourceKind::Volume => size * self.volume_gb_month,
            ResourceKind::Snapshot => size * self.snapshot_gb_month,
            ResourceKind::ComputeInstance | ResourceKind::SpotRequest => Decimal::ZERO,
        }
    }
}

/// Estimated savings from halting compute, at three horizons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Savings {
    pub hourly: Decimal,
    pub daily: Decimal,
    pub monthly: Decimal,
}

impl Savings {
    /// Expand an hourly rate: daily = hourly × 24, monthly = daily × 30.
    pub fn from_hourly(hourly: Decimal) -> Self {
        let daily = hourly * Decimal::from(HOURS_PER_DAY);
        Savings {
            hourly,
            daily,
            monthly: daily * Decimal::from(DAYS_PER_MONTH),
        }
    }
}

impl Add for Savings {
    type Output = Savings;

    fn add(self, rhs: Savings) -> Savings {
        Savings {
            hourly: self.hourly + rhs.hourly,
            daily: self.daily + rhs.daily,
            monthly: self.monthly + rhs.monthly,
        }
    }
}

impl std::iter::Sum for Savings {
    fn sum<I: Iterator<Item = Savings>>(iter: I) -> Self {
        iter.fold(Savings::default(), Add::add)
    }
}
