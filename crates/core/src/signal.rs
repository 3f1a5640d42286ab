//! Outbound alerts and metric data points.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// A message for the operations channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricUnit {
    Count,
    None,
}

/// One metric value to emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDatum {
    pub name: String,
    pub value: Decimal,
    pub unit: MetricUnit,
}

impl MetricDatum {
    pub fn count(name: impl Into<String>, value: usize) -> Self {
        MetricDatum {
            name: name.into(),
            value: Decimal::from(value),
            unit: MetricUnit::Count,
        }
    }

    pub fn value(name: impl Into<String>, value: Decimal) -> Self {
        MetricDatum {
            name: name.into(),
            value,
            unit: MetricUnit::None,
        }
    }
}
