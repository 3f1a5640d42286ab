//! Alert channels and metric sinks that log or record instead of calling out.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use costguard_core::{Alert, AlertSeverity, MetricDatum};

use crate::error::ProviderError;
use crate::traits::{AlertChannel, MetricsSink};

/// Writes alerts to the tracing log. Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertChannel;

#[async_trait]
impl AlertChannel for LogAlertChannel {
    async fn publish(&self, topic: &str, alert: &Alert) -> Result<(), ProviderError> {
        match alert.severity {
            AlertSeverity::Critical => {
                tracing::error!(topic, subject = %alert.subject, "{}", alert.message)
            }
            AlertSeverity::Warning => {
                tracing::warn!(topic, subject = %alert.subject, "{}", alert.message)
            }
        }
        Ok(())
    }
}

/// Writes metric data points to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMetricsSink;

#[async_trait]
impl MetricsSink for LogMetricsSink {
    async fn put_metrics(
        &self,
        namespace: &str,
        data: &[MetricDatum],
    ) -> Result<(), ProviderError> {
        for datum in data {
            tracing::info!(
                namespace,
                metric = %datum.name,
                value = %datum.value,
                unit = ?datum.unit,
                "metric"
            );
        }
        Ok(())
    }
}

/// Keeps published alerts in memory; optionally fails every publish.
#[derive(Debug, Default)]
pub struct RecordingAlertChannel {
    alerts: Mutex<Vec<(String, Alert)>>,
    failing: bool,
}

impl RecordingAlertChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose every publish fails with `Unavailable`.
    pub fn failing() -> Self {
        RecordingAlertChannel {
            alerts: Mutex::default(),
            failing: true,
        }
    }

    /// Alerts published so far, with their topics.
    pub fn published(&self) -> Vec<(String, Alert)> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AlertChannel for RecordingAlertChannel {
    async fn publish(&self, topic: &str, alert: &Alert) -> Result<(), ProviderError> {
        if self.failing {
            return Err(ProviderError::Unavailable("alert channel down".to_string()));
        }
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic.to_string(), alert.clone()));
        Ok(())
    }
}

/// Keeps emitted metrics in memory; optionally fails every call.
#[derive(Debug, Default)]
pub struct RecordingMetricsSink {
    data: Mutex<Vec<(String, MetricDatum)>>,
    failing: bool,
}

impl RecordingMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        RecordingMetricsSink {
            data: Mutex::default(),
            failing: true,
        }
    }

    /// Metrics emitted so far, with their namespaces.
    pub fn emitted(&self) -> Vec<(String, MetricDatum)> {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent value emitted under `name`.
    pub fn latest(&self, name: &str) -> Option<MetricDatum> {
        self.emitted()
            .into_iter()
            .rev()
            .find(|(_, d)| d.name == name)
            .map(|(_, d)| d)
    }
}

#[async_trait]
impl MetricsSink for RecordingMetricsSink {
    async fn put_metrics(
        &self,
        namespace: &str,
        data: &[MetricDatum],
    ) -> Result<(), ProviderError> {
        if self.failing {
            return Err(ProviderError::Unavailable("metrics sink down".to_string()));
        }
        let mut stored = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        stored.extend(data.iter().map(|d| (namespace.to_string(), d.clone())));
        Ok(())
    }
}
