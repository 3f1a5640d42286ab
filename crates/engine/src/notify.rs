//! Notifier/Recorder: alerts and metrics after a run.
//!
//! Every method is fire-and-forget. A failing channel or sink is logged at
//! `warn` and otherwise ignored; it never affects the report or the caller.

use std::sync::Arc;

use costguard_core::{
    Alert, AlertConfig, AlertSeverity, MetricDatum, ShutdownReport, SpendSnapshot,
};
use costguard_provider::{AlertChannel, MetricsSink};
use rust_decimal::Decimal;

pub const SHUTDOWN_SUBJECT: &str = "CRITICAL: Emergency Shutdown Executed";
pub const BUDGET_WARNING_SUBJECT: &str = "WARNING: Budget Threshold Exceeded";

pub struct Notifier {
    alerts: Arc<dyn AlertChannel>,
    metrics: Arc<dyn MetricsSink>,
    topic: String,
    namespace: String,
}

impl Notifier {
    pub fn new(
        alerts: Arc<dyn AlertChannel>,
        metrics: Arc<dyn MetricsSink>,
        config: &AlertConfig,
    ) -> Self {
        Notifier {
            alerts,
            metrics,
            topic: config.topic.clone(),
            namespace: config.metrics_namespace.clone(),
        }
    }

    async fn publish(&self, alert: Alert) {
        if let Err(e) = self.alerts.publish(&self.topic, &alert).await {
            tracing::warn!(topic = %self.topic, subject = %alert.subject, error = %e, "alert publish failed");
        }
    }

    /// Tell operations a shutdown ran.
    pub async fn notify(&self, report: &ShutdownReport) {
        self.publish(shutdown_alert(report)).await;
    }

    /// Emit `EmergencyShutdowns`, `InstancesTerminated` and `HourlySavings`.
    pub async fn record_metrics(&self, report: &ShutdownReport) {
        let data = [
            MetricDatum::count("EmergencyShutdowns", 1),
            MetricDatum::count("InstancesTerminated", report.terminated_count),
            MetricDatum::value("HourlySavings", report.hourly_savings),
        ];
        if let Err(e) = self.metrics.put_metrics(&self.namespace, &data).await {
            tracing::warn!(namespace = %self.namespace, error = %e, "metrics emission failed");
        }
    }

    /// Warn that spend has passed advisory levels below the kill switch.
    pub async fn notify_budget_warning(
        &self,
        snapshot: &SpendSnapshot,
        limit: Decimal,
        levels: &[Decimal],
    ) {
        let Some(highest) = levels.iter().max() else {
            return;
        };
        let alert = Alert {
            severity: AlertSeverity::Warning,
            subject: BUDGET_WARNING_SUBJECT.to_string(),
            message: format!(
                "Spend {} {} has passed {}% of the {} {} limit.",
                snapshot.amount,
                snapshot.currency,
                (*highest * Decimal::ONE_HUNDRED).normalize(),
                limit,
                snapshot.currency
            ),
        };
        self.publish(alert).await;
    }
}

/// The operations alert for a finished shutdown.
pub fn shutdown_alert(report: &ShutdownReport) -> Alert {
    let mut message = format!(
        "EMERGENCY SHUTDOWN EXECUTED\n\n\
         Reason: {}\n\
         Status: {:?}\n\
         Instances Terminated: {}\n\
         Instances Stopped: {}\n\
         Hourly Savings: {}\n\
         Daily Savings: {}\n\
         Monthly Savings: {}\n",
        report.reason,
        report.status,
        report.terminated_count,
        report.stopped_count,
        report.hourly_savings,
        report.daily_savings,
        report.monthly_savings,
    );
    if report.failed_count > 0 || !report.failures.is_empty() {
        message.push_str(&format!(
            "Failures: {} (resources may still be billing)\n",
            report.failures.len()
        ));
    }
    message.push_str("\nAction Required: Review and acknowledge");
    Alert {
        severity: AlertSeverity::Critical,
        subject: SHUTDOWN_SUBJECT.to_string(),
        message,
    }
}
