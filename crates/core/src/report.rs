//! Escalation vocabulary and run reports.
//!
//! A [`ShutdownReport`] is written once per escalation run and then handed to
//! notification, metrics and the outbound response unchanged.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::verdict::ComplianceVerdict;

// ──────────────────────────────────────────────
// Triggers and reasons
// ──────────────────────────────────────────────

/// Reason recorded when the interactive CLI confirms an emergency shutdown.
pub const MANUAL_EMERGENCY_REASON: &str = "MANUAL_EMERGENCY";
/// Reason recorded when the billing API cannot be reached.
pub const COST_API_UNAVAILABLE_REASON: &str = "COST_API_UNAVAILABLE";
/// Reason recorded when month-to-date spend crosses the shutdown threshold.
pub const MONTHLY_BUDGET_BREACH_REASON: &str = "MONTHLY_BUDGET_BREACH";
/// Reason recorded for excess instances stopped by the limit enforcer.
pub const INSTANCE_LIMIT_REASON: &str = "INSTANCE_LIMIT";
/// Reason recorded for terminations driven by the tag policy.
pub const TAG_ENFORCEMENT_REASON: &str = "TAG_ENFORCEMENT";

/// Where a shutdown request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerSource {
    BudgetBreach,
    Alarm,
    #[default]
    Manual,
    Schedule,
}

impl TriggerSource {
    /// The reason string embedded in the shutdown report.
    pub fn reason(&self) -> &'static str {
        match self {
            TriggerSource::BudgetBreach => "BUDGET_BREACH",
            TriggerSource::Alarm => "ALARM_TRIGGERED",
            TriggerSource::Manual => "MANUAL_TRIGGER",
            TriggerSource::Schedule => "SCHEDULED_SHUTDOWN",
        }
    }

    /// Map an event source string, treating anything unrecognised as manual.
    ///
    /// Accepts both the kebab-case names and the provider event sources
    /// (`aws.budgets`, `aws.cloudwatch`, `aws.events`).
    pub fn from_event_source(source: &str) -> Self {
        source.parse().unwrap_or_default()
    }
}

impl FromStr for TriggerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "budget-breach" | "aws.budgets" => Ok(TriggerSource::BudgetBreach),
            "alarm" | "aws.cloudwatch" => Ok(TriggerSource::Alarm),
            "manual" => Ok(TriggerSource::Manual),
            "schedule" | "aws.events" => Ok(TriggerSource::Schedule),
            other => Err(format!("unknown trigger source '{}'", other)),
        }
    }
}

// ──────────────────────────────────────────────
// Escalation vocabulary
// ──────────────────────────────────────────────

/// The terminal outcome a caller wants for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredAction {
    Stop,
    Terminate,
    /// Terminate a resource already mid-transition, without any stop rung.
    ForceTerminate,
}

/// One rung of the escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LadderStep {
    Stop,
    ForceStop,
    Terminate,
    /// Chunked terminate of an ID list, used when inventory is unreachable.
    BatchTerminate,
}

impl fmt::Display for LadderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LadderStep::Stop => "stop",
            LadderStep::ForceStop => "force_stop",
            LadderStep::Terminate => "terminate",
            LadderStep::BatchTerminate => "batch_terminate",
        };
        f.write_str(s)
    }
}

/// Where a resource ended up after its ladder ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Terminated,
    /// Stopped, or force-stopped as the fallback for a failed terminate.
    Stopped,
    /// The provider no longer knows the resource.
    Missing,
    /// Every rung failed; the resource may still be billing.
    Failed,
}

/// One rung attempted for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepAttempt {
    pub step: LadderStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-resource trace of the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOutcome {
    pub resource_id: String,
    pub type_class: Option<String>,
    pub desired: DesiredAction,
    pub disposition: Disposition,
    pub attempts: Vec<StepAttempt>,
}

impl ResourceOutcome {
    /// The rung that succeeded, if any.
    pub fn final_step(&self) -> Option<LadderStep> {
        self.attempts
            .iter()
            .rev()
            .find(|a| a.error.is_none())
            .map(|a| a.step)
    }
}

/// A side effect that failed and was isolated from the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    pub resource_id: String,
    pub action: String,
    pub message: String,
}

impl ActionFailure {
    pub fn new(
        resource_id: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ActionFailure {
            resource_id: resource_id.into(),
            action: action.into(),
            message: message.into(),
        }
    }
}

// ──────────────────────────────────────────────
// ShutdownReport
// ──────────────────────────────────────────────

/// Overall health of an escalation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Every targeted resource reached a halted disposition.
    Complete,
    /// At least one resource or cleanup action failed.
    Partial,
    /// Inventory was unreachable; only the last-known ID list was acted on.
    Degraded,
}

/// Result of one escalation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    pub reason: String,
    pub status: ReportStatus,
    pub terminated_count: usize,
    pub stopped_count: usize,
    pub failed_count: usize,
    pub spot_requests_cancelled: usize,
    pub volumes_deleted: usize,
    pub hourly_savings: Decimal,
    pub daily_savings: Decimal,
    pub monthly_savings: Decimal,
    /// Monthly storage cost removed by deleting volumes.
    pub storage_monthly_savings: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub outcomes: Vec<ResourceOutcome>,
    #[serde(default)]
    pub failures: Vec<ActionFailure>,
}

impl ShutdownReport {
    /// An empty, complete report.
    pub fn new(reason: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        ShutdownReport {
            reason: reason.into(),
            status: ReportStatus::Complete,
            terminated_count: 0,
            stopped_count: 0,
            failed_count: 0,
            spot_requests_cancelled: 0,
            volumes_deleted: 0,
            hourly_savings: Decimal::ZERO,
            daily_savings: Decimal::ZERO,
            monthly_savings: Decimal::ZERO,
            storage_monthly_savings: Decimal::ZERO,
            timestamp,
            outcomes: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Number of resources whose compute billing was halted.
    pub fn halted_count(&self) -> usize {
        self.terminated_count + self.stopped_count
    }

    pub fn is_degraded(&self) -> bool {
        self.status == ReportStatus::Degraded
    }
}

// ──────────────────────────────────────────────
// Run results
// ──────────────────────────────────────────────

/// Result of a scheduled spend check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendCheckResult {
    /// `None` when the billing API was unreachable.
    pub current_daily_spend: Option<Decimal>,
    pub daily_limit: Decimal,
    pub utilization_percentage: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_monthly_spend: Option<Decimal>,
    pub monthly_limit: Decimal,
    pub breach: bool,
    /// Advisory alert fractions the daily spend has passed.
    #[serde(default)]
    pub alert_levels_crossed: Vec<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown: Option<ShutdownReport>,
}

/// Result of one tag enforcement sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEnforcementSummary {
    pub violations_found: usize,
    pub instances_tagged: usize,
    pub instances_terminated: usize,
    pub volumes_tagged: usize,
    pub volumes_deleted: usize,
    pub snapshots_deleted: usize,
    pub estimated_monthly_savings: Decimal,
    pub verdicts: Vec<ComplianceVerdict>,
    pub failures: Vec<ActionFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<ShutdownReport>,
}

/// Result of enforcing the concurrent instance cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitEnforcementResult {
    pub running_count: usize,
    pub max_instances: usize,
    pub excess_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<ShutdownReport>,
}

/// `{status_code, body}` envelope returned to whatever invoked a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

impl RunResponse {
    pub fn new(status_code: u16, body: serde_json::Value) -> Self {
        RunResponse { status_code, body }
    }

    /// Serialize `body` into a 200 response; serialization failures become a 500.
    pub fn ok<T: Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => RunResponse::new(200, value),
            Err(e) => RunResponse::new(
                500,
                serde_json::json!({ "error": format!("serialization error: {}", e) }),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn trigger_sources_map_to_reasons() {
        assert_eq!(TriggerSource::BudgetBreach.reason(), "BUDGET_BREACH");
        assert_eq!(TriggerSource::Alarm.reason(), "ALARM_TRIGGERED");
        assert_eq!(TriggerSource::Manual.reason(), "MANUAL_TRIGGER");
        assert_eq!(TriggerSource::Schedule.reason(), "SCHEDULED_SHUTDOWN");
    }

    #[test]
    fn provider_event_sources_are_aliases() {
        assert_eq!(
            TriggerSource::from_event_source("aws.budgets"),
            TriggerSource::BudgetBreach
        );
        assert_eq!(
            TriggerSource::from_event_source("aws.cloudwatch"),
            TriggerSource::Alarm
        );
        assert_eq!(
            TriggerSource::from_event_source("something.else"),
            TriggerSource::Manual
        );
    }

    #[test]
    fn final_step_is_last_successful_rung() {
        let outcome = ResourceOutcome {
            resource_id: "i-1".into(),
            type_class: None,
            desired: DesiredAction::Terminate,
            disposition: Disposition::Stopped,
            attempts: vec![
                StepAttempt {
                    step: LadderStep::Terminate,
                    error: Some("throttled".into()),
                },
                StepAttempt {
                    step: LadderStep::ForceStop,
                    error: None,
                },
            ],
        };
        assert_eq!(outcome.final_step(), Some(LadderStep::ForceStop));
    }

    #[test]
    fn report_body_carries_outbound_fields() {
        let report = ShutdownReport::new("BUDGET_BREACH", datetime!(2026-04-01 12:00 UTC));
        let body = RunResponse::ok(&report).body;
        for field in [
            "terminated_count",
            "stopped_count",
            "hourly_savings",
            "daily_savings",
            "monthly_savings",
            "reason",
            "timestamp",
        ] {
            assert!(body.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(body["timestamp"], "2026-04-01T12:00:00Z");
        assert_eq!(body["status"], "complete");
    }
}
