//! Per-resource tag compliance verdicts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// What the evaluator decided to do about a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictAction {
    None,
    /// Mark the resource and report it, but leave it running.
    Warn,
    Terminate,
}

/// Why the evaluator reached a non-`None` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictCause {
    /// Required tags missing or invalid, still inside the grace period.
    MissingTags,
    /// Required tags missing or invalid after the grace period expired.
    GraceExpired,
    /// A compliant resource outlived its `MaxHours` tag.
    MaxHoursExceeded,
    /// A compliant `AutoDelete=true` resource fell outside its active window.
    AutoDeleteSchedule,
}

/// Result of evaluating one resource against the tag policy.
///
/// `in_grace` is derived from `grace_deadline` and the evaluation time, so
/// the same resource evaluated at the same instant always yields the same
/// verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub resource_id: String,
    pub missing_tags: BTreeSet<String>,
    pub invalid_tags: BTreeSet<String>,
    pub in_grace: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub grace_deadline: OffsetDateTime,
    pub action: VerdictAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<VerdictCause>,
}

impl ComplianceVerdict {
    /// True when any required tag is missing or has an out-of-domain value.
    pub fn is_violation(&self) -> bool {
        !self.missing_tags.is_empty() || !self.invalid_tags.is_empty()
    }

    pub fn is_terminate(&self) -> bool {
        self.action == VerdictAction::Terminate
    }
}
