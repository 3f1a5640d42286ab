//! Observed provider resources.
//!
//! A [`Resource`] is a read-only view of something the provider owns. The
//! guardrail never holds an authoritative copy beyond one evaluation pass;
//! every run lists resources fresh.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::tags::TagSet;

/// What kind of billable thing a resource is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    ComputeInstance,
    Volume,
    Snapshot,
    SpotRequest,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ComputeInstance => "compute-instance",
            ResourceKind::Volume => "volume",
            ResourceKind::Snapshot => "snapshot",
            ResourceKind::SpotRequest => "spot-request",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state as reported by the provider.
///
/// Instances move through `pending`/`running`/`stopping`/`stopped`/`terminated`,
/// volumes are `available` (unattached) or `attached`, and spot requests are
/// `open`, `active` or `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Running,
    Pending,
    Stopping,
    Stopped,
    Terminated,
    Available,
    Attached,
    Open,
    Active,
    Cancelled,
}

impl ResourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Running => "running",
            ResourceState::Pending => "pending",
            ResourceState::Stopping => "stopping",
            ResourceState::Stopped => "stopped",
            ResourceState::Terminated => "terminated",
            ResourceState::Available => "available",
            ResourceState::Attached => "attached",
            ResourceState::Open => "open",
            ResourceState::Active => "active",
            ResourceState::Cancelled => "cancelled",
        }
    }

    /// States in which an instance accrues compute charges.
    pub fn is_billing(&self) -> bool {
        matches!(self, ResourceState::Running | ResourceState::Pending)
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider resource as seen during one evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub kind: ResourceKind,
    /// Pricing category (instance type for compute, storage class for volumes).
    pub type_class: String,
    pub state: ResourceState,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub tags: TagSet,
    /// Provisioned size for volumes and snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<u32>,
}

impl Resource {
    pub fn new(
        id: impl Into<String>,
        kind: ResourceKind,
        type_class: impl Into<String>,
        state: ResourceState,
        created_at: OffsetDateTime,
    ) -> Self {
        Resource {
            id: id.into(),
            kind,
            type_class: type_class.into(),
            state,
            created_at,
            tags: TagSet::new(),
            size_gb: None,
        }
    }

    /// Builder-style tag insertion, mostly for fixtures and tests.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key, value);
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_size_gb(mut self, size_gb: u32) -> Self {
        self.size_gb = Some(size_gb);
        self
    }

    /// Time elapsed since creation. Negative when the provider clock is ahead.
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        now - self.created_at
    }

    pub fn is_instance(&self) -> bool {
        self.kind == ResourceKind::ComputeInstance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn kind_serializes_kebab_case() {
        let json = serde_json::to_string(&ResourceKind::ComputeInstance).unwrap();
        assert_eq!(json, "\"compute-instance\"");
        let back: ResourceKind = serde_json::from_str("\"spot-request\"").unwrap();
        assert_eq!(back, ResourceKind::SpotRequest);
    }

    #[test]
    fn resource_deserializes_from_fixture_json() {
        let json = serde_json::json!({
            "id": "i-0abc",
            "kind": "compute-instance",
            "type_class": "t3.large",
            "state": "running",
            "created_at": "2026-03-02T10:00:00Z",
            "tags": { "Environment": "dev", "Owner": "ops@example.com" }
        });
        let r: Resource = serde_json::from_value(json).unwrap();
        assert_eq!(r.id, "i-0abc");
        assert_eq!(r.state, ResourceState::Running);
        assert_eq!(r.created_at, datetime!(2026-03-02 10:00 UTC));
        assert_eq!(r.tags.get("Environment"), Some("dev"));
        assert_eq!(r.size_gb, None);
    }

    #[test]
    fn age_is_measured_from_creation() {
        let r = Resource::new(
            "i-1",
            ResourceKind::ComputeInstance,
            "t3.medium",
            ResourceState::Running,
            datetime!(2026-03-02 10:00 UTC),
        );
        assert_eq!(r.age(datetime!(2026-03-02 12:30 UTC)), Duration::minutes(150));
    }

    #[test]
    fn only_running_and_pending_bill() {
        assert!(ResourceState::Running.is_billing());
        assert!(ResourceState::Pending.is_billing());
        assert!(!ResourceState::Stopping.is_billing());
        assert!(!ResourceState::Stopped.is_billing());
    }
}
