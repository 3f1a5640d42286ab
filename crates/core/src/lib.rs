//! costguard-core: data model for the costguard cloud-cost guardrail.
//!
//! Everything here is plain data plus pure helpers. Provider access lives
//! in `costguard-provider`; decisions and side effects live in
//! `costguard-engine`.
//!
//! # Public API
//!
//! - [`Resource`], [`ResourceKind`], [`ResourceState`] -- observed provider inventory
//! - [`TagSet`] and the well-known [`keys`] -- typed tag container
//! - [`TagPolicy`], [`TagRule`], [`ValueDomain`] -- the required-tag rule table
//! - [`AutoDeleteSchedule`] -- active-hours window for non-prod auto-delete
//! - [`SpendWindow`], [`SpendSnapshot`] -- billing observations
//! - [`PricingTable`], [`Savings`] -- injectable cost tiers
//! - [`ComplianceVerdict`] -- per-resource tag policy result
//! - [`ShutdownReport`] and friends -- escalation output
//! - [`GuardrailConfig`] -- TOML configuration surface

pub mod config;
pub mod error;
pub mod policy;
pub mod pricing;
pub mod report;
pub mod resource;
pub mod signal;
pub mod spend;
pub mod tags;
pub mod verdict;

// ── Convenience re-exports ───────────────────────────────────────────

pub use config::{AlertConfig, BudgetConfig, GuardrailConfig, ProviderConfig};
pub use error::ConfigError;
pub use policy::{AutoDeleteSchedule, TagPolicy, TagRule, ValueDomain};
pub use pricing::{PricingTable, Savings};
pub use report::{
    ActionFailure, DesiredAction, Disposition, LadderStep, LimitEnforcementResult, ReportStatus,
    ResourceOutcome, RunResponse, ShutdownReport, SpendCheckResult, StepAttempt,
    TagEnforcementSummary, TriggerSource,
};
pub use resource::{Resource, ResourceKind, ResourceState};
pub use signal::{Alert, AlertSeverity, MetricDatum, MetricUnit};
pub use spend::{SpendSnapshot, SpendWindow};
pub use tags::{keys, TagSet};
pub use verdict::{ComplianceVerdict, VerdictAction, VerdictCause};

/// Currency used when a configuration or provider does not name one.
pub const DEFAULT_CURRENCY: &str = "USD";
