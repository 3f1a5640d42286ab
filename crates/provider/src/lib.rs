//! costguard-provider: the capability seams between the guardrail engine and
//! the outside world.
//!
//! - [`CloudProvider`] -- inventory, billing and compute/storage actions
//! - [`AlertChannel`] -- operations alerts
//! - [`MetricsSink`] -- metric emission
//!
//! Backends:
//!
//! - [`MemoryProvider`] -- in-process inventory with fault injection, seeded
//!   from code or a JSON [`InventoryFixture`]
//! - [`HttpProvider`] -- JSON control-plane API over `ureq`
//! - [`WebhookAlertChannel`], [`LogAlertChannel`], [`LogMetricsSink`] and the
//!   recording sinks used by tests

mod error;
mod http;
mod memory;
mod sinks;
mod traits;

pub use error::ProviderError;
pub use http::{HttpProvider, WebhookAlertChannel};
pub use memory::{
    FixtureError, InventoryFixture, MemoryProvider, ProviderCall, ProviderOp, SpendEntry,
};
pub use sinks::{LogAlertChannel, LogMetricsSink, RecordingAlertChannel, RecordingMetricsSink};
pub use traits::{AlertChannel, CloudProvider, MetricsSink};
