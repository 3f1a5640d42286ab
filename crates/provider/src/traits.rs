use async_trait::async_trait;
use costguard_core::{
    Alert, MetricDatum, Resource, ResourceKind, ResourceState, SpendSnapshot, SpendWindow, TagSet,
};

use crate::error::ProviderError;

/// Inventory, billing and compute/storage actions of one cloud account.
///
/// Every method is a single provider call with no retries. The engine
/// drives calls one at a time and owns all fallback behaviour.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` so one provider can be shared by
/// the HTTP trigger server and its handlers.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    // ── Reads ────────────────────────────────────────────────────────────

    /// List resources of `kind` whose state is in `states`.
    ///
    /// An empty `states` slice lists every state, including terminated.
    async fn list_resources(
        &self,
        kind: ResourceKind,
        states: &[ResourceState],
    ) -> Result<Vec<Resource>, ProviderError>;

    /// Spend accrued inside `window`.
    async fn get_cost(&self, window: &SpendWindow) -> Result<SpendSnapshot, ProviderError>;

    // ── Compute ──────────────────────────────────────────────────────────

    /// Stop an instance. `force` skips the guest shutdown.
    async fn stop_instance(&self, id: &str, force: bool) -> Result<(), ProviderError>;

    async fn terminate_instance(&self, id: &str) -> Result<(), ProviderError>;

    /// Terminate many instances in one call. Unknown IDs are ignored.
    async fn terminate_instances(&self, ids: &[String]) -> Result<(), ProviderError>;

    /// Cancel spot requests, returning how many were cancelled.
    async fn cancel_spot_requests(&self, ids: &[String]) -> Result<usize, ProviderError>;

    // ── Storage ──────────────────────────────────────────────────────────

    async fn delete_volume(&self, id: &str) -> Result<(), ProviderError>;

    async fn delete_snapshot(&self, id: &str) -> Result<(), ProviderError>;

    // ── Tags ─────────────────────────────────────────────────────────────

    /// Merge `tags` into the resource's existing tags.
    async fn write_tags(&self, id: &str, tags: &TagSet) -> Result<(), ProviderError>;
}

/// Destination for operations alerts.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn publish(&self, topic: &str, alert: &Alert) -> Result<(), ProviderError>;
}

/// Destination for metric data points.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn put_metrics(&self, namespace: &str, data: &[MetricDatum])
        -> Result<(), ProviderError>;
}
