//! In-process cloud provider.
//!
//! Holds inventory and spend line items behind a mutex, supports per-call
//! fault injection, and records every call so tests can assert on exactly
//! which provider operations a run performed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use costguard_core::{
    Resource, ResourceKind, ResourceState, SpendSnapshot, SpendWindow, TagSet, DEFAULT_CURRENCY,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ProviderError;
use crate::traits::CloudProvider;

// ──────────────────────────────────────────────
// Fixture
// ──────────────────────────────────────────────

/// One billed amount at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendEntry {
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub amount: Decimal,
}

/// JSON seed for a [`MemoryProvider`].
///
/// ```json
/// { "resources": [ { "id": "i-1", "kind": "compute-instance", ... } ],
///   "spend": [ { "at": "2026-04-01T09:00:00Z", "amount": "120.50" } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryFixture {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub spend: Vec<SpendEntry>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("cannot read inventory fixture '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid inventory fixture '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl InventoryFixture {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let src = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&src).map_err(|source| FixtureError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ──────────────────────────────────────────────
// Call log
// ──────────────────────────────────────────────

/// A provider operation, used for fault injection and the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderOp {
    ListResources,
    GetCost,
    Stop,
    ForceStop,
    Terminate,
    BatchTerminate,
    CancelSpot,
    DeleteVolume,
    DeleteSnapshot,
    WriteTags,
}

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    pub op: ProviderOp,
    /// Resource ID, comma-joined ID list, or the listed kind.
    pub target: String,
}

// ──────────────────────────────────────────────
// MemoryProvider
// ──────────────────────────────────────────────

#[derive(Default)]
struct MemoryState {
    resources: BTreeMap<String, Resource>,
    spend: Vec<SpendEntry>,
    currency: Option<String>,
    inventory_down: bool,
    billing_down: bool,
    faults: BTreeMap<(String, ProviderOp), ProviderError>,
    calls: Vec<ProviderCall>,
}

impl MemoryState {
    fn record(&mut self, op: ProviderOp, target: impl Into<String>) {
        self.calls.push(ProviderCall {
            op,
            target: target.into(),
        });
    }

    fn fault(&self, id: &str, op: ProviderOp) -> Result<(), ProviderError> {
        match self.faults.get(&(id.to_string(), op)) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn existing(&mut self, id: &str) -> Result<&mut Resource, ProviderError> {
        self.resources
            .get_mut(id)
            .ok_or_else(|| ProviderError::NotFound { id: id.to_string() })
    }
}

/// Cloud provider backed by an in-memory inventory.
#[derive(Default)]
pub struct MemoryProvider {
    state: Mutex<MemoryState>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: InventoryFixture) -> Self {
        let provider = Self::new();
        {
            let mut state = provider.lock();
            for resource in fixture.resources {
                state.resources.insert(resource.id.clone(), resource);
            }
            state.spend = fixture.spend;
            state.currency = fixture.currency;
        }
        provider
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Seeding ──────────────────────────────────────────────────────────

    pub fn with_resource(self, resource: Resource) -> Self {
        self.insert(resource);
        self
    }

    pub fn with_spend(self, at: OffsetDateTime, amount: Decimal) -> Self {
        self.lock().spend.push(SpendEntry { at, amount });
        self
    }

    pub fn insert(&self, resource: Resource) {
        self.lock().resources.insert(resource.id.clone(), resource);
    }

    // ── Fault injection ──────────────────────────────────────────────────

    /// Make every `list_resources` call fail with `Unavailable`.
    pub fn set_inventory_down(&self, down: bool) {
        self.lock().inventory_down = down;
    }

    /// Make every `get_cost` call fail with `Unavailable`.
    pub fn set_billing_down(&self, down: bool) {
        self.lock().billing_down = down;
    }

    /// Fail `op` against `id` with `error` until cleared.
    pub fn fail_on(&self, id: &str, op: ProviderOp, error: ProviderError) {
        self.lock().faults.insert((id.to_string(), op), error);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    // ── Inspection ───────────────────────────────────────────────────────

    pub fn resource(&self, id: &str) -> Option<Resource> {
        self.lock().resources.get(id).cloned()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, op: ProviderOp) -> Vec<ProviderCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }
}

#[async_trait]
impl CloudProvider for MemoryProvider {
    async fn list_resources(
        &self,
        kind: ResourceKind,
        states: &[ResourceState],
    ) -> Result<Vec<Resource>, ProviderError> {
        let mut state = self.lock();
        state.record(ProviderOp::ListResources, kind.as_str());
        if state.inventory_down {
            return Err(ProviderError::Unavailable(
                "inventory API unreachable".to_string(),
            ));
        }
        Ok(state
            .resources
            .values()
            .filter(|r| r.kind == kind)
            .filter(|r| states.is_empty() || states.contains(&r.state))
            .cloned()
            .collect())
    }

    async fn get_cost(&self, window: &SpendWindow) -> Result<SpendSnapshot, ProviderError> {
        let mut state = self.lock();
        state.record(ProviderOp::GetCost, window.start.to_string());
        if state.billing_down {
            return Err(ProviderError::Unavailable(
                "billing API unreachable".to_string(),
            ));
        }
        let amount = state
            .spend
            .iter()
            .filter(|e| e.at >= window.start && e.at < window.end)
            .map(|e| e.amount)
            .sum();
        let currency = state
            .currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        Ok(SpendSnapshot::new(*window, amount, currency))
    }

    async fn stop_instance(&self, id: &str, force: bool) -> Result<(), ProviderError> {
        let op = if force {
            ProviderOp::ForceStop
        } else {
            ProviderOp::Stop
        };
        let mut state = self.lock();
        state.record(op, id);
        state.fault(id, op)?;
        let resource = state.existing(id)?;
        if resource.state == ResourceState::Terminated {
            return Err(ProviderError::Rejected {
                id: id.to_string(),
                message: "instance is terminated".to_string(),
            });
        }
        resource.state = ResourceState::Stopped;
        Ok(())
    }

    async fn terminate_instance(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.record(ProviderOp::Terminate, id);
        state.fault(id, ProviderOp::Terminate)?;
        state.existing(id)?.state = ResourceState::Terminated;
        Ok(())
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.record(ProviderOp::BatchTerminate, ids.join(","));
        for id in ids {
            state.fault(id, ProviderOp::BatchTerminate)?;
        }
        for id in ids {
            if let Some(resource) = state.resources.get_mut(id) {
                resource.state = ResourceState::Terminated;
            }
        }
        Ok(())
    }

    async fn cancel_spot_requests(&self, ids: &[String]) -> Result<usize, ProviderError> {
        let mut state = self.lock();
        state.record(ProviderOp::CancelSpot, ids.join(","));
        for id in ids {
            state.fault(id, ProviderOp::CancelSpot)?;
        }
        let mut cancelled = 0;
        for id in ids {
            if let Some(resource) = state.resources.get_mut(id) {
                if resource.state != ResourceState::Cancelled {
                    resource.state = ResourceState::Cancelled;
                    cancelled += 1;
                }
            }
        }
        Ok(cancelled)
    }

    async fn delete_volume(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.record(ProviderOp::DeleteVolume, id);
        state.fault(id, ProviderOp::DeleteVolume)?;
        if state.existing(id)?.state == ResourceState::Attached {
            return Err(ProviderError::Rejected {
                id: id.to_string(),
                message: "volume is attached".to_string(),
            });
        }
        state.resources.remove(id);
        Ok(())
    }

    async fn delete_snapshot(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.record(ProviderOp::DeleteSnapshot, id);
        state.fault(id, ProviderOp::DeleteSnapshot)?;
        state.existing(id)?;
        state.resources.remove(id);
        Ok(())
    }

    async fn write_tags(&self, id: &str, tags: &TagSet) -> Result<(), ProviderError> {
        let mut state = self.lock();
        let keys: Vec<&str> = tags.keys().collect();
        state.record(ProviderOp::WriteTags, format!("{}:{}", id, keys.join(",")));
        state.fault(id, ProviderOp::WriteTags)?;
        state.existing(id)?.tags.merge(tags);
        Ok(())
    }
}
