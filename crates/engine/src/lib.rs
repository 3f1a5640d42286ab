//! costguard-engine: decisions and side effects for the cost guardrail.
//!
//! Leaf-first:
//!
//! - [`cost_observer`] -- spend-to-date reads, breach and alert-level checks
//! - [`inventory`] -- typed resource listings
//! - [`tag_policy`] and [`schedule`] -- per-resource compliance verdicts
//! - [`escalation`] -- the stop / force-stop / terminate ladder, full
//!   shutdown and the batch fallback
//! - [`limit`] -- concurrent instance cap
//! - [`notify`] -- fire-and-forget alerts and metrics
//! - [`Guardrail`] -- one method per run, wiring the above together
//!
//! The provider is reached only through [`costguard_provider::CloudProvider`];
//! tests drive the engine against [`costguard_provider::MemoryProvider`].

pub mod cost_observer;
pub mod error;
pub mod escalation;
pub mod guardrail;
pub mod inventory;
pub mod limit;
pub mod notify;
pub mod schedule;
pub mod tag_policy;
pub mod trigger;

pub use error::GuardrailError;
pub use escalation::{ladder, EscalationEngine, NUCLEAR_BATCH_SIZE};
pub use guardrail::{violation_markers, Guardrail};
pub use limit::enforce_cap;
pub use notify::Notifier;
pub use tag_policy::{evaluate, grace_deadline};
pub use trigger::{confirmation_matches, TriggerPayload, CONFIRMATION_PHRASE};
