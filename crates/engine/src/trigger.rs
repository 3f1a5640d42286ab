//! Inbound trigger payloads and the manual confirmation gate.

use costguard_core::TriggerSource;
use serde::{Deserialize, Serialize};

/// The literal an operator must type to run a manual emergency shutdown.
pub const CONFIRMATION_PHRASE: &str = "SHUTDOWN";

/// True only for the exact confirmation phrase. A trailing line ending
/// from interactive input is ignored; any other difference is not.
pub fn confirmation_matches(input: &str) -> bool {
    input.trim_end_matches(&['\r', '\n'][..]) == CONFIRMATION_PHRASE
}

/// Body of an inbound shutdown trigger.
///
/// `source` accepts the kebab-case names as well as provider event sources;
/// a missing or unrecognised source is treated as a manual trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    #[serde(default)]
    pub source: Option<String>,
}

impl TriggerPayload {
    pub fn trigger_source(&self) -> TriggerSource {
        self.source
            .as_deref()
            .map(TriggerSource::from_event_source)
            .unwrap_or_default()
    }
}
