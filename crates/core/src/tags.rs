//! Typed tag container and well-known tag keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known tag keys.
pub mod keys {
    /// `"true"` marks a resource as eligible for scheduled auto-delete.
    pub const AUTO_DELETE: &str = "AutoDelete";
    pub const COST_CENTER: &str = "CostCenter";
    /// Maximum runtime in hours; exceeding it terminates the resource.
    pub const MAX_HOURS: &str = "MaxHours";
    /// `dev`, `staging`, `prod`, ...
    pub const ENVIRONMENT: &str = "Environment";
    pub const OWNER: &str = "Owner";

    /// Marker written onto resources found in violation.
    pub const VIOLATION: &str = "VIOLATION";
    /// RFC 3339 grace deadline written onto warned resources.
    pub const TERMINATION_TIME: &str = "TERMINATION_TIME";

    /// Value of [`VIOLATION`] for missing or invalid required tags.
    pub const MISSING_TAGS: &str = "MISSING_TAGS";
    /// Value of [`ENVIRONMENT`] that is never auto-deleted.
    pub const PRODUCTION: &str = "prod";
}

/// Ordered key/value tag set attached to a resource.
///
/// Serializes as a plain JSON/TOML map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        TagSet(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite this set's entries with those of `other`.
    pub fn merge(&mut self, other: &TagSet) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }

    /// The `Environment` tag value, if any.
    pub fn environment(&self) -> Option<&str> {
        self.get(keys::ENVIRONMENT)
    }

    pub fn is_production(&self) -> bool {
        self.environment() == Some(keys::PRODUCTION)
    }

    /// True when `AutoDelete` is exactly `"true"`.
    pub fn auto_delete_requested(&self) -> bool {
        self.get(keys::AUTO_DELETE) == Some("true")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        TagSet(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
