//! Tag policy as data: a rule table of required keys and value domains,
//! plus the auto-delete schedule for non-production resources.
//!
//! The rule table is deliberately small and declarative. Adding a required
//! tag or tightening a domain is a configuration change, not a code change.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, Duration, UtcOffset};

use crate::tags::{keys, TagSet};

// ──────────────────────────────────────────────
// ValueDomain
// ──────────────────────────────────────────────

/// The set of values a required tag may take.
///
/// In TOML, unit domains are plain strings (`domain = "email"`) and the
/// enum domain is a table (`domain = { enum = ["dev", "prod"] }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueDomain {
    /// `"true"` or `"false"`.
    Boolean,
    /// One of the listed values, case-sensitive.
    Enum(Vec<String>),
    /// Any non-blank text (cost centers, project codes).
    FreeText,
    /// Something shaped like `local@domain.tld`.
    Email,
    /// A non-negative decimal number.
    Numeric,
}

impl ValueDomain {
    /// Whether `value` belongs to this domain.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ValueDomain::Boolean => value == "true" || value == "false",
            ValueDomain::Enum(allowed) => allowed.iter().any(|a| a == value),
            ValueDomain::FreeText => !value.trim().is_empty(),
            ValueDomain::Email => is_plausible_email(value),
            ValueDomain::Numeric => parse_hours(value).is_some(),
        }
    }
}

/// Parse a non-negative decimal tag value such as `MaxHours`.
///
/// Returns `None` for anything unparseable or negative; callers treat that
/// as a non-compliant tag rather than an error.
pub fn parse_hours(value: &str) -> Option<Decimal> {
    let parsed = value.trim().parse::<Decimal>().ok()?;
    if parsed.is_sign_negative() {
        None
    } else {
        Some(parsed)
    }
}

fn is_plausible_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

// ──────────────────────────────────────────────
// TagRule / TagPolicy
// ──────────────────────────────────────────────

/// One row of the rule table: a required key and its allowed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub key: String,
    pub domain: ValueDomain,
}

impl TagRule {
    pub fn new(key: impl Into<String>, domain: ValueDomain) -> Self {
        TagRule {
            key: key.into(),
            domain,
        }
    }
}

/// Mandatory tagging policy. Loaded once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagPolicy {
    /// Hours after creation during which violations are only warned.
    pub grace_period_hours: u32,
    /// Non-compliant snapshots younger than this are never deleted.
    pub snapshot_min_age_days: u32,
    pub required: Vec<TagRule>,
}

impl Default for TagPolicy {
    fn default() -> Self {
        TagPolicy {
            grace_period_hours: 2,
            snapshot_min_age_days: 7,
            required: vec![
                TagRule::new(keys::AUTO_DELETE, ValueDomain::Boolean),
                TagRule::new(keys::COST_CENTER, ValueDomain::FreeText),
                TagRule::new(keys::MAX_HOURS, ValueDomain::Numeric),
                TagRule::new(
                    keys::ENVIRONMENT,
                    ValueDomain::Enum(vec![
                        "dev".to_string(),
                        "staging".to_string(),
                        "prod".to_string(),
                    ]),
                ),
                TagRule::new(keys::OWNER, ValueDomain::Email),
            ],
        }
    }
}

impl TagPolicy {
    pub fn grace_period(&self) -> Duration {
        Duration::hours(i64::from(self.grace_period_hours))
    }

    pub fn snapshot_min_age(&self) -> Duration {
        Duration::days(i64::from(self.snapshot_min_age_days))
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(|r| r.key.as_str())
    }

    pub fn rule(&self, key: &str) -> Option<&TagRule> {
        self.required.iter().find(|r| r.key == key)
    }

    /// Required keys absent from `tags`.
    pub fn missing_keys(&self, tags: &TagSet) -> BTreeSet<String> {
        self.required_keys()
            .filter(|k| !tags.contains_key(k))
            .map(str::to_string)
            .collect()
    }

    /// Required keys present in `tags` whose value falls outside the rule's domain.
    pub fn invalid_keys(&self, tags: &TagSet) -> BTreeSet<String> {
        self.required
            .iter()
            .filter_map(|rule| {
                let value = tags.get(&rule.key)?;
                (!rule.domain.accepts(value)).then(|| rule.key.clone())
            })
            .collect()
    }
}

// ──────────────────────────────────────────────
// AutoDeleteSchedule
// ──────────────────────────────────────────────

/// When resources tagged `AutoDelete=true` become eligible for deletion.
///
/// Production is never eligible. Environments in `eligible_environments`
/// are eligible outside `[active_start_hour, active_end_hour)` local time.
/// Every non-production resource is eligible on weekends (when
/// `weekend_shutdown` is set) and on listed holidays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoDeleteSchedule {
    pub active_start_hour: u8,
    pub active_end_hour: u8,
    /// Offset of "local" time from UTC, in whole hours.
    pub utc_offset_hours: i8,
    pub weekend_shutdown: bool,
    pub eligible_environments: Vec<String>,
    /// Holiday dates as `YYYY-MM-DD`.
    pub holidays: Vec<String>,
}

impl Default for AutoDeleteSchedule {
    fn default() -> Self {
        AutoDeleteSchedule {
            active_start_hour: 7,
            active_end_hour: 19,
            utc_offset_hours: 0,
            weekend_shutdown: true,
            eligible_environments: vec![
                "dev".to_string(),
                "staging".to_string(),
                "test".to_string(),
            ],
            holidays: Vec::new(),
        }
    }
}

impl AutoDeleteSchedule {
    /// The configured local offset, falling back to UTC if out of range.
    pub fn utc_offset(&self) -> UtcOffset {
        UtcOffset::from_hms(self.utc_offset_hours, 0, 0).unwrap_or(UtcOffset::UTC)
    }

    /// Whether `date` is one of the configured holidays.
    ///
    /// `Date`'s `Display` is ISO `YYYY-MM-DD`, matching the config format.
    pub fn is_holiday(&self, date: Date) -> bool {
        let formatted = date.to_string();
        self.holidays.iter().any(|h| h.trim() == formatted)
    }

    pub fn is_eligible_environment(&self, environment: &str) -> bool {
        self.eligible_environments.iter().any(|e| e == environment)
    }
}
