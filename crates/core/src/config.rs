//! TOML configuration surface.
//!
//! Every section and field is optional; omitted values fall back to the
//! defaults the guardrail has always shipped with. Call
//! [`GuardrailConfig::validate`] (done by [`GuardrailConfig::load`] and
//! [`GuardrailConfig::from_toml_str`]) before handing a config to the engine.
//!
//! ```toml
//! [budget]
//! daily_limit = "500"
//! shutdown_threshold = "0.8"
//!
//! [provider]
//! kind = "http"
//! endpoint = "https://control-plane.internal/v1"
//! ```

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

use crate::error::ConfigError;
use crate::policy::{AutoDeleteSchedule, TagPolicy};
use crate::pricing::PricingTable;

/// Environment variable holding the control-plane bearer token.
pub const DEFAULT_TOKEN_ENV: &str = "COSTGUARD_PROVIDER_TOKEN";

// ──────────────────────────────────────────────
// Sections
// ──────────────────────────────────────────────

/// Spend limits and the instance cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub daily_limit: Decimal,
    pub monthly_limit: Decimal,
    /// Fraction of a limit at which full shutdown triggers (inclusive).
    pub shutdown_threshold: Decimal,
    /// Advisory fractions that only raise warnings (exclusive).
    pub alert_thresholds: Vec<Decimal>,
    pub max_instances: usize,
    pub currency: String,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        BudgetConfig {
            daily_limit: Decimal::from(500),
            monthly_limit: Decimal::from(10_000),
            shutdown_threshold: Decimal::new(8, 1),
            alert_thresholds: vec![Decimal::new(5, 1), Decimal::new(7, 1)],
            max_instances: 10,
            currency: crate::DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// Which cloud provider backend to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// In-process provider, optionally seeded from a JSON inventory fixture.
    Memory {
        #[serde(default)]
        inventory: Option<PathBuf>,
    },
    /// JSON control-plane API.
    Http {
        endpoint: String,
        #[serde(default = "default_token_env")]
        token_env: String,
    },
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Memory { inventory: None }
    }
}

/// Where alerts and metrics go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Webhook receiving alert JSON. Alerts are only logged when unset.
    pub webhook_url: Option<String>,
    pub topic: String,
    pub metrics_namespace: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            webhook_url: None,
            topic: "emergency-alerts".to_string(),
            metrics_namespace: "CostControl".to_string(),
        }
    }
}

// ──────────────────────────────────────────────
// GuardrailConfig
// ──────────────────────────────────────────────

/// Complete guardrail configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    pub budget: BudgetConfig,
    pub tags: TagPolicy,
    pub schedule: AutoDeleteSchedule,
    pub pricing: PricingTable,
    pub provider: ProviderConfig,
    pub alerts: AlertConfig,
}

impl GuardrailConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: GuardrailConfig = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let budget = &self.budget;
        if budget.shutdown_threshold <= Decimal::ZERO || budget.shutdown_threshold >= Decimal::ONE
        {
            return Err(ConfigError::invalid(
                "budget.shutdown_threshold",
                format!("must be in (0, 1), got {}", budget.shutdown_threshold),
            ));
        }
        if budget.daily_limit <= Decimal::ZERO {
            return Err(ConfigError::invalid("budget.daily_limit", "must be positive"));
        }
        if budget.monthly_limit <= Decimal::ZERO {
            return Err(ConfigError::invalid("budget.monthly_limit", "must be positive"));
        }
        if let Some(bad) = budget
            .alert_thresholds
            .iter()
            .find(|t| **t <= Decimal::ZERO || **t > Decimal::ONE)
        {
            return Err(ConfigError::invalid(
                "budget.alert_thresholds",
                format!("must be in (0, 1], got {}", bad),
            ));
        }

        if self.pricing.default_hourly <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "pricing.default_hourly",
                "unknown instance classes must not be priced at zero",
            ));
        }
        if let Some((class, _)) = self
            .pricing
            .hourly
            .iter()
            .find(|(_, rate)| rate.is_sign_negative())
        {
            return Err(ConfigError::invalid(
                "pricing.hourly",
                format!("negative rate for '{}'", class),
            ));
        }

        let schedule = &self.schedule;
        if schedule.active_end_hour > 24 || schedule.active_start_hour >= schedule.active_end_hour
        {
            return Err(ConfigError::invalid(
                "schedule.active_start_hour",
                format!(
                    "active window {}..{} must satisfy start < end <= 24",
                    schedule.active_start_hour, schedule.active_end_hour
                ),
            ));
        }
        if !(-12..=14).contains(&schedule.utc_offset_hours) {
            return Err(ConfigError::invalid(
                "schedule.utc_offset_hours",
                format!("{} is outside -12..=14", schedule.utc_offset_hours),
            ));
        }
        let iso = format_description!("[year]-[month]-[day]");
        for holiday in &schedule.holidays {
            if Date::parse(holiday.trim(), &iso).is_err() {
                return Err(ConfigError::invalid(
                    "schedule.holidays",
                    format!("'{}' is not a YYYY-MM-DD date", holiday),
                ));
            }
        }

        if let ProviderConfig::Http { endpoint, .. } = &self.provider {
            if endpoint.trim().is_empty() {
                return Err(ConfigError::invalid("provider.endpoint", "must not be empty"));
            }
        }
        Ok(())
    }
}
