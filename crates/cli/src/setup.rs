//! Wiring from configuration to a ready [`Guardrail`].

use std::path::Path;
use std::sync::Arc;

use costguard_core::{GuardrailConfig, ProviderConfig};
use costguard_engine::{Guardrail, Notifier};
use costguard_provider::{
    AlertChannel, CloudProvider, HttpProvider, InventoryFixture, LogAlertChannel, LogMetricsSink,
    MemoryProvider, WebhookAlertChannel,
};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub(crate) const LOG_ENV: &str = "COSTGUARD_LOG";

/// Install the stderr log subscriber. `--quiet` lowers the default to
/// errors only; `COSTGUARD_LOG` always wins.
pub(crate) fn init_tracing(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load and validate the configuration. Without a path the built-in
/// defaults are used.
pub(crate) fn load_config(path: Option<&Path>) -> Result<GuardrailConfig, String> {
    let Some(path) = path else {
        return Ok(GuardrailConfig::default());
    };
    let mut config = GuardrailConfig::load(path).map_err(|e| e.to_string())?;

    // Fixture paths are relative to the configuration file.
    if let ProviderConfig::Memory {
        inventory: Some(inventory),
    } = &mut config.provider
    {
        if inventory.is_relative() {
            if let Some(dir) = path.parent() {
                *inventory = dir.join(&*inventory);
            }
        }
    }
    Ok(config)
}

pub(crate) fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn CloudProvider>, String> {
    match config {
        ProviderConfig::Memory { inventory: None } => Ok(Arc::new(MemoryProvider::new())),
        ProviderConfig::Memory {
            inventory: Some(path),
        } => {
            let fixture = InventoryFixture::load(path).map_err(|e| e.to_string())?;
            tracing::debug!(
                path = %path.display(),
                resources = fixture.resources.len(),
                "loaded inventory fixture"
            );
            Ok(Arc::new(MemoryProvider::from_fixture(fixture)))
        }
        ProviderConfig::Http {
            endpoint,
            token_env,
        } => Ok(Arc::new(HttpProvider::new(endpoint, token_env))),
    }
}

fn build_notifier(config: &GuardrailConfig) -> Notifier {
    let alerts: Arc<dyn AlertChannel> = match &config.alerts.webhook_url {
        Some(url) => Arc::new(WebhookAlertChannel::new(url.clone())),
        None => Arc::new(LogAlertChannel),
    };
    Notifier::new(alerts, Arc::new(LogMetricsSink), &config.alerts)
}

/// Read a last-known instance list: one ID per line, `#` comments allowed.
pub(crate) fn read_known_instances(path: &Path) -> Result<Vec<String>, String> {
    let src = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read known instances '{}': {}", path.display(), e))?;
    Ok(src
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Everything a command needs, built from the global flags.
pub(crate) fn build_guardrail(
    config_path: Option<&Path>,
    known_instances: Option<&Path>,
) -> Result<Guardrail, String> {
    let config = load_config(config_path)?;
    let provider = build_provider(&config.provider)?;
    let notifier = build_notifier(&config);
    let guardrail = Guardrail::new(config, provider, notifier);
    if let Some(path) = known_instances {
        guardrail.remember_instances(read_known_instances(path)?);
    }
    Ok(guardrail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_instances_skip_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known.txt");
        std::fs::write(&path, "# fleet\ni-1\n\n  i-2  \n").unwrap();
        assert_eq!(read_known_instances(&path).unwrap(), vec!["i-1", "i-2"]);
    }

    #[test]
    fn fixture_path_resolves_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("costguard.toml");
        std::fs::write(&path, "[provider]\nkind = \"memory\"\ninventory = \"fleet.json\"\n")
            .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(
            config.provider,
            ProviderConfig::Memory {
                inventory: Some(dir.path().join("fleet.json"))
            }
        );
    }

    #[test]
    fn missing_config_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/costguard.toml"))).unwrap_err();
        assert!(err.contains("costguard.toml"), "{}", err);
    }
}
