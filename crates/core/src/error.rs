use std::path::PathBuf;

/// Errors raised while loading or validating a [`GuardrailConfig`](crate::GuardrailConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the expected shape.
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but violates a configuration invariant.
    #[error("invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
