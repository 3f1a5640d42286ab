/// All errors that can be returned by a provider, alert channel or metrics sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The API could not be reached or failed transiently (timeouts,
    /// throttling, 5xx). Callers escalate or degrade; they never retry here.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the request for one resource (permissions,
    /// invalid state transition, protected resource).
    #[error("provider rejected request for {id}: {message}")]
    Rejected { id: String, message: String },

    /// The provider no longer knows the resource.
    #[error("resource not found: {id}")]
    NotFound { id: String },
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }
}
