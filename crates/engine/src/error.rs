use costguard_provider::ProviderError;

/// Errors surfaced by [`Guardrail`](crate::Guardrail) runs.
///
/// Policy violations are verdicts, not errors, and notification failures
/// are swallowed; neither appears here.
#[derive(Debug, thiserror::Error)]
pub enum GuardrailError {
    /// The manual shutdown confirmation did not match. Nothing was touched.
    #[error("shutdown cancelled: confirmation did not match '{}'", crate::trigger::CONFIRMATION_PHRASE)]
    ConfirmationDenied,

    /// An inventory read failed before any action was taken.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
