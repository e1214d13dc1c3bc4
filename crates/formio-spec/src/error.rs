use thiserror::Error;

/// Errors raised while loading engine inputs.
///
/// Evaluation itself never fails: script problems degrade through
/// [`crate::fallback`] and field problems become [`crate::ValidationError`]s.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid form schema: {0}")]
    SchemaParse(#[source] serde_json::Error),
    #[error("invalid engine config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("form data must be a JSON object, got {0}")]
    DataShape(&'static str),
}
