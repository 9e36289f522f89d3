use thiserror::Error;

/// Errors raised while turning text into policy values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The name does not match any known retention class.
    #[error("Invalid retention class '{0}'")]
    InvalidClass(String),

    /// A snapshot name could not be decoded into an observation.
    #[error("Malformed observation '{input}': {reason}")]
    MalformedObservation { input: String, reason: String },
}

impl PolicyError {
    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        PolicyError::MalformedObservation {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
