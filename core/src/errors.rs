use thiserror::Error;

/// Failures a dialogue turn can end in.
///
/// `Display` carries the detail intended for server-side logs. What the
/// caller of the HTTP surface sees comes from [`GenieError::public_message`].
#[derive(Error, Debug)]
pub enum GenieError {
    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error("Upstream Failure: {0}")]
    UpstreamFailure(String),

    #[error("Contract Violation: {reason} (raw: {raw})")]
    ContractViolation { reason: String, raw: String },

    #[error("Empty response from the completion service")]
    EmptyUpstreamResponse,

    #[error("History is empty, nothing to undo")]
    NothingToUndo,
}

impl GenieError {
    pub(crate) fn contract(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::ContractViolation {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Message safe to hand back to a client. Never includes upstream
    /// detail or raw model output.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "The completion service API key is not configured on the server.",
            Self::UpstreamFailure(_) => "An error occurred while communicating with the AI service.",
            Self::ContractViolation { .. } => {
                "The AI response was not in the expected format. The model may not have followed the rules."
            }
            Self::EmptyUpstreamResponse => "The AI service returned no usable response.",
            Self::NothingToUndo => "There is no history, so nothing can be undone.",
        }
    }

    /// True only for failures caused by the request itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NothingToUndo)
    }
}

impl From<reqwest::Error> for GenieError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::UpstreamFailure(format!("request timed out: {}", e))
        } else {
            Self::UpstreamFailure(e.to_string())
        }
    }
}

/// Result type for dialogue operations
pub type GenieResult<T> = Result<T, GenieError>;
