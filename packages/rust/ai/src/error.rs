//! AI provider error taxonomy.
//!
//! The retry policy in the pipeline stages inspects [`AiError::is_transient`]
//! to decide between retrying, skipping a unit, and failing a stage.

/// Error returned by an [`crate::AiClient`] completion call.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    /// Provider rate limit hit (HTTP 429). Transient.
    #[error("rate limited by provider")]
    RateLimited,

    /// The call exceeded its timeout. Transient.
    #[error("AI call timed out")]
    Timeout,

    /// Provider returned an error status.
    #[error("provider error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    /// Connection-level failure (DNS, reset, TLS). Transient.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider replied, but the reply could not be understood
    /// (missing choices, non-JSON payload where JSON was demanded).
    #[error("invalid AI response: {0}")]
    InvalidResponse(String),

    /// The surrounding run was cancelled while this call was in flight.
    #[error("AI call cancelled")]
    Cancelled,
}

impl AiError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited | Self::Timeout | Self::Transport(_) => true,
            Self::Provider { status, .. } => *status >= 500,
            Self::InvalidResponse(_) | Self::Cancelled => false,
        }
    }
}
