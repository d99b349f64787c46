//! Error types for QuizForge.
//!
//! Library crates use [`QuizForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all QuizForge operations.
///
/// Each terminal pipeline error carries the source URL so the caller can
/// explain which run failed and why without extra bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum QuizForgeError {
    /// Network/URL problem while fetching the source page. Terminal.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The document yielded no extractable content. Terminal.
    #[error("no extractable content in {url}: {reason}")]
    Extraction { url: String, reason: String },

    /// Every knowledge-point synthesis call failed. Terminal.
    #[error("knowledge synthesis failed for {url}: {reason}")]
    Synthesis { url: String, reason: String },

    /// No valid quiz item could be produced. Terminal.
    #[error("quiz generation failed for {url}: {reason}")]
    Generation { url: String, reason: String },

    /// Contract violation between pipeline stages. Always a bug.
    #[error("internal consistency violation: {message}")]
    InternalConsistency { message: String },

    /// The run was cancelled by the caller.
    #[error("pipeline run cancelled")]
    Cancelled,

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QuizForgeError>;

impl QuizForgeError {
    /// Create a fetch error for a URL.
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create an extraction error for a URL.
    pub fn extraction(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a synthesis error for a URL.
    pub fn synthesis(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Synthesis {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a generation error for a URL.
    pub fn generation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Generation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal consistency error. These indicate bugs and are
    /// surfaced unfiltered.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalConsistency {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error terminates a whole pipeline run (as opposed to
    /// ambient config/IO errors raised outside a run).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. }
                | Self::Extraction { .. }
                | Self::Synthesis { .. }
                | Self::Generation { .. }
                | Self::InternalConsistency { .. }
                | Self::Cancelled
        )
    }
}
