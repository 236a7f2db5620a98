//! Error types for the controller pipeline.

use buildflow_core::model::BuildStrategyType;

/// The result type used throughout the controller crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to the authority or dispatching builds.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The authority answered with a non-success status.
    #[error("authority returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// A payload could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The authority refused or dropped a request (in-memory and test doubles).
    #[error("authority unavailable: {0}")]
    Unavailable(String),

    /// A Build declared a strategy kind with no registered implementation.
    #[error("no strategy defined for type {kind}")]
    UnconfiguredStrategy {
        /// The kind that had no registration.
        kind: BuildStrategyType,
    },

    /// A strategy could not turn the Build into a pod.
    #[error("invalid build {build_id}: {reason}")]
    InvalidBuild {
        /// Offending build.
        build_id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Startup configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for [`Error::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Shorthand for [`Error::Unavailable`].
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// True for errors that a later attempt may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status { .. } | Self::Unavailable(_)
        )
    }
}
