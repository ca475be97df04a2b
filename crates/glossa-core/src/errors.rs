/// Errors returned by a capability backend before they are classified by the
/// session manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// The backend observed the cancellation token and stopped.
    #[error("operation aborted")]
    Aborted,
    /// The backend cannot serve the requested configuration.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// Backend returned an application-level failure (HTTP status, quota, etc.).
    #[error("backend error: {message}")]
    Backend {
        message: String,
        status_code: Option<u16>,
    },
    /// Transport or stream I/O failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// Backend response shape or sequencing was invalid.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl CapabilityError {
    /// Creates a backend-level error.
    pub fn backend(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Backend {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a protocol-level error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Returns the human-readable message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Aborted => "operation aborted",
            Self::Unavailable(message)
            | Self::Transport(message)
            | Self::Protocol(message)
            | Self::Backend { message, .. } => message,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Error surfaced to callers of the session manager.
///
/// Cancellation is deliberately absent: a superseded or aborted operation ends
/// quietly instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The environment lacks the capability entirely.
    #[error("{capability} is not supported: {reason}")]
    CapabilityUnsupported { capability: String, reason: String },
    /// The capability exists but cannot serve this configuration.
    #[error("{capability} model unavailable: {reason}")]
    ModelUnavailable { capability: String, reason: String },
    /// Availability check or session creation failed unexpectedly.
    #[error("{capability} initialization failed: {message}")]
    Initialization { capability: String, message: String },
    /// Opening or reading the output stream failed.
    #[error("{capability} stream failed: {message}")]
    StreamFailure { capability: String, message: String },
    /// The configuration could not be serialized for comparison.
    #[error("invalid session config: {0}")]
    Config(String),
}

impl SessionError {
    /// Whether re-running the same request with the same configuration may
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Initialization { .. } | Self::StreamFailure { .. }
        )
    }

    /// The message broadcast alongside `SessionStatus::Error`.
    pub fn status_message(&self) -> String {
        match self {
            Self::CapabilityUnsupported { reason, .. } | Self::ModelUnavailable { reason, .. } => {
                reason.clone()
            }
            Self::Initialization { message, .. } | Self::StreamFailure { message, .. } => {
                message.clone()
            }
            Self::Config(message) => message.clone(),
        }
    }
}
