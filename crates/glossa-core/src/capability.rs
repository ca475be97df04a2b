use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::errors::CapabilityError;

/// Stream of text chunks produced by a capability session.
pub type ChunkStream =
    Pin<Box<dyn futures::Stream<Item = Result<String, CapabilityError>> + Send + 'static>>;

type ProgressSink = Arc<dyn Fn(f64) + Send + Sync>;

/// Result of a capability availability check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Availability {
    /// A session can be created immediately.
    Available,
    /// A model download is required before a session can be created.
    Downloadable,
    /// A model download is already in progress.
    Downloading,
    /// The configuration cannot be served.
    Unavailable { reason: String },
}

impl Availability {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Whether session creation will report download progress.
    pub fn needs_download(&self) -> bool {
        matches!(self, Self::Downloadable | Self::Downloading)
    }
}

/// Handed to [`Capability::create`]: exposes the initialization's cancellation
/// token and a sink for download progress.
#[derive(Clone)]
pub struct CreateMonitor {
    token: CancellationToken,
    progress: Option<ProgressSink>,
}

impl CreateMonitor {
    /// A monitor that discards progress events.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            progress: None,
        }
    }

    /// A monitor that forwards progress fractions to `sink`.
    pub fn with_progress<F>(token: CancellationToken, sink: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        Self {
            token,
            progress: Some(Arc::new(sink)),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reports download progress as a fraction in `[0, 1]`; out of range values
    /// are clamped and NaN is ignored.
    pub fn report_progress(&self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        if let Some(sink) = &self.progress {
            sink(fraction.clamp(0.0, 1.0));
        }
    }
}

impl fmt::Debug for CreateMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateMonitor")
            .field("cancelled", &self.token.is_cancelled())
            .field("reports_progress", &self.progress.is_some())
            .finish()
    }
}

/// An externally supplied AI capability (translation, summarization,
/// prompting, ...).
///
/// Configurations are compared by their serialized JSON form, so two values
/// are the same configuration exactly when they serialize identically.
#[async_trait::async_trait]
pub trait Capability: Send + Sync + 'static {
    type Config: serde::Serialize + Clone + fmt::Debug + Send + Sync + 'static;
    type Session: CapabilitySession;

    /// Stable name used in errors and log fields (for example `translator`).
    fn name(&self) -> &str;

    /// Synchronous check: does the environment provide this capability at all?
    ///
    /// Called with the manager's state locked, so it must not block or call
    /// back into the manager.
    fn is_supported(&self) -> bool;

    /// Reason reported when [`Capability::is_supported`] returns `false`.
    fn unsupported_reason(&self) -> String {
        format!("{} is not available in this environment", self.name())
    }

    async fn availability(&self, config: &Self::Config) -> Result<Availability, CapabilityError>;

    /// Creates a session. Implementations should observe
    /// `monitor.cancellation()` and return [`CapabilityError::Aborted`] once it
    /// fires.
    async fn create(
        &self,
        config: &Self::Config,
        monitor: CreateMonitor,
    ) -> Result<Self::Session, CapabilityError>;

    /// Pure input transform applied before every operation.
    fn preprocess(&self, input: &str) -> String {
        input.to_owned()
    }
}

/// A live handle to an initialized capability.
#[async_trait::async_trait]
pub trait CapabilitySession: Send + Sync + 'static {
    /// Opens a streaming operation. Dropping the returned stream releases it.
    async fn operate(
        &self,
        input: String,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, CapabilityError>;

    /// Releases the underlying capability instance.
    fn destroy(&self);
}
