//! Session lifecycle management for AI capabilities.
//!
//! A [`SessionManager`] owns at most one live session for a [`Capability`]
//! (translation, summarization, prompting, ...), broadcasts lifecycle status to
//! subscribers and guarantees that only the most recently started
//! initialization and stream operation can produce observable effects.
//!
//! # Usage
//!
//! ```no_run
//! use futures::StreamExt as _;
//! use glossa_core::prelude::*;
//!
//! # async fn demo<C: Capability>(capability: C, config: C::Config) -> Result<(), SessionError> {
//! let manager = SessionManager::new(capability);
//! let subscription = manager.subscribe_to_status(|status| {
//!     println!("status: {status:?}");
//! });
//!
//! let mut stream = manager.stream_operation("Bonjour", &config).await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?);
//! }
//!
//! subscription.unsubscribe();
//! manager.destroy_session();
//! # Ok(())
//! # }
//! ```

/// Contract implemented by AI backends.
pub mod capability;
/// Epoch-based cancellation slots for in-flight work.
pub mod cancel;
/// Public error types.
pub mod errors;
/// Session manager and its outcomes.
pub mod manager;
/// Process-wide tracing setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Lifecycle status and the listener registry.
pub mod status;
/// Stream of chunks returned by a stream operation.
pub mod stream;

pub use capability::{Availability, Capability, CapabilitySession, ChunkStream, CreateMonitor};
pub use errors::{CapabilityError, SessionError};
pub use manager::{EnsureOutcome, SessionManager};
pub use status::{SessionStatus, StatusBroadcaster, Subscription};
pub use stream::OperationStream;
