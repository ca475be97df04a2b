//! Common imports for code that drives a session manager.
pub use crate::{
    Availability, Capability, CapabilityError, CapabilitySession, ChunkStream, CreateMonitor,
    EnsureOutcome, OperationStream, SessionError, SessionManager, SessionStatus, Subscription,
};
