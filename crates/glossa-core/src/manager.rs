use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures::StreamExt as _;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cancel::{OperationSlot, OperationTicket};
use crate::capability::{Availability, Capability, CapabilitySession, ChunkStream, CreateMonitor};
use crate::errors::{CapabilityError, SessionError};
use crate::status::{SessionStatus, StatusBroadcaster, Subscription};
use crate::stream::OperationStream;

/// How [`SessionManager::ensure_session`] settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// A new session was created and `ready` was broadcast.
    Created,
    /// The live session already matched the configuration.
    Reused,
    /// A newer initialization or an explicit abort took over; this call had no
    /// effect.
    Superseded,
}

struct ActiveSession<B: Capability> {
    id: uuid::Uuid,
    key: String,
    config: B::Config,
    handle: Arc<B::Session>,
}

struct ManagerState<B: Capability> {
    session: Option<ActiveSession<B>>,
    init: OperationSlot,
    stream: OperationSlot,
}

struct Shared<B: Capability> {
    capability: B,
    broadcaster: StatusBroadcaster,
    state: Mutex<ManagerState<B>>,
}

impl<B: Capability> Shared<B> {
    fn name(&self) -> &str {
        self.capability.name()
    }

    /// Callers hold the state lock so emission order matches commit order.
    fn emit(&self, status: SessionStatus) {
        debug!(capability = %self.name(), status = status.label(), "status transition");
        self.broadcaster.emit(&status);
    }

    fn fail_init(
        &self,
        state: &mut ManagerState<B>,
        ticket: &OperationTicket,
        error: SessionError,
    ) -> SessionError {
        state.init.finish(ticket);
        warn!(capability = %self.name(), epoch = ticket.epoch(), error = %error, "initialization failed");
        self.emit(SessionStatus::error(error.status_message()));
        error
    }
}

impl<B: Capability> Drop for Shared<B> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.init.cancel();
        state.stream.cancel();
        if let Some(active) = state.session.take() {
            active.handle.destroy();
        }
    }
}

/// Owns at most one live session for a capability.
///
/// Cloning is cheap; clones share the session, status listeners and
/// in-flight operations.
pub struct SessionManager<B: Capability> {
    shared: Arc<Shared<B>>,
}

impl<B: Capability> Clone for SessionManager<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

fn config_key<C: serde::Serialize>(config: &C) -> Result<String, SessionError> {
    serde_json::to_string(config).map_err(|e| SessionError::Config(e.to_string()))
}

impl<B: Capability> SessionManager<B> {
    pub fn new(capability: B) -> Self {
        Self {
            shared: Arc::new(Shared {
                capability,
                broadcaster: StatusBroadcaster::new(),
                state: Mutex::new(ManagerState {
                    session: None,
                    init: OperationSlot::new(),
                    stream: OperationSlot::new(),
                }),
            }),
        }
    }

    pub fn capability(&self) -> &B {
        &self.shared.capability
    }

    /// Synchronous capability check; never touches the session.
    pub fn is_supported(&self) -> bool {
        self.shared.capability.is_supported()
    }

    pub fn has_session(&self) -> bool {
        self.shared.state.lock().session.is_some()
    }

    /// Configuration of the live session, if any.
    pub fn current_config(&self) -> Option<B::Config> {
        self.shared
            .state
            .lock()
            .session
            .as_ref()
            .map(|active| active.config.clone())
    }

    /// Registers a status listener. Listeners run on the task that caused the
    /// transition and must not call back into this manager.
    #[must_use = "keep the subscription to be able to unsubscribe"]
    pub fn subscribe_to_status<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionStatus) + Send + Sync + 'static,
    {
        self.shared.broadcaster.subscribe(listener)
    }

    /// Registers a listener that forwards statuses into a channel.
    pub fn status_channel(
        &self,
    ) -> (
        Subscription,
        tokio::sync::mpsc::UnboundedReceiver<SessionStatus>,
    ) {
        self.shared.broadcaster.subscribe_channel()
    }

    /// Makes sure a session for `config` exists, creating it if needed.
    pub async fn ensure_session(&self, config: &B::Config) -> Result<EnsureOutcome, SessionError> {
        let key = config_key(config)?;
        self.ensure_keyed(config, key, None).await
    }

    async fn ensure_keyed(
        &self,
        config: &B::Config,
        key: String,
        caller: Option<&OperationTicket>,
    ) -> Result<EnsureOutcome, SessionError> {
        let shared = &self.shared;

        // Reuse, teardown, support check and ticket issue share one lock so a
        // concurrent ensure cannot commit a session in between.
        let ticket = {
            let mut state = shared.state.lock();
            if let Some(active) = state.session.as_ref()
                && active.key == key
            {
                debug!(capability = %shared.name(), session_id = %active.id, "reusing session");
                return Ok(EnsureOutcome::Reused);
            }
            if let Some(old) = state.session.take() {
                info!(capability = %shared.name(), session_id = %old.id, "configuration changed, tearing down session");
                // Streams on the old session die with it, except the stream
                // operation that asked for the new configuration.
                if !caller.is_some_and(|ticket| state.stream.is_current(ticket)) {
                    state.stream.cancel();
                }
                old.handle.destroy();
                shared.emit(SessionStatus::Idle);
            }

            if !shared.capability.is_supported() {
                let reason = shared.capability.unsupported_reason();
                warn!(capability = %shared.name(), %reason, "capability unsupported");
                shared.emit(SessionStatus::error(reason.clone()));
                return Err(SessionError::CapabilityUnsupported {
                    capability: shared.name().to_owned(),
                    reason,
                });
            }

            let ticket = state.init.begin();
            shared.emit(SessionStatus::Checking);
            ticket
        };
        debug!(capability = %shared.name(), epoch = ticket.epoch(), config = %key, "checking availability");

        let availability = shared.capability.availability(config).await;
        let availability = {
            let mut state = shared.state.lock();
            if !state.init.is_current(&ticket) {
                debug!(capability = %shared.name(), epoch = ticket.epoch(), "initialization superseded during availability check");
                return Ok(EnsureOutcome::Superseded);
            }
            match availability {
                Ok(Availability::Unavailable { reason }) | Err(CapabilityError::Unavailable(reason)) => {
                    let error = SessionError::ModelUnavailable {
                        capability: shared.name().to_owned(),
                        reason,
                    };
                    return Err(shared.fail_init(&mut state, &ticket, error));
                }
                Ok(availability) => availability,
                Err(err) => {
                    let error = SessionError::Initialization {
                        capability: shared.name().to_owned(),
                        message: err.message().to_owned(),
                    };
                    return Err(shared.fail_init(&mut state, &ticket, error));
                }
            }
        };

        let monitor = if availability.needs_download() {
            self.progress_monitor(&ticket)
        } else {
            CreateMonitor::new(ticket.token().clone())
        };
        info!(
            capability = %shared.name(),
            epoch = ticket.epoch(),
            download = availability.needs_download(),
            "creating session"
        );
        let created = shared.capability.create(config, monitor).await;

        let mut state = shared.state.lock();
        if !state.init.is_current(&ticket) {
            if let Ok(orphan) = created {
                debug!(capability = %shared.name(), epoch = ticket.epoch(), "destroying session created by superseded initialization");
                orphan.destroy();
            }
            return Ok(EnsureOutcome::Superseded);
        }
        match created {
            Ok(session) => {
                if let Some(stale) = state.session.take() {
                    warn!(capability = %shared.name(), session_id = %stale.id, "replacing session committed during initialization");
                    stale.handle.destroy();
                    shared.emit(SessionStatus::Idle);
                }
                let id = uuid::Uuid::new_v4();
                state.session = Some(ActiveSession {
                    id,
                    key,
                    config: config.clone(),
                    handle: Arc::new(session),
                });
                state.init.finish(&ticket);
                info!(capability = %shared.name(), session_id = %id, "session ready");
                shared.emit(SessionStatus::Ready);
                Ok(EnsureOutcome::Created)
            }
            Err(err) => {
                let error = SessionError::Initialization {
                    capability: shared.name().to_owned(),
                    message: err.message().to_owned(),
                };
                Err(shared.fail_init(&mut state, &ticket, error))
            }
        }
    }

    fn progress_monitor(&self, ticket: &OperationTicket) -> CreateMonitor {
        let weak = Arc::downgrade(&self.shared);
        let owner = ticket.clone();
        let high_water = AtomicU8::new(0);
        CreateMonitor::with_progress(ticket.token().clone(), move |fraction| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let percent = (fraction * 100.0).round() as u8;
            let progress = high_water.fetch_max(percent, Ordering::Relaxed).max(percent);
            let state = shared.state.lock();
            if state.init.is_current(&owner) {
                shared.emit(SessionStatus::Downloading { progress });
            }
        })
    }

    /// Runs one streaming operation (translate, summarize, prompt, ...).
    ///
    /// Any earlier stream operation is cancelled first. Initialization errors
    /// are returned unchanged; a cancelled operation yields an empty or
    /// truncated stream instead of an error.
    pub async fn stream_operation(
        &self,
        input: &str,
        config: &B::Config,
    ) -> Result<OperationStream, SessionError> {
        let shared = &self.shared;
        let key = config_key(config)?;
        let ticket = shared.state.lock().stream.begin();

        let outcome = match self.ensure_keyed(config, key.clone(), Some(&ticket)).await {
            Ok(outcome) => outcome,
            Err(err) => {
                shared.state.lock().stream.finish(&ticket);
                return Err(err);
            }
        };

        let (session_id, handle) = {
            let mut state = shared.state.lock();
            let live = match state.session.as_ref() {
                Some(active) if active.key == key => Some((active.id, Arc::clone(&active.handle))),
                _ => None,
            };
            match live {
                Some(live)
                    if outcome != EnsureOutcome::Superseded && state.stream.is_current(&ticket) =>
                {
                    live
                }
                _ => {
                    state.stream.finish(&ticket);
                    debug!(capability = %shared.name(), epoch = ticket.epoch(), "stream operation superseded before start");
                    return Ok(OperationStream::finished());
                }
            }
        };

        let prepared = shared.capability.preprocess(input);
        debug!(
            capability = %shared.name(),
            session_id = %session_id,
            epoch = ticket.epoch(),
            input_len = prepared.len(),
            "opening stream"
        );
        let opened = handle.operate(prepared, ticket.token().clone()).await;
        let chunks = match opened {
            Ok(chunks) => chunks,
            Err(err) => {
                let mut state = shared.state.lock();
                let current = state.stream.is_current(&ticket);
                state.stream.finish(&ticket);
                if err.is_aborted() || !current {
                    return Ok(OperationStream::finished());
                }
                let error = SessionError::StreamFailure {
                    capability: shared.name().to_owned(),
                    message: err.message().to_owned(),
                };
                warn!(capability = %shared.name(), session_id = %session_id, error = %error, "failed to open stream");
                shared.emit(SessionStatus::error(error.status_message()));
                return Err(error);
            }
        };

        Ok(OperationStream::new(relay_chunks(
            Arc::clone(shared),
            ticket,
            session_id,
            chunks,
        )))
    }

    /// Cancels the in-flight stream operation, if any.
    pub fn abort_stream(&self) {
        self.shared.state.lock().stream.cancel();
    }

    /// Cancels the in-flight initialization, if any. No status is broadcast.
    pub fn abort_initialization(&self) {
        self.shared.state.lock().init.cancel();
    }

    /// Cancels all in-flight work and releases the session. Safe to call when
    /// no session exists; `idle` is only broadcast when one was released.
    pub fn destroy_session(&self) {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        state.init.cancel();
        state.stream.cancel();
        if let Some(active) = state.session.take() {
            active.handle.destroy();
            info!(capability = %shared.name(), session_id = %active.id, "session destroyed");
            shared.emit(SessionStatus::Idle);
        }
    }
}

struct ChunkRelay<B: Capability> {
    shared: Arc<Shared<B>>,
    ticket: OperationTicket,
    session_id: uuid::Uuid,
    chunks: Option<ChunkStream>,
    seq: u64,
}

impl<B: Capability> ChunkRelay<B> {
    fn finish(&self) {
        self.shared.state.lock().stream.finish(&self.ticket);
    }

    /// Classifies a read failure; `None` means the operation was cancelled and
    /// ends silently.
    fn fail(&self, err: CapabilityError) -> Option<SessionError> {
        let mut state = self.shared.state.lock();
        let current = state.stream.is_current(&self.ticket);
        state.stream.finish(&self.ticket);
        if err.is_aborted() || !current {
            debug!(capability = %self.shared.name(), epoch = self.ticket.epoch(), "stream ended by cancellation");
            return None;
        }
        let error = SessionError::StreamFailure {
            capability: self.shared.name().to_owned(),
            message: err.message().to_owned(),
        };
        warn!(
            capability = %self.shared.name(),
            session_id = %self.session_id,
            seq = self.seq,
            error = %error,
            "stream read failed"
        );
        self.shared.emit(SessionStatus::error(error.status_message()));
        Some(error)
    }
}

fn relay_chunks<B: Capability>(
    shared: Arc<Shared<B>>,
    ticket: OperationTicket,
    session_id: uuid::Uuid,
    chunks: ChunkStream,
) -> BoxStream<'static, Result<String, SessionError>> {
    let relay = ChunkRelay {
        shared,
        ticket,
        session_id,
        chunks: Some(chunks),
        seq: 0,
    };
    futures::stream::unfold(relay, |mut relay| async move {
        loop {
            let mut chunks = relay.chunks.take()?;
            let next = tokio::select! {
                biased;
                _ = relay.ticket.token().cancelled() => None,
                item = chunks.next() => Some(item),
            };
            match next {
                None => {
                    debug!(capability = %relay.shared.name(), epoch = relay.ticket.epoch(), seq = relay.seq, "stream cancelled");
                    relay.finish();
                    return None;
                }
                Some(None) => {
                    debug!(capability = %relay.shared.name(), session_id = %relay.session_id, chunks = relay.seq, "stream completed");
                    relay.finish();
                    return None;
                }
                Some(Some(Ok(text))) => {
                    relay.chunks = Some(chunks);
                    if text.is_empty() {
                        continue;
                    }
                    relay.seq = relay.seq.saturating_add(1);
                    return Some((Ok(text), relay));
                }
                Some(Some(Err(err))) => {
                    drop(chunks);
                    let error = relay.fail(err)?;
                    return Some((Err(error), relay));
                }
            }
        }
    })
    .boxed()
}
