use tokio_util::sync::CancellationToken;

/// Identity of one in-flight operation.
///
/// A ticket is never reused: once its operation settles it is dropped.
#[derive(Clone, Debug)]
pub struct OperationTicket {
    epoch: u64,
    token: CancellationToken,
}

impl OperationTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Tracks the single in-flight operation of one kind.
///
/// Each `begin` bumps the epoch and cancels the previous token, so a stale
/// continuation can detect supersession by comparing its ticket against the
/// slot at every resumption point.
#[derive(Debug, Default)]
pub struct OperationSlot {
    epoch: u64,
    active: Option<CancellationToken>,
}

impl OperationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the current operation (if any) and starts a new one.
    pub fn begin(&mut self) -> OperationTicket {
        self.cancel();
        let token = CancellationToken::new();
        self.active = Some(token.clone());
        OperationTicket {
            epoch: self.epoch,
            token,
        }
    }

    /// Cancels the current operation without starting a new one.
    pub fn cancel(&mut self) {
        if let Some(token) = self.active.take() {
            token.cancel();
        }
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Whether `ticket` still belongs to the most recently started operation.
    pub fn is_current(&self, ticket: &OperationTicket) -> bool {
        self.epoch == ticket.epoch && !ticket.token.is_cancelled()
    }

    /// Releases the slot if `ticket` is still current.
    pub fn finish(&mut self, ticket: &OperationTicket) {
        if self.is_current(ticket) {
            self.active = None;
        }
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.active.is_some()
    }
}
