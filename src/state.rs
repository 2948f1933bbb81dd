/// file: src/state.rs
/// description: per-channel connection lifecycle state and observer snapshots
use crate::error::DriftwireError;
use tokio::sync::watch;

/// Lifecycle phase of one channel.
///
/// `Reconnecting` wraps the closed→connecting edge while a backoff timer is
/// pending; `Failed` is terminal after the retry budget is spent and is left
/// only by an explicit manual connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Reconnecting,
    Failed,
}

impl std::fmt::Display for ChannelPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Mutable connection state, owned exclusively by a channel driver task.
/// Everything observers see goes through [`ChannelState::snapshot`].
#[derive(Debug)]
pub struct ChannelState {
    pub phase: ChannelPhase,
    pub attempt: u32,
    pub last_error: Option<String>,
    pub connection_id: Option<String>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            phase: ChannelPhase::Idle,
            attempt: 0,
            last_error: None,
            connection_id: None,
        }
    }
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a connect may start from the current phase. `Connecting`,
    /// `Open`, and `Closing` refuse: a second concurrent connect would race
    /// the live handle.
    pub fn can_connect(&self) -> bool {
        matches!(
            self.phase,
            ChannelPhase::Idle
                | ChannelPhase::Closed
                | ChannelPhase::Reconnecting
                | ChannelPhase::Failed
        )
    }

    /// Enter `Connecting`. Returns false (and changes nothing) when the guard
    /// refuses — duplicate connect calls are no-ops, not errors.
    pub fn begin_connect(&mut self) -> bool {
        if !self.can_connect() {
            return false;
        }
        self.phase = ChannelPhase::Connecting;
        true
    }

    /// Successful open: attempt counter and error reset, fresh connection id.
    pub fn mark_open(&mut self, connection_id: String) {
        self.phase = ChannelPhase::Open;
        self.attempt = 0;
        self.last_error = None;
        self.connection_id = Some(connection_id);
    }

    /// A failure-triggered teardown: record the error, bump the attempt
    /// counter, and park in `Reconnecting` until the scheduler decides.
    pub fn mark_reconnecting(&mut self, error: impl Into<String>) {
        self.phase = ChannelPhase::Reconnecting;
        self.attempt += 1;
        self.last_error = Some(error.into());
        self.connection_id = None;
    }

    /// Retry budget exhausted; persists until a manual connect.
    pub fn mark_failed(&mut self, attempts: u32) {
        self.phase = ChannelPhase::Failed;
        self.last_error = Some(DriftwireError::RetriesExhausted { attempts }.to_string());
        self.connection_id = None;
    }

    pub fn begin_close(&mut self) {
        self.phase = ChannelPhase::Closing;
    }

    /// Caller-intended closed state. Does not clear `last_error`; a
    /// disconnect after failures keeps its diagnostics readable.
    pub fn mark_closed(&mut self) {
        self.phase = ChannelPhase::Closed;
        self.connection_id = None;
    }

    /// Manual connect path: the attempt counter restarts from zero.
    pub fn reset_attempts(&mut self) {
        self.attempt = 0;
    }

    /// Force the attempt counter to the cap so no pending retry path can
    /// schedule again after a disconnect.
    pub fn suppress_retries(&mut self, cap: u32) {
        self.attempt = cap;
    }

    pub fn snapshot(&self) -> ChannelStatus {
        ChannelStatus {
            phase: self.phase,
            attempt: self.attempt,
            error: self.last_error.clone(),
            connection_id: self.connection_id.clone(),
        }
    }
}

/// Read-only snapshot published to observers through a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub phase: ChannelPhase,
    pub attempt: u32,
    pub error: Option<String>,
    pub connection_id: Option<String>,
}

impl ChannelStatus {
    pub fn is_connected(&self) -> bool {
        self.phase == ChannelPhase::Open
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self.phase,
            ChannelPhase::Connecting | ChannelPhase::Reconnecting
        )
    }
}

impl Default for ChannelStatus {
    fn default() -> Self {
        ChannelState::default().snapshot()
    }
}

/// Watch pair used by every channel driver to publish snapshots.
pub fn status_channel() -> (watch::Sender<ChannelStatus>, watch::Receiver<ChannelStatus>) {
    watch::channel(ChannelStatus::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_guard_refuses_while_connecting_or_open() {
        let mut state = ChannelState::new();

        assert!(state.begin_connect());
        assert_eq!(state.phase, ChannelPhase::Connecting);
        assert!(!state.begin_connect());

        state.mark_open("c-1".to_string());
        assert!(!state.begin_connect());
        assert_eq!(state.phase, ChannelPhase::Open);
    }

    #[test]
    fn open_clears_error_and_attempts() {
        let mut state = ChannelState::new();
        state.begin_connect();
        state.mark_reconnecting("connection refused");
        assert_eq!(state.attempt, 1);
        assert!(state.last_error.is_some());

        state.begin_connect();
        state.mark_open("c-2".to_string());
        assert_eq!(state.attempt, 0);
        assert_eq!(state.last_error, None);
        assert!(state.snapshot().is_connected());
    }

    #[test]
    fn failed_is_escapable_only_by_manual_reset() {
        let mut state = ChannelState::new();
        state.begin_connect();
        state.mark_reconnecting("refused");
        state.mark_failed(3);

        assert_eq!(state.phase, ChannelPhase::Failed);
        assert_eq!(
            state.last_error.as_deref(),
            Some("Failed after 3 reconnect attempts")
        );

        // Manual connect resets the counter and may start again.
        state.reset_attempts();
        assert!(state.begin_connect());
        assert_eq!(state.attempt, 0);
    }

    #[test]
    fn disconnect_keeps_error_but_drops_connection_id() {
        let mut state = ChannelState::new();
        state.begin_connect();
        state.mark_open("c-3".to_string());
        state.mark_reconnecting("stream ended");

        state.suppress_retries(5);
        state.mark_closed();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.phase, ChannelPhase::Closed);
        assert_eq!(snapshot.attempt, 5);
        assert_eq!(snapshot.error.as_deref(), Some("stream ended"));
        assert_eq!(snapshot.connection_id, None);
        assert!(!snapshot.is_connected());
        assert!(!snapshot.is_connecting());
    }

    #[test]
    fn default_snapshot_is_offline() {
        let status = ChannelStatus::default();
        assert_eq!(status.phase, ChannelPhase::Idle);
        assert!(!status.is_connected());
        assert!(!status.is_connecting());
        assert_eq!(status.error, None);
    }
}
