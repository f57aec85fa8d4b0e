use crate::infrastructure::TaskManager;
use crate::session::connection::SessionState;
use crate::session::reconnect::ReconnectPolicy;
use tokio::sync::watch;

/// Consolidated mutable session state behind one lock.
///
/// The watch value pairs the state with whether auto-reconnect is
/// currently suppressed (manual close or a fatal credential rejection),
/// so the reconnect watcher can decide from a single read.
pub struct SessionShared {
    pub task_manager: TaskManager,
    pub suppress_reconnect: bool,
    pub state_tx: watch::Sender<(SessionState, bool)>,
    pub policy: ReconnectPolicy,
}

impl SessionShared {
    pub fn new(state_tx: watch::Sender<(SessionState, bool)>, policy: ReconnectPolicy) -> Self {
        Self {
            task_manager: TaskManager::new(),
            suppress_reconnect: false,
            state_tx,
            policy,
        }
    }

    /// Pushes a state change to watchers, carrying the current
    /// suppression flag alongside it.
    pub fn notify_state(&self, state: SessionState) {
        if self.state_tx.send((state, self.suppress_reconnect)).is_err() {
            tracing::debug!(%state, "state watcher gone, change not observed");
        }
    }
}
