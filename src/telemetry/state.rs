//! Observable monitor state.
//!
//! Holds the three values presenters watch: connection status, message log
//! and vehicle snapshot. Each sits in its own `watch` channel, so a write
//! replaces the whole value under the channel lock and readers never observe
//! a half-applied update. Only the connection manager writes.

use super::dispatcher::Dispatch;
use super::message_log::{LogEntry, MessageLog};
use super::reducer::{StateUpdate, VehicleState};
use std::fmt;
use tokio::sync::watch;
use tracing::debug;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Disconnected => "DISCONNECTED",
            ConnectionStatus::Connecting => "CONNECTING",
            ConnectionStatus::Connected => "CONNECTED",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
pub struct MonitorState {
    status: watch::Sender<ConnectionStatus>,
    log: watch::Sender<MessageLog>,
    vehicle: watch::Sender<VehicleState>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new(MessageLog::default())
    }
}

impl MonitorState {
    pub fn new(log: MessageLog) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        let (log, _) = watch::channel(log);
        let (vehicle, _) = watch::channel(VehicleState::default());
        MonitorState {
            status,
            log,
            vehicle,
        }
    }

    pub fn with_log_capacity(capacity: usize) -> Self {
        Self::new(MessageLog::with_capacity(capacity))
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_log(&self) -> watch::Receiver<MessageLog> {
        self.log.subscribe()
    }

    pub fn subscribe_vehicle(&self) -> watch::Receiver<VehicleState> {
        self.vehicle.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn vehicle(&self) -> VehicleState {
        self.vehicle.borrow().clone()
    }

    pub fn log_snapshot(&self) -> Vec<LogEntry> {
        self.log.borrow().snapshot()
    }

    pub fn log_len(&self) -> usize {
        self.log.borrow().len()
    }

    /// Publishes `status`; observers are only woken when it actually changes.
    pub(crate) fn set_status(&self, status: ConnectionStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            debug!("Connection status is now {}", status);
        }
    }

    pub(crate) fn append(&self, entry: LogEntry) {
        self.log.send_modify(|log| log.append(entry));
    }

    pub(crate) fn apply(&self, update: StateUpdate) {
        self.vehicle.send_if_modified(|current| {
            let next = current.apply(update);
            if next == *current {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Commits the effects of one dispatched message, vehicle first.
    pub(crate) fn commit(&self, dispatch: Dispatch) {
        if let Some(update) = dispatch.update {
            self.apply(update);
        }
        if let Some(entry) = dispatch.entry {
            self.append(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::message_log::LogKind;

    #[tokio::test]
    async fn status_is_published_on_change_only() {
        let state = MonitorState::default();
        let mut rx = state.subscribe_status();
        assert_eq!(*rx.borrow_and_update(), ConnectionStatus::Disconnected);

        state.set_status(ConnectionStatus::Disconnected);
        assert!(!rx.has_changed().unwrap());

        state.set_status(ConnectionStatus::Connecting);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn vehicle_updates_replace_the_snapshot() {
        let state = MonitorState::default();
        let mut rx = state.subscribe_vehicle();
        let _ = rx.borrow_and_update();

        state.apply(StateUpdate::Eta(42));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().eta_minutes, 42);

        // same value again is not a change
        state.apply(StateUpdate::Eta(42));
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn log_appends_are_observable() {
        let state = MonitorState::with_log_capacity(2);
        let mut rx = state.subscribe_log();
        let _ = rx.borrow_and_update();

        for n in 0..3 {
            state.append(LogEntry::new(LogKind::Other, format!("n{}", n), ""));
        }
        assert!(rx.has_changed().unwrap());
        let (len, total) = {
            let log = rx.borrow_and_update();
            (log.len(), log.total_appended())
        };
        assert_eq!((len, total), (2, 3));
        assert_eq!(state.log_len(), 2);
    }
}
