//! Message classification and state reduction.
//!
//! ```text
//! telemetry/
//! ├── decoder.rs      - payload bytes → JSON object with lenient field access
//! ├── dispatcher.rs   - message kind → log entry and/or state update
//! ├── reducer.rs      - VehicleState snapshot and its update rules
//! ├── message_log.rs  - bounded history of log entries
//! └── state.rs        - watch channels presenters subscribe to
//! ```
//!
//! Nothing here touches the network. The connection manager in
//! [`crate::mqtt`] feeds payloads in and is the only writer of
//! [`MonitorState`].

pub mod decoder;
pub mod dispatcher;
pub mod message_log;
pub mod reducer;
pub mod state;

pub use dispatcher::{Dispatch, Dispatcher, TelemetryMessage};
pub use message_log::{LogEntry, LogKind, MessageLog, DEFAULT_LOG_CAPACITY};
pub use reducer::{Location, StateUpdate, VehicleState};
pub use state::{ConnectionStatus, MonitorState};
