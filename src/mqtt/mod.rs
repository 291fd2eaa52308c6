//! # MQTT Integration Module
//!
//! Owns the broker connection of the monitor: connecting, subscribing to the
//! infotainment topics, noticing link loss, renewing subscriptions after the
//! transport reconnects and tearing the session down again.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - broker settings, topic list, connect options
//! ├── message_manager.rs  - raw deliveries and transport events
//! ├── transport.rs        - Transport trait and the rumqttc implementation
//! └── mqtt_handler.rs     - ConnectionManager task and MonitorHandle
//! ```
//!
//! Deliveries never call into the telemetry code from the transport's own
//! task. They travel through a bounded channel to the manager task, which
//! is the only writer of the observable state.

pub mod config;
pub mod message_manager;
pub mod mqtt_handler;
pub mod transport;

pub use config::{ConnectOptions, MqttConfig, MqttServer, INFOTAINMENT_TOPICS};
pub use message_manager::{RawMessage, TransportEvent};
pub use mqtt_handler::{ConnectionCommand, ConnectionManager, ManagerSettings, MonitorHandle};
pub use transport::{RumqttTransport, Transport};
