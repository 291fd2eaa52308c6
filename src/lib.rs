//! Real-time vehicle telemetry monitor.
//!
//! Keeps an MQTT session to the infotainment broker, classifies the JSON
//! events arriving on the six infotainment topics and folds them into three
//! observable values: connection status, a bounded message log and the
//! current vehicle state.
//!
//! ```text
//! Broker ─► mqtt::transport ─► mqtt::mqtt_handler ─► telemetry::{decoder, dispatcher}
//!                                      │                          │
//!                                      └──────► telemetry::state ◄┘
//!                                                 (watch channels)
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod mqtt;
pub mod telemetry;

pub use error::{DecodeError, MonitorError};
