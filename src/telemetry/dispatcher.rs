//! Classification of decoded payloads and the per-kind handlers.
//!
//! ```text
//! RawMessage ──► decode ──► TelemetryMessage ──► Dispatch { entry, update }
//!                  │
//!                  └─(error)──► Other / "Parse Error"
//! ```

use super::decoder::{decode, DecodedMessage};
use super::message_log::{LogEntry, LogKind};
use super::reducer::{StateUpdate, VehicleState};
use crate::error::MonitorError;
use tracing::{debug, warn};

/// Closed set of message kinds understood by the monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryMessage {
    Hazard {
        title: String,
        description: String,
        severity: String,
    },
    Reroute {
        title: String,
        old_eta_minutes: i64,
        new_eta_minutes: i64,
        time_saved_minutes: i64,
    },
    Alternative {
        title: String,
        options: usize,
    },
    Autonomous {
        title: String,
        mode: String,
    },
    ScreenCommand {
        screen_state: String,
    },
    VehicleStatus(VehicleState),
    Unknown(String),
}

impl TelemetryMessage {
    /// Maps a decoded payload to its kind, reading fields with their defaults.
    pub fn classify(msg: &DecodedMessage) -> TelemetryMessage {
        match msg.message_type() {
            "hazard_notification" => TelemetryMessage::Hazard {
                title: msg.str_or("title", "Hazard Alert"),
                description: msg.str_or("description", ""),
                severity: msg.str_or("severity", "medium"),
            },
            "reroute_notification" => TelemetryMessage::Reroute {
                title: msg.str_or("title", "Route Updated"),
                old_eta_minutes: msg.int_or("old_eta_minutes", 0),
                new_eta_minutes: msg.int_or("new_eta_minutes", 0),
                time_saved_minutes: msg.int_or("time_saved_minutes", 0),
            },
            "alternative_suggestion" => TelemetryMessage::Alternative {
                title: msg.str_or("title", "Alternatives Available"),
                options: msg.array_len("alternatives").unwrap_or(0),
            },
            "autonomous_confirmation" => TelemetryMessage::Autonomous {
                title: msg.str_or("title", "Autonomous Mode"),
                mode: msg.str_or("autonomous_mode", "unknown"),
            },
            "screen_command" => TelemetryMessage::ScreenCommand {
                screen_state: msg.str_or("screen_state", "MODES"),
            },
            "vehicle_status" => {
                TelemetryMessage::VehicleStatus(VehicleState::from_status_report(msg))
            }
            other => TelemetryMessage::Unknown(other.to_string()),
        }
    }
}

/// What one inbound message does to the observable state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    pub entry: Option<LogEntry>,
    pub update: Option<StateUpdate>,
}

impl Dispatch {
    fn log(entry: LogEntry) -> Self {
        Dispatch {
            entry: Some(entry),
            update: None,
        }
    }

    fn with_update(mut self, update: StateUpdate) -> Self {
        self.update = Some(update);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    log_status_updates: bool,
}

impl Dispatcher {
    /// With `log_status_updates` set, status reports also produce a Status
    /// entry instead of being applied silently.
    pub fn new(log_status_updates: bool) -> Self {
        Dispatcher { log_status_updates }
    }

    /// Decodes and classifies one payload. Never fails: a bad payload becomes
    /// a single "Parse Error" entry and leaves the vehicle state alone.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> Dispatch {
        match decode(payload).map_err(MonitorError::from) {
            Ok(msg) => {
                debug!(topic, message_type = msg.message_type(), "dispatching message");
                self.handle(TelemetryMessage::classify(&msg))
            }
            Err(e) => {
                warn!(topic, "dropping undecodable payload: {}", e);
                parse_error(&e)
            }
        }
    }

    pub fn handle(&self, message: TelemetryMessage) -> Dispatch {
        match message {
            TelemetryMessage::Hazard {
                title,
                description,
                severity,
            } => Dispatch::log(LogEntry::new(
                LogKind::Hazard,
                title,
                format!("{} (Severity: {})", description, severity),
            )),
            TelemetryMessage::Reroute {
                title,
                old_eta_minutes,
                new_eta_minutes,
                time_saved_minutes,
            } => {
                let description = format!(
                    "Old: {}min → New: {}min (Saved: {}min)",
                    old_eta_minutes, new_eta_minutes, time_saved_minutes
                );
                let eta = u32::try_from(new_eta_minutes.max(0)).unwrap_or(u32::MAX);
                Dispatch::log(LogEntry::new(LogKind::Reroute, title, description))
                    .with_update(StateUpdate::Eta(eta))
            }
            TelemetryMessage::Alternative { title, options } => Dispatch::log(LogEntry::new(
                LogKind::Alternative,
                title,
                format!("{} alternative options available", options),
            )),
            TelemetryMessage::Autonomous { title, mode } => {
                let entry = LogEntry::new(LogKind::Autonomous, title, format!("Mode: {}", mode));
                Dispatch::log(entry).with_update(StateUpdate::AutonomousMode(mode))
            }
            TelemetryMessage::ScreenCommand { screen_state } => Dispatch::log(LogEntry::new(
                LogKind::ScreenCommand,
                "Screen Command",
                format!("Switch to: {}", screen_state),
            )),
            TelemetryMessage::VehicleStatus(state) => {
                // status reports arrive several times a second
                let entry = self.log_status_updates.then(|| {
                    LogEntry::new(
                        LogKind::Status,
                        "Vehicle Update",
                        format!("Location: ({}, {})", state.location.x, state.location.y),
                    )
                });
                Dispatch {
                    entry,
                    update: Some(StateUpdate::Replace(state)),
                }
            }
            TelemetryMessage::Unknown(message_type) => Dispatch::log(LogEntry::new(
                LogKind::Other,
                "Unknown Message",
                format!("Type: {}", message_type),
            )),
        }
    }
}

fn parse_error(error: &MonitorError) -> Dispatch {
    let reason = match error {
        MonitorError::ParseFailure(decode) => decode.to_string(),
        other => other.to_string(),
    };
    Dispatch::log(LogEntry::new(LogKind::Other, "Parse Error", reason))
}
