//! Connection lifecycle and the single task that owns the monitor state.
//!
//! ```text
//! MonitorHandle ─[ConnectionCommand]─┐
//!                                     ├─► ConnectionManager::run ──► MonitorState
//! Transport pump ─[TransportEvent]───┘        (single writer)         (watch channels)
//! ```
//!
//! Every failure is absorbed here and surfaces as a status transition plus
//! one synthetic log entry. Nothing is returned to the caller as an error.

use super::config::{ConnectOptions, MqttConfig};
use super::message_manager::{RawMessage, TransportEvent};
use super::transport::Transport;
use crate::error::MonitorError;
use crate::telemetry::{
    ConnectionStatus, Dispatcher, LogEntry, LogKind, MessageLog, MonitorState, VehicleState,
};
use rumqttc::QoS;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Requests the handle sends to the manager task.
#[derive(Debug)]
pub enum ConnectionCommand {
    Connect {
        response_tx: oneshot::Sender<ConnectionStatus>,
    },
    Disconnect {
        response_tx: oneshot::Sender<ConnectionStatus>,
    },
    Shutdown {
        response_tx: oneshot::Sender<ConnectionStatus>,
    },
}

/// Settings the manager needs besides the broker configuration.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub log_capacity: usize,
    pub event_capacity: usize,
    pub log_status_updates: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        ManagerSettings {
            log_capacity: crate::telemetry::DEFAULT_LOG_CAPACITY,
            event_capacity: 256,
            log_status_updates: false,
        }
    }
}

pub struct ConnectionManager<T: Transport> {
    transport: T,
    config: MqttConfig,
    client_id: String,
    state: Arc<MonitorState>,
    dispatcher: Dispatcher,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: mpsc::Receiver<TransportEvent>,
    /// Set between a successful connect and the next disconnect. Link events
    /// outside that window belong to a session already torn down.
    session_open: bool,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, config: MqttConfig, settings: ManagerSettings) -> Self {
        let (events_tx, events_rx) = mpsc::channel(settings.event_capacity.max(1));
        let client_id = config.client_id();
        debug!("Created connection manager with client id {}", client_id);

        ConnectionManager {
            transport,
            config,
            client_id,
            state: Arc::new(MonitorState::new(MessageLog::with_capacity(
                settings.log_capacity,
            ))),
            dispatcher: Dispatcher::new(settings.log_status_updates),
            events_tx,
            events_rx,
            session_open: false,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> Arc<MonitorState> {
        self.state.clone()
    }

    pub fn connect_options(&self) -> ConnectOptions {
        self.config.connect_options(&self.client_id)
    }

    /// Sender the transport delivers into; exposed so deliveries can be
    /// injected without a broker.
    pub fn event_sender(&self) -> mpsc::Sender<TransportEvent> {
        self.events_tx.clone()
    }

    /// Opens the session and subscribes every configured topic.
    ///
    /// Always ends in `Connected` or `Disconnected`. A no-op while a session
    /// is already up.
    pub async fn connect(&mut self) -> ConnectionStatus {
        if self.state.status() == ConnectionStatus::Connected {
            debug!("connect() while already connected, ignoring");
            return ConnectionStatus::Connected;
        }

        self.state.set_status(ConnectionStatus::Connecting);
        info!("Connecting to MQTT broker {}", self.config.server);

        match self.open_session().await {
            Ok(()) => {
                self.session_open = true;
                self.state.set_status(ConnectionStatus::Connected);
                self.state.append(LogEntry::new(
                    LogKind::Other,
                    "Connected",
                    "Successfully connected to MQTT broker",
                ));
                info!(
                    "Connected and subscribed to {} topics",
                    self.config.subbed_topics.len()
                );
            }
            Err(e) => {
                error!("Failed to connect: {}", e);
                self.session_open = false;
                // leave no half-open session behind
                if let Err(e) = self.transport.disconnect().await {
                    debug!("Ignoring teardown error after failed connect: {}", e);
                }
                self.state.set_status(ConnectionStatus::Disconnected);
                self.state.append(LogEntry::new(
                    LogKind::Other,
                    "Connection Error",
                    failure_reason(&e, "Failed to connect"),
                ));
            }
        }
        self.state.status()
    }

    /// Best-effort teardown. Errors are discarded and the status ends up
    /// `Disconnected` either way.
    pub async fn disconnect(&mut self) -> ConnectionStatus {
        self.session_open = false;
        if let Err(e) = self.transport.disconnect().await {
            debug!("Ignoring disconnect error: {}", e);
        }
        if self.state.status() != ConnectionStatus::Disconnected {
            info!("Disconnected from MQTT broker");
        }
        self.state.set_status(ConnectionStatus::Disconnected);
        ConnectionStatus::Disconnected
    }

    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(message) => self.ingest(message),
            TransportEvent::ConnectionLost(cause) => {
                if !self.session_open || self.state.status() == ConnectionStatus::Disconnected {
                    debug!("Link loss reported while disconnected: {}", cause);
                    return;
                }
                let error = MonitorError::ConnectionLost(cause);
                warn!("{}", error);
                self.state.set_status(ConnectionStatus::Disconnected);
                self.state.append(LogEntry::new(
                    LogKind::Other,
                    "Connection Lost",
                    failure_reason(&error, "Unknown error"),
                ));
            }
            TransportEvent::Reconnected => {
                if !self.session_open {
                    debug!("Ignoring reconnect of a closed session");
                    return;
                }
                self.resubscribe().await
            }
        }
    }

    /// Owns the manager until shutdown, serving commands and deliveries in
    /// arrival order.
    pub async fn run(mut self, mut commands: mpsc::Receiver<ConnectionCommand>) {
        info!("Connection manager started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ConnectionCommand::Connect { response_tx }) => {
                        let status = self.connect().await;
                        let _ = response_tx.send(status);
                    }
                    Some(ConnectionCommand::Disconnect { response_tx }) => {
                        let status = self.disconnect().await;
                        let _ = response_tx.send(status);
                    }
                    Some(ConnectionCommand::Shutdown { response_tx }) => {
                        let status = self.disconnect().await;
                        let _ = response_tx.send(status);
                        break;
                    }
                    None => {
                        debug!("All handles dropped");
                        self.disconnect().await;
                        break;
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
            }
        }
        info!("Connection manager stopped");
    }

    fn ingest(&self, message: RawMessage) {
        let dispatch = self.dispatcher.dispatch(&message.topic, &message.payload);
        self.state.commit(dispatch);
    }

    async fn open_session(&mut self) -> Result<(), MonitorError> {
        let options = self.connect_options();
        self.transport
            .connect(&options, self.events_tx.clone())
            .await?;
        self.subscribe_all().await
    }

    async fn subscribe_all(&mut self) -> Result<(), MonitorError> {
        for topic in &self.config.subbed_topics {
            debug!("Subscribing to {}", topic);
            self.transport.subscribe(topic, QoS::AtLeastOnce).await?;
        }
        Ok(())
    }

    /// A clean session forgets subscriptions, so they are renewed explicitly
    /// after the transport reconnects.
    async fn resubscribe(&mut self) {
        info!("Transport reconnected, renewing subscriptions");
        match self.subscribe_all().await {
            Ok(()) => {
                self.state.set_status(ConnectionStatus::Connected);
                self.state.append(LogEntry::new(
                    LogKind::Other,
                    "Reconnected",
                    "Connection to MQTT broker re-established",
                ));
            }
            Err(e) => {
                error!("Failed to renew subscriptions: {}", e);
                self.state.set_status(ConnectionStatus::Disconnected);
                self.state.append(LogEntry::new(
                    LogKind::Other,
                    "Connection Error",
                    failure_reason(&e, "Failed to resubscribe"),
                ));
            }
        }
    }
}

fn failure_reason(error: &MonitorError, fallback: &str) -> String {
    let reason = match error {
        MonitorError::ConnectFailure(reason)
        | MonitorError::ConnectionLost(reason)
        | MonitorError::DisconnectFailure(reason)
        | MonitorError::ChannelError(reason) => reason.clone(),
        other => other.to_string(),
    };
    if reason.trim().is_empty() {
        fallback.to_string()
    } else {
        reason
    }
}

/// Cloneable front door to a running [`ConnectionManager`].
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<ConnectionCommand>,
    state: Arc<MonitorState>,
}

impl MonitorHandle {
    /// Spawns `manager` on the tokio runtime and returns a handle to it.
    pub fn spawn<T: Transport>(manager: ConnectionManager<T>) -> (Self, JoinHandle<()>) {
        let (commands, command_rx) = mpsc::channel(32);
        let state = manager.state();
        let task = tokio::spawn(manager.run(command_rx));
        (MonitorHandle { commands, state }, task)
    }

    pub async fn connect(&self) -> ConnectionStatus {
        self.request(|response_tx| ConnectionCommand::Connect { response_tx })
            .await
    }

    pub async fn disconnect(&self) -> ConnectionStatus {
        self.request(|response_tx| ConnectionCommand::Disconnect { response_tx })
            .await
    }

    /// Disconnects and stops the manager task.
    pub async fn shutdown(&self) -> ConnectionStatus {
        self.request(|response_tx| ConnectionCommand::Shutdown { response_tx })
            .await
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.state.subscribe_status()
    }

    pub fn messages(&self) -> watch::Receiver<MessageLog> {
        self.state.subscribe_log()
    }

    pub fn vehicle(&self) -> watch::Receiver<VehicleState> {
        self.state.subscribe_vehicle()
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// A stopped manager answers with the last published status.
    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<ConnectionStatus>) -> ConnectionCommand,
    ) -> ConnectionStatus {
        match self.send_command(command).await {
            Ok(status) => status,
            Err(e) => {
                warn!("{}", e);
                self.state.status()
            }
        }
    }

    async fn send_command(
        &self,
        command: impl FnOnce(oneshot::Sender<ConnectionStatus>) -> ConnectionCommand,
    ) -> Result<ConnectionStatus, MonitorError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.commands
            .send(command(response_tx))
            .await
            .map_err(|_| MonitorError::ChannelError("connection manager is not running".into()))?;
        response_rx
            .await
            .map_err(|_| MonitorError::ChannelError("connection manager dropped the request".into()))
    }
}
