//! Broker transport seam.
//!
//! The connection manager only talks to a [`Transport`]. The production
//! implementation wraps `rumqttc::AsyncClient` and spawns a pump task that
//! drives the event loop and forwards deliveries into the manager's bounded
//! event channel. Tests substitute an in-memory transport.
//!
//! ```text
//! Broker ──► EventLoop::poll (pump task) ──[TransportEvent]──► ConnectionManager
//!                    ▲                       mpsc (bounded)
//!                    └── reconnects on the next poll after an error
//! ```

use super::config::ConnectOptions;
use super::message_manager::{RawMessage, TransportEvent};
use crate::error::MonitorError;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long a graceful disconnect may take before the pump is aborted.
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);
/// Slack on top of rumqttc's connection timeout before giving up on ConnAck.
const CONNECT_GRACE: Duration = Duration::from_secs(1);

#[async_trait]
pub trait Transport: Send + 'static {
    /// Opens a session and starts forwarding deliveries into `events`.
    ///
    /// Returns once the broker acknowledged the connection, or with
    /// [`MonitorError::ConnectFailure`].
    async fn connect(
        &mut self,
        options: &ConnectOptions,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), MonitorError>;

    async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), MonitorError>;

    /// Closes the session and releases its resources. Calling it without an
    /// open session is a no-op.
    async fn disconnect(&mut self) -> Result<(), MonitorError>;
}

/// [`Transport`] backed by rumqttc.
#[derive(Default)]
pub struct RumqttTransport {
    client: Option<AsyncClient>,
    pump: Option<JoinHandle<()>>,
    shutdown: Option<CancellationToken>,
}

impl RumqttTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn mqtt_options(options: &ConnectOptions) -> MqttOptions {
        let mut mqtt_options = MqttOptions::new(&options.client_id, &options.host, options.port);
        mqtt_options
            .set_keep_alive(options.keep_alive)
            .set_clean_session(options.clean_session)
            .set_max_packet_size(options.max_packet_size, options.max_packet_size);
        if let Some((user, pw)) = &options.credentials {
            mqtt_options.set_credentials(user, pw);
        }
        mqtt_options
    }

    /// Polls until the broker's ConnAck arrives.
    async fn await_connack(eventloop: &mut EventLoop) -> Result<(), MonitorError> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!("ConnAck received: {:?}", ack.code);
                    return Ok(());
                }
                Ok(event) => debug!("Event before ConnAck: {:?}", event),
                Err(e) => return Err(MonitorError::ConnectFailure(e.to_string())),
            }
        }
    }

    async fn release(&mut self) {
        if let Some(token) = self.shutdown.take() {
            token.cancel();
        }
        if let Some(mut pump) = self.pump.take() {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut pump).await.is_err() {
                debug!("MQTT pump did not stop in time, aborting");
                pump.abort();
            }
        }
    }
}

#[async_trait]
impl Transport for RumqttTransport {
    async fn connect(
        &mut self,
        options: &ConnectOptions,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), MonitorError> {
        if self.client.is_some() {
            debug!("Replacing existing MQTT session");
            let _ = self.disconnect().await;
        }

        if options.client_id.is_empty() || options.client_id.starts_with(' ') {
            return Err(MonitorError::ConnectFailure(format!(
                "invalid client id {:?}",
                options.client_id
            )));
        }

        info!(
            "Connecting to {}:{} as {}",
            options.host, options.port, options.client_id
        );
        let (client, mut eventloop) =
            AsyncClient::new(Self::mqtt_options(options), options.request_capacity);
        // rumqttc bounds TCP connect plus ConnAck itself, for reconnects too
        let connect_timeout = options.connect_timeout.as_secs().max(1);
        eventloop
            .network_options
            .set_connection_timeout(connect_timeout);

        let deadline = Duration::from_secs(connect_timeout) + CONNECT_GRACE;
        match tokio::time::timeout(deadline, Self::await_connack(&mut eventloop)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(MonitorError::ConnectFailure(format!(
                    "no ConnAck within {}s",
                    connect_timeout
                )))
            }
        }

        let token = CancellationToken::new();
        let reconnect_delay = options.auto_reconnect.then_some(options.reconnect_delay);
        self.pump = Some(tokio::spawn(pump(
            eventloop,
            events,
            token.clone(),
            reconnect_delay,
        )));
        self.shutdown = Some(token);
        self.client = Some(client);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), MonitorError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| MonitorError::ConnectFailure("not connected".to_string()))?;
        client
            .subscribe(topic, qos)
            .await
            .map_err(|e| MonitorError::ConnectFailure(format!("subscribe {}: {}", topic, e)))
    }

    async fn disconnect(&mut self) -> Result<(), MonitorError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };

        // Queue the DISCONNECT packet first so the pump can flush it, then tear down.
        let result = client
            .disconnect()
            .await
            .map_err(|e| MonitorError::DisconnectFailure(e.to_string()));
        if let Some(pump) = &self.pump {
            let _ = tokio::time::timeout(DISCONNECT_GRACE, async {
                while !pump.is_finished() {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await;
        }
        self.release().await;
        result
    }
}

/// Drives the rumqttc event loop for one session.
///
/// Publishes become [`TransportEvent::Message`]. The first error after an
/// established link reports [`TransportEvent::ConnectionLost`]; polling then
/// continues, which makes rumqttc reconnect, and the next ConnAck reports
/// [`TransportEvent::Reconnected`].
async fn pump(
    mut eventloop: EventLoop,
    events: mpsc::Sender<TransportEvent>,
    shutdown: CancellationToken,
    reconnect_delay: Option<Duration>,
) {
    let mut link_up = true;

    loop {
        let polled = tokio::select! {
            _ = shutdown.cancelled() => break,
            polled = eventloop.poll() => polled,
        };

        let forwarded = match polled {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = RawMessage::from_topic(publish.topic, publish.payload.to_vec());
                events.send(TransportEvent::Message(message)).await
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) if !link_up => {
                info!("MQTT link re-established");
                link_up = true;
                events.send(TransportEvent::Reconnected).await
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("DISCONNECT flushed, stopping pump");
                break;
            }
            Ok(_) => Ok(()),
            Err(e) => {
                let mut sent = Ok(());
                if link_up {
                    warn!("MQTT link lost: {}", e);
                    link_up = false;
                    sent = events.send(TransportEvent::ConnectionLost(e.to_string())).await;
                } else {
                    debug!("Reconnect attempt failed: {}", e);
                }

                let Some(delay) = reconnect_delay else {
                    break;
                };
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                sent
            }
        };

        if forwarded.is_err() {
            error!("Event receiver dropped, stopping MQTT pump");
            break;
        }
    }
}
