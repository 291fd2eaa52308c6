use async_trait::async_trait;
use rumqttc::QoS;
use std::sync::{Arc, Mutex};
use telemetry_monitor::mqtt::{
    ConnectOptions, ConnectionManager, ManagerSettings, MqttConfig, RawMessage, Transport,
    TransportEvent,
};
use telemetry_monitor::MonitorError;
use tokio::sync::mpsc;

/// What the in-memory broker saw and how it should misbehave.
#[derive(Default)]
pub struct Broker {
    pub connects: Vec<ConnectOptions>,
    pub subscriptions: Vec<(String, QoS)>,
    pub disconnects: usize,
    pub fail_connect: Option<String>,
    pub fail_subscribe: Option<String>,
    pub fail_disconnect: bool,
    pub events: Option<mpsc::Sender<TransportEvent>>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    pub broker: Arc<Mutex<Broker>>,
}

impl MockTransport {
    pub fn broker(&self) -> std::sync::MutexGuard<'_, Broker> {
        self.broker.lock().unwrap()
    }

    /// Delivers a publish the way the real pump would.
    pub async fn deliver(&self, topic: &str, payload: &str) {
        let sender = self.broker().events.clone().expect("not connected");
        sender
            .send(TransportEvent::Message(RawMessage::from_topic(
                topic,
                payload.as_bytes().to_vec(),
            )))
            .await
            .unwrap();
    }

    pub async fn signal(&self, event: TransportEvent) {
        let sender = self.broker().events.clone().expect("not connected");
        sender.send(event).await.unwrap();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &mut self,
        options: &ConnectOptions,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), MonitorError> {
        let mut broker = self.broker();
        broker.connects.push(options.clone());
        if let Some(reason) = broker.fail_connect.clone() {
            return Err(MonitorError::ConnectFailure(reason));
        }
        broker.events = Some(events);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), MonitorError> {
        let mut broker = self.broker();
        if broker.fail_subscribe.as_deref() == Some(topic) {
            return Err(MonitorError::ConnectFailure(format!(
                "subscribe {}: refused",
                topic
            )));
        }
        broker.subscriptions.push((topic.to_string(), qos));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MonitorError> {
        let mut broker = self.broker();
        broker.disconnects += 1;
        if broker.fail_disconnect {
            return Err(MonitorError::DisconnectFailure("socket already closed".into()));
        }
        Ok(())
    }
}

pub fn manager(transport: &MockTransport) -> ConnectionManager<MockTransport> {
    ConnectionManager::new(
        transport.clone(),
        MqttConfig::default(),
        ManagerSettings::default(),
    )
}
