use chrono::NaiveDateTime;
use std::fmt;

/// One delivery from the broker. Consumed by the dispatcher, never retained.
#[derive(Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received: NaiveDateTime,
}

impl fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RawMessage")
            .field("topic", &self.topic)
            .field("payload_len", &self.payload.len())
            .field("received", &self.received)
            .finish()
    }
}

impl fmt::Display for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = String::from_utf8_lossy(&self.payload);
        let preview: String = text.chars().take(40).collect();
        write!(f, "{} {} - {}", self.received, self.topic, preview)
    }
}

impl RawMessage {
    pub fn from_topic(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        RawMessage {
            topic: topic.into(),
            payload: payload.into(),
            received: chrono::Local::now().naive_local(),
        }
    }
}

/// What the transport reports to the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(RawMessage),
    /// Established link dropped; the transport keeps retrying
    ConnectionLost(String),
    /// Transport got a fresh ConnAck after a loss
    Reconnected,
}
