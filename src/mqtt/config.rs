use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Topics the monitor listens on, all at QoS 1.
pub const INFOTAINMENT_TOPICS: [&str; 6] = [
    "infotainment/hazard",
    "infotainment/reroute",
    "infotainment/alternatives",
    "infotainment/autonomous",
    "infotainment/status",
    "infotainment/screen_command",
];

const DEFAULT_CLIENT_ID_PREFIX: &str = "TelemetryMonitor";
const DEFAULT_MAX_PACKET_SIZE: usize = 1024 * 1024;
/// Floor for `max_packet_size`, rumqttc's own default.
const MIN_PACKET_SIZE: usize = 10 * 1024;

/// MQTT broker address and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttServer {
    /// Broker address as `host:port`, port defaults to 1883
    pub url: String,
    /// Empty means anonymous
    pub user: String,
    pub pw: String,
}

impl Default for MqttServer {
    fn default() -> Self {
        MqttServer {
            url: "localhost:1883".to_string(),
            user: String::new(),
            pw: String::new(),
        }
    }
}

impl fmt::Display for MqttServer {
    // password stays out of logs
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.user.is_empty() {
            write!(f, "{}", self.url)
        } else {
            write!(f, "{}@{}", self.user, self.url)
        }
    }
}

impl MqttServer {
    /// Splits `url` into host and port. A missing or unparsable port yields 1883.
    pub fn host_and_port(&self) -> (String, u16) {
        let url = self
            .url
            .trim()
            .trim_start_matches("tcp://")
            .trim_start_matches("mqtt://");
        match url.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), port.parse().unwrap_or(1883)),
            None => (url.to_string(), 1883),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub server: MqttServer,
    pub subbed_topics: Vec<String>,
    /// A random suffix is appended per monitor instance
    pub client_id_prefix: String,
    pub connect_timeout_secs: u64,
    pub keep_alive_secs: u64,
    /// Pause between reconnect attempts after the link dropped
    pub reconnect_delay_ms: u64,
    /// Capacity of the client's outgoing request queue
    pub request_capacity: usize,
    /// Largest packet accepted from or sent to the broker, in bytes
    pub max_packet_size: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        MqttConfig {
            server: MqttServer::default(),
            subbed_topics: INFOTAINMENT_TOPICS.iter().map(|t| t.to_string()).collect(),
            client_id_prefix: DEFAULT_CLIENT_ID_PREFIX.to_string(),
            connect_timeout_secs: 10,
            keep_alive_secs: 60,
            reconnect_delay_ms: 2000,
            request_capacity: 64,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

impl MqttConfig {
    /// Fresh client id for one monitor instance. Surrounding whitespace of the
    /// prefix is dropped, rumqttc rejects ids starting with a space.
    pub fn client_id(&self) -> String {
        let prefix = self.client_id_prefix.trim();
        let prefix = if prefix.is_empty() {
            DEFAULT_CLIENT_ID_PREFIX
        } else {
            prefix
        };
        format!("{}-{}", prefix, Uuid::new_v4())
    }

    /// Transport options for one monitor instance identified by `client_id`.
    pub fn connect_options(&self, client_id: &str) -> ConnectOptions {
        let (host, port) = self.server.host_and_port();
        ConnectOptions {
            client_id: client_id.trim().to_string(),
            host,
            port,
            credentials: (!self.server.user.is_empty())
                .then(|| (self.server.user.clone(), self.server.pw.clone())),
            clean_session: true,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            auto_reconnect: true,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            request_capacity: self.request_capacity.max(self.subbed_topics.len() + 1),
            max_packet_size: self.max_packet_size.max(MIN_PACKET_SIZE),
        }
    }
}

/// Everything a transport needs to open a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
    pub clean_session: bool,
    pub connect_timeout: Duration,
    pub keep_alive: Duration,
    pub auto_reconnect: bool,
    pub reconnect_delay: Duration,
    pub request_capacity: usize,
    pub max_packet_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_infotainment_contract() {
        let config = MqttConfig::default();
        assert_eq!(config.subbed_topics.len(), 6);
        assert!(config
            .subbed_topics
            .contains(&"infotainment/screen_command".to_string()));

        let options = config.connect_options("monitor-1");
        assert!(options.clean_session);
        assert!(options.auto_reconnect);
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.keep_alive, Duration::from_secs(60));
        assert_eq!(options.credentials, None);
        assert_eq!((options.host.as_str(), options.port), ("localhost", 1883));
        assert_eq!(options.max_packet_size, 1024 * 1024);
    }

    #[test]
    fn client_id_prefix_is_trimmed() {
        let mut config = MqttConfig {
            client_id_prefix: "  Car 7 ".to_string(),
            ..MqttConfig::default()
        };
        let id = config.client_id();
        assert!(id.starts_with("Car 7-"), "{}", id);
        assert_ne!(id, config.client_id());

        config.client_id_prefix = "   ".to_string();
        assert!(config.client_id().starts_with("TelemetryMonitor-"));

        let options = config.connect_options(" padded-id ");
        assert_eq!(options.client_id, "padded-id");
    }

    #[test]
    fn packet_size_has_a_floor() {
        let config = MqttConfig {
            max_packet_size: 16,
            ..MqttConfig::default()
        };
        assert_eq!(config.connect_options("id").max_packet_size, 10 * 1024);
    }

    #[test]
    fn parses_broker_urls() {
        let server = |url: &str| MqttServer {
            url: url.to_string(),
            ..MqttServer::default()
        };
        assert_eq!(
            server("tcp://192.168.41.250:1883").host_and_port(),
            ("192.168.41.250".to_string(), 1883)
        );
        assert_eq!(
            server("broker.local:8883").host_and_port(),
            ("broker.local".to_string(), 8883)
        );
        assert_eq!(
            server("broker.local").host_and_port(),
            ("broker.local".to_string(), 1883)
        );
    }

    #[test]
    fn credentials_only_when_user_set() {
        let mut config = MqttConfig::default();
        config.server.user = "car".into();
        config.server.pw = "secret".into();
        let options = config.connect_options("id");
        assert_eq!(
            options.credentials,
            Some(("car".to_string(), "secret".to_string()))
        );
        assert_eq!(config.server.to_string(), "car@localhost:1883");
    }
}
