//! Transport ports: where encoded frames and MQTT messages go.
//!
//! Concrete implementations:
//! - TCP socket server (`adapters::socket`) for the binary protocol
//! - ESP-IDF MQTT client (`adapters::mqtt_client`)
//!
//! The servers in [`ws`](super::ws) and [`mqtt`](super::mqtt) are generic
//! over these traits, so the dispatch logic runs unchanged on host tests.

use crate::error::MqttError;

// ───────────────────────────────────────────────────────────────
// Binary protocol clients
// ───────────────────────────────────────────────────────────────

/// Output side of the binary transport.
pub trait ClientSink {
    /// Send a frame to a single client.
    fn send_to(&mut self, client_id: u32, frame: &[u8]);

    /// Send a frame to every connected client except `exclude`.
    fn broadcast(&mut self, frame: &[u8], exclude: Option<u32>);
}

/// A sink with no clients.  Useful before the listener is up.
pub struct NullClients;

impl ClientSink for NullClients {
    fn send_to(&mut self, _client_id: u32, _frame: &[u8]) {}

    fn broadcast(&mut self, _frame: &[u8], _exclude: Option<u32>) {}
}

// ───────────────────────────────────────────────────────────────
// MQTT broker client
// ───────────────────────────────────────────────────────────────

/// Max topic length carried through the inbound channel.
pub const MQTT_TOPIC_SIZE: usize = 96;
/// Max payload length carried through the inbound channel.
pub const MQTT_PAYLOAD_SIZE: usize = 32;

/// One message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: heapless::String<MQTT_TOPIC_SIZE>,
    pub payload: heapless::Vec<u8, MQTT_PAYLOAD_SIZE>,
}

impl MqttMessage {
    /// `None` if either part exceeds its capacity.
    pub fn new(topic: &str, payload: &[u8]) -> Option<Self> {
        let mut t = heapless::String::new();
        t.push_str(topic).ok()?;
        Some(Self {
            topic: t,
            payload: heapless::Vec::from_slice(payload).ok()?,
        })
    }
}

/// Broker connection parameters, borrowed from the config record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MqttConnectOptions<'a> {
    pub host: &'a str,
    pub port: u16,
    pub user: &'a str,
    pub password: &'a str,
    pub client_id: &'a str,
}

/// Broker client driven by [`MqttServer`](super::mqtt::MqttServer).
pub trait MqttClientPort {
    /// Begin connecting.  Completion is observed through `is_connected`.
    fn connect(&mut self, options: &MqttConnectOptions<'_>) -> Result<(), MqttError>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), MqttError>;

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), MqttError>;

    /// Next message received since the last call, if any.
    fn poll_message(&mut self) -> Option<MqttMessage>;
}

/// A client that never connects.
pub struct NullMqttClient;

impl MqttClientPort for NullMqttClient {
    fn connect(&mut self, _options: &MqttConnectOptions<'_>) -> Result<(), MqttError> {
        Err(MqttError::Client("no client"))
    }

    fn disconnect(&mut self) {}

    fn is_connected(&self) -> bool {
        false
    }

    fn subscribe(&mut self, _topic: &str) -> Result<(), MqttError> {
        Err(MqttError::NotConnected)
    }

    fn publish(&mut self, _topic: &str, _payload: &str) -> Result<(), MqttError> {
        Err(MqttError::NotConnected)
    }

    fn poll_message(&mut self) -> Option<MqttMessage> {
        None
    }
}
