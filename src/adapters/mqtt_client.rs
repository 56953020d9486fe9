//! MQTT client adapter.
//!
//! Implements [`MqttClientPort`] on top of the ESP-IDF MQTT client.  The
//! client runs its own task and reports through a callback; the callback
//! only flips the connection flag and pushes inbound messages into a
//! static channel that the main loop drains through
//! [`poll_message`](MqttClientPort::poll_message).
//!
//! ```text
//!  esp-mqtt task ──callback──▶ INBOX (embassy Channel) ──poll──▶ MqttServer
//!                     │
//!                     └──▶ connected: AtomicBool
//! ```
//!
//! On other targets the port is served by
//! [`NullMqttClient`](crate::rpc::transport::NullMqttClient).

#![cfg(target_os = "espidf")]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
use log::{info, warn};

use crate::error::MqttError;
use crate::rpc::transport::{MqttClientPort, MqttConnectOptions, MqttMessage};

/// Inbound messages buffered between main-loop ticks.
const MQTT_INBOX_DEPTH: usize = 8;

static INBOX: Channel<CriticalSectionRawMutex, MqttMessage, MQTT_INBOX_DEPTH> = Channel::new();

pub struct EspMqttAdapter {
    client: Option<EspMqttClient<'static>>,
    connected: Arc<AtomicBool>,
}

impl Default for EspMqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EspMqttAdapter {
    pub fn new() -> Self {
        Self {
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    fn client(&mut self) -> Result<&mut EspMqttClient<'static>, MqttError> {
        self.client.as_mut().ok_or(MqttError::NotConnected)
    }
}

impl MqttClientPort for EspMqttAdapter {
    fn connect(&mut self, options: &MqttConnectOptions<'_>) -> Result<(), MqttError> {
        self.disconnect();

        let url = format!("mqtt://{}:{}", options.host, options.port);
        let conf = MqttClientConfiguration {
            client_id: Some(options.client_id),
            username: (!options.user.is_empty()).then_some(options.user),
            password: (!options.password.is_empty()).then_some(options.password),
            ..Default::default()
        };

        let connected = Arc::clone(&self.connected);
        let client = EspMqttClient::new_cb(&url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => connected.store(true, Ordering::Release),
            EventPayload::Disconnected => connected.store(false, Ordering::Release),
            EventPayload::Received {
                topic: Some(topic),
                data,
                ..
            } => match MqttMessage::new(topic, data) {
                Some(msg) => {
                    if INBOX.try_send(msg).is_err() {
                        warn!("MQTT: inbox full, dropping message on {}", topic);
                    }
                }
                None => warn!("MQTT: message on {} too large", topic),
            },
            EventPayload::Error(e) => warn!("MQTT: client error: {:?}", e),
            _ => {}
        })
        .map_err(|_| MqttError::Client("client init failed"))?;

        info!("MQTT: client started for {}", url);
        self.client = Some(client);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.client.take().is_some() {
            info!("MQTT: client stopped");
        }
        self.connected.store(false, Ordering::Release);
        INBOX.clear();
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.connected.load(Ordering::Acquire)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.client()?
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| MqttError::Client("subscribe failed"))
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), MqttError> {
        self.client()?
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes())
            .map(|_| ())
            .map_err(|_| MqttError::Client("publish failed"))
    }

    fn poll_message(&mut self) -> Option<MqttMessage> {
        INBOX.try_receive().ok()
    }
}
