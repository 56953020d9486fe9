//! MQTT-style topic server.
//!
//! Connection lifecycle:
//!
//! ```text
//!  UNINITIALIZED ──connect──▶ CONNECTING ──connected──▶ CONNECTED
//!        ▲                        │                        │
//!   (mqtt disabled)         [timeout 15 s]           [link lost]
//!                                 ▼                        │
//!                           DISCONNECTED ◀─────────────────┘
//!                                 │
//!                          [after 5 s] ──connect──▶ CONNECTING
//! ```
//!
//! Inbound: `<prefix>/<topic_in>` with a decimal payload is written into
//! the field the registry maps the topic to.  Outbound: every published
//! change with an outbound topic is stringified to `<prefix>/<topic_out>`.
//! Brightness is optionally expressed as 0–100 and colour temperature in
//! Kelvin between the configured LED bounds.

use core::cell::RefCell;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::app::service::LightService;
use crate::config::{Config, PWM_MAX_VALUE, TEMPERATURE_MAX_VALUE, str_field};
use crate::drivers::waveform::map16;
use crate::error::MqttError;
use crate::events::{Delivery, NotificationBus, Sender, SubscriptionId};
use crate::registry::{ParameterDescriptor, ParameterRegistry, PropertyId, ValueKind};

use super::transport::{MqttClientPort, MqttConnectOptions};

/// Human-readable brightness scale.
const BRIGHTNESS_PERCENT_MAX: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttState {
    Uninitialized,
    Connecting,
    Connected,
    Disconnected,
}

// ═══════════════════════════════════════════════════════════════
//  Value conversion
// ═══════════════════════════════════════════════════════════════

fn kelvin_bounds(config: &Config) -> (u32, u32) {
    let min = u32::from(config.sys_config.led_min_temperature);
    let max = u32::from(config.sys_config.led_max_temperature);
    (min, max.max(min))
}

/// Stringify the current value of `property` for its outbound topic.
pub fn outbound_payload(
    registry: &ParameterRegistry,
    config: &Config,
    property: PropertyId,
) -> Option<(&'static str, String)> {
    let rows = registry.lookup_by_property(property);
    let row = rows.iter().find(|r| r.topic_out.is_some())?;
    let topic = row.topic_out?;
    if row.kind != ValueKind::Scalar {
        return None;
    }

    let raw = row.read_uint(config);
    let value = match property {
        PropertyId::Power => u64::from(raw != 0),
        PropertyId::Brightness if config.sys_config.mqtt_convert_brightness != 0 => u64::from(map16(
            raw as u32,
            u32::from(PWM_MAX_VALUE),
            BRIGHTNESS_PERCENT_MAX,
        )),
        PropertyId::ColorTemperature => {
            let (min, max) = kelvin_bounds(config);
            u64::from(min + map16(raw as u32, u32::from(TEMPERATURE_MAX_VALUE), max - min))
        }
        _ => raw,
    };
    Some((topic, value.to_string()))
}

/// Convert an inbound decimal value to the raw field value.
pub fn inbound_value(
    descriptor: &ParameterDescriptor,
    config: &Config,
    value: u64,
) -> Result<u64, MqttError> {
    let converted = match descriptor.property {
        PropertyId::Power => u64::from(value != 0),
        PropertyId::Brightness if config.sys_config.mqtt_convert_brightness != 0 => {
            let percent = value.min(u64::from(BRIGHTNESS_PERCENT_MAX)) as u32;
            u64::from(map16(percent, BRIGHTNESS_PERCENT_MAX, u32::from(PWM_MAX_VALUE)))
        }
        PropertyId::ColorTemperature => {
            let (min, max) = kelvin_bounds(config);
            let kelvin = value.clamp(u64::from(min), u64::from(max)) as u32;
            u64::from(map16(kelvin - min, max - min, u32::from(TEMPERATURE_MAX_VALUE)))
        }
        _ => value,
    };

    let bits = descriptor.size * 8;
    if bits < 64 && converted >> bits != 0 {
        return Err(MqttError::InvalidPayload);
    }
    Ok(converted)
}

fn parse_decimal(payload: &[u8]) -> Result<u64, MqttError> {
    core::str::from_utf8(payload)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or(MqttError::InvalidPayload)
}

// ═══════════════════════════════════════════════════════════════
//  Server
// ═══════════════════════════════════════════════════════════════

pub struct MqttServer {
    state: MqttState,
    state_since_ms: u64,
    prefix: String,
    connection_timeout_ms: u64,
    reconnect_timeout_ms: u64,
    outbox: Rc<RefCell<Vec<(String, String)>>>,
    subscription: Option<SubscriptionId>,
}

impl MqttServer {
    pub fn new(prefix: &str, connection_timeout_ms: u64, reconnect_timeout_ms: u64) -> Self {
        Self {
            state: MqttState::Uninitialized,
            state_since_ms: 0,
            prefix: prefix.trim_end_matches('/').to_string(),
            connection_timeout_ms,
            reconnect_timeout_ms,
            outbox: Rc::default(),
            subscription: None,
        }
    }

    pub fn state(&self) -> MqttState {
        self.state
    }

    /// Start publishing changes seen on `bus`.
    pub fn attach(&mut self, bus: &NotificationBus) {
        if self.subscription.is_some() {
            return;
        }
        let outbox = Rc::clone(&self.outbox);
        let prefix = self.prefix.clone();
        let id = bus.subscribe_all(move |d: &Delivery<'_>| {
            if let Some((topic, payload)) =
                outbound_payload(d.registry, d.config, d.notification.property)
            {
                outbox.borrow_mut().push((format!("{prefix}/{topic}"), payload));
            }
        });
        self.subscription = Some(id);
    }

    /// Advance the connection state machine, ingest inbound messages and
    /// publish pending changes.
    pub fn tick(
        &mut self,
        now_ms: u64,
        service: &mut LightService,
        client: &mut impl MqttClientPort,
    ) {
        if !service.config().mqtt_enabled() {
            if self.state != MqttState::Uninitialized {
                info!("MQTT: disabled, closing connection");
                client.disconnect();
                self.set_state(MqttState::Uninitialized, now_ms);
            }
            self.outbox.borrow_mut().clear();
            return;
        }

        let elapsed = now_ms.saturating_sub(self.state_since_ms);
        match self.state {
            MqttState::Uninitialized => self.connect(now_ms, service.config(), client),
            MqttState::Disconnected if elapsed >= self.reconnect_timeout_ms => {
                self.connect(now_ms, service.config(), client)
            }
            MqttState::Disconnected => {}
            MqttState::Connecting => {
                if client.is_connected() {
                    self.on_connected(now_ms, service.registry(), client);
                } else if elapsed >= self.connection_timeout_ms {
                    warn!("MQTT: connection timed out after {} ms", elapsed);
                    client.disconnect();
                    self.set_state(MqttState::Disconnected, now_ms);
                }
            }
            MqttState::Connected => {
                if client.is_connected() {
                    while let Some(msg) = client.poll_message() {
                        if let Err(e) = self.handle_message(&msg.topic, &msg.payload, service) {
                            warn!("MQTT: ignoring '{}': {}", msg.topic, e);
                        }
                    }
                } else {
                    warn!("MQTT: connection lost");
                    self.set_state(MqttState::Disconnected, now_ms);
                }
            }
        }

        self.flush(client);
    }

    fn set_state(&mut self, state: MqttState, now_ms: u64) {
        debug!("MQTT: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.state_since_ms = now_ms;
    }

    fn connect(&mut self, now_ms: u64, config: &Config, client: &mut impl MqttClientPort) {
        let sys = &config.sys_config;
        let options = MqttConnectOptions {
            host: str_field(&sys.mqtt_host),
            port: sys.mqtt_port,
            user: str_field(&sys.mqtt_user),
            password: str_field(&sys.mqtt_password),
            client_id: str_field(&sys.mdns_name),
        };
        info!("MQTT: connecting to {}:{}", options.host, options.port);
        match client.connect(&options) {
            Ok(()) => self.set_state(MqttState::Connecting, now_ms),
            Err(e) => {
                warn!("MQTT: connect failed: {}", e);
                self.set_state(MqttState::Disconnected, now_ms);
            }
        }
    }

    fn on_connected(
        &mut self,
        now_ms: u64,
        registry: &ParameterRegistry,
        client: &mut impl MqttClientPort,
    ) {
        info!("MQTT: connected");
        self.set_state(MqttState::Connected, now_ms);
        for topic in registry.inbound_topics() {
            let full = format!("{}/{}", self.prefix, topic);
            if let Err(e) = client.subscribe(&full) {
                warn!("MQTT: subscribe to {} failed: {}", full, e);
            }
        }
    }

    /// Apply one inbound message.  Returns the property it changed.
    pub fn handle_message(
        &self,
        topic: &str,
        payload: &[u8],
        service: &mut LightService,
    ) -> Result<PropertyId, MqttError> {
        let suffix = topic
            .strip_prefix(self.prefix.as_str())
            .and_then(|t| t.strip_prefix('/'))
            .ok_or(MqttError::UnknownTopic)?;
        let descriptor = *service
            .registry()
            .lookup_by_topic(suffix)
            .ok_or(MqttError::UnknownTopic)?;
        if descriptor.kind != ValueKind::Scalar {
            return Err(MqttError::Unsupported);
        }

        let value = inbound_value(&descriptor, service.config(), parse_decimal(payload)?)?;
        debug!("MQTT: {} <- {}", suffix, value);

        if descriptor.property == PropertyId::Power {
            service.apply_power(value != 0, Sender::Mqtt);
        } else {
            descriptor.write_uint(service.config_mut(), value);
            service.after_property_update(descriptor.property, Sender::Mqtt);
        }
        Ok(descriptor.property)
    }

    /// Publish queued changes, or drop them when not connected.
    pub fn flush(&mut self, client: &mut impl MqttClientPort) {
        let pending = core::mem::take(&mut *self.outbox.borrow_mut());
        if pending.is_empty() {
            return;
        }
        if self.state != MqttState::Connected {
            debug!("MQTT: not connected, skipping {} publish(es)", pending.len());
            return;
        }
        for (topic, payload) in pending {
            if let Err(e) = client.publish(&topic, &payload) {
                warn!("MQTT: publish to {} failed: {}", topic, e);
            }
        }
    }
}
