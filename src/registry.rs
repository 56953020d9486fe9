//! Parameter registry: the single table mapping every configurable
//! property to its wire id, its byte span inside [`Config`], and its
//! MQTT topics.
//!
//! ```text
//!                    ┌───────────────────────────┐
//!   wire id ───────▶ │                           │ ──▶ &Descriptor
//!   property id ───▶ │   ParameterRegistry       │ ──▶ &[Descriptor] (1 or 2)
//!   inbound topic ─▶ │   (immutable after build) │ ──▶ &Descriptor
//!                    └───────────────────────────┘
//! ```
//!
//! Spans are computed with `offset_of!` against the packed record, so
//! dispatchers read and write fields through [`ParameterDescriptor::bytes`]
//! and [`ParameterDescriptor::bytes_mut`] without any per-field code.

use std::collections::BTreeMap;
use std::ops::Range;

use log::info;

use crate::config::Config;
use crate::error::RegistryError;

// ═══════════════════════════════════════════════════════════════
//  Identities
// ═══════════════════════════════════════════════════════════════

/// Logical configuration property, independent of any transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PropertyId {
    Power = 0,
    Brightness = 1,
    Color = 2,
    Calibration = 3,
    NightModeEnabled = 4,
    NightModeStart = 5,
    NightModeEnd = 6,
    NightModeInterval = 7,
    NightModeBrightness = 8,
    ColorTemperature = 9,

    MdnsName = 10,
    WifiMode = 11,
    WifiSsid = 12,
    WifiPassword = 13,
    WifiConnectionCheckInterval = 14,
    WifiMaxConnectionAttemptInterval = 15,
    LedType = 16,
    LedRPin = 17,
    LedGPin = 18,
    LedBPin = 19,
    PowerChangeTimeout = 20,
    WifiConnectFlashTimeout = 21,
    TimeZone = 22,
    WebAuthEnabled = 23,
    WebAuthUser = 24,
    WebAuthPassword = 25,
    MqttEnabled = 26,
    MqttHost = 27,
    MqttPort = 28,
    MqttUser = 29,
    MqttPassword = 30,
    MqttConvertBrightness = 31,
    LedMinBrightness = 32,
    LedMinTemperature = 33,
    LedMaxTemperature = 34,
}

impl PropertyId {
    /// Properties that feed the night-mode schedule.
    pub fn is_night_mode(self) -> bool {
        matches!(
            self,
            Self::NightModeEnabled
                | Self::NightModeStart
                | Self::NightModeEnd
                | Self::NightModeInterval
                | Self::NightModeBrightness
        )
    }
}

/// Binary protocol packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PacketType {
    PowerOn = 0x01,
    PowerOff = 0x02,
    Brightness = 0x03,

    Color = 0x10,
    Calibration = 0x11,
    Temperature = 0x12,

    NightModeEnabled = 0x20,
    NightModeStart = 0x21,
    NightModeEnd = 0x22,
    NightModeInterval = 0x23,
    NightModeBrightness = 0x24,

    SysConfigMdnsName = 0x60,
    SysConfigWifiMode = 0x61,
    SysConfigWifiSsid = 0x62,
    SysConfigWifiPassword = 0x63,
    SysConfigWifiConnectionCheckInterval = 0x64,
    SysConfigWifiMaxConnectionAttemptInterval = 0x65,
    SysConfigLedType = 0x66,
    SysConfigLedRPin = 0x67,
    SysConfigLedGPin = 0x68,
    SysConfigLedBPin = 0x69,
    SysConfigPowerChangeTimeout = 0x6A,
    SysConfigWifiConnectFlashTimeout = 0x6B,
    SysConfigTimeZone = 0x6C,
    SysConfigWebAuthEnabled = 0x6D,
    SysConfigWebAuthUser = 0x6E,
    SysConfigWebAuthPassword = 0x6F,
    SysConfigMqttEnabled = 0x70,
    SysConfigMqttHost = 0x71,
    SysConfigMqttPort = 0x72,
    SysConfigMqttUser = 0x73,
    SysConfigMqttPassword = 0x74,
    SysConfigMqttConvertBrightness = 0x75,
    SysConfigLedMinBrightness = 0x76,
    SysConfigLedMinTemperature = 0x77,
    SysConfigLedMaxTemperature = 0x78,

    GetConfig = 0xA0,
    Restart = 0xB0,

    ResponseString = 0xF0,
    ResponseBinary = 0xF1,
}

impl PacketType {
    pub fn from_u8(raw: u8) -> Option<Self> {
        use PacketType::*;
        Some(match raw {
            0x01 => PowerOn,
            0x02 => PowerOff,
            0x03 => Brightness,
            0x10 => Color,
            0x11 => Calibration,
            0x12 => Temperature,
            0x20 => NightModeEnabled,
            0x21 => NightModeStart,
            0x22 => NightModeEnd,
            0x23 => NightModeInterval,
            0x24 => NightModeBrightness,
            0x60 => SysConfigMdnsName,
            0x61 => SysConfigWifiMode,
            0x62 => SysConfigWifiSsid,
            0x63 => SysConfigWifiPassword,
            0x64 => SysConfigWifiConnectionCheckInterval,
            0x65 => SysConfigWifiMaxConnectionAttemptInterval,
            0x66 => SysConfigLedType,
            0x67 => SysConfigLedRPin,
            0x68 => SysConfigLedGPin,
            0x69 => SysConfigLedBPin,
            0x6A => SysConfigPowerChangeTimeout,
            0x6B => SysConfigWifiConnectFlashTimeout,
            0x6C => SysConfigTimeZone,
            0x6D => SysConfigWebAuthEnabled,
            0x6E => SysConfigWebAuthUser,
            0x6F => SysConfigWebAuthPassword,
            0x70 => SysConfigMqttEnabled,
            0x71 => SysConfigMqttHost,
            0x72 => SysConfigMqttPort,
            0x73 => SysConfigMqttUser,
            0x74 => SysConfigMqttPassword,
            0x75 => SysConfigMqttConvertBrightness,
            0x76 => SysConfigLedMinBrightness,
            0x77 => SysConfigLedMinTemperature,
            0x78 => SysConfigLedMaxTemperature,
            0xA0 => GetConfig,
            0xB0 => Restart,
            0xF0 => ResponseString,
            0xF1 => ResponseBinary,
            _ => return None,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Descriptors
// ═══════════════════════════════════════════════════════════════

/// How inbound payloads are written into a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Fixed-width little-endian value; payload size must match exactly.
    Scalar,
    /// NUL-terminated string with a fixed capacity.
    Text,
}

/// One row of the parameter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub property: PropertyId,
    pub wire_id: PacketType,
    pub offset: usize,
    pub size: usize,
    pub kind: ValueKind,
    /// Topic suffix accepted from the broker (`<prefix>/<topic_in>`).
    pub topic_in: Option<&'static str>,
    /// Topic suffix published on change (`<prefix>/<topic_out>`).
    pub topic_out: Option<&'static str>,
}

impl ParameterDescriptor {
    fn span(&self) -> Range<usize> {
        self.offset..self.offset + self.size
    }

    /// The field's bytes inside `config`.  Empty if the span is invalid,
    /// which [`ParameterRegistry::build`] rules out for registered rows.
    pub fn bytes<'a>(&self, config: &'a Config) -> &'a [u8] {
        config.as_bytes().get(self.span()).unwrap_or_default()
    }

    pub fn bytes_mut<'a>(&self, config: &'a mut Config) -> &'a mut [u8] {
        config
            .as_bytes_mut()
            .get_mut(self.span())
            .unwrap_or_default()
    }

    /// Read a scalar field as an unsigned little-endian integer.
    pub fn read_uint(&self, config: &Config) -> u64 {
        let mut raw = [0u8; 8];
        let bytes = self.bytes(config);
        let len = bytes.len().min(8);
        raw[..len].copy_from_slice(&bytes[..len]);
        u64::from_le_bytes(raw)
    }

    /// Write the low `size` bytes of `value` into a scalar field.
    pub fn write_uint(&self, config: &mut Config, value: u64) {
        let raw = value.to_le_bytes();
        let dst = self.bytes_mut(config);
        let len = dst.len().min(8);
        dst[..len].copy_from_slice(&raw[..len]);
    }
}

fn size_of_field<T>(_read: fn(Config) -> T) -> usize {
    core::mem::size_of::<T>()
}

/// Span of a (possibly nested) `Config` field.
macro_rules! field {
    ($($path:ident).+) => {
        (
            core::mem::offset_of!(Config, $($path).+),
            size_of_field(|c: Config| c $(.$path)+),
        )
    };
}

fn row(
    wire_id: PacketType,
    property: PropertyId,
    (offset, size): (usize, usize),
    kind: ValueKind,
    topics: Option<(&'static str, &'static str)>,
) -> ParameterDescriptor {
    ParameterDescriptor {
        property,
        wire_id,
        offset,
        size,
        kind,
        topic_in: topics.map(|t| t.0),
        topic_out: topics.map(|t| t.1),
    }
}

/// The firmware's parameter table.
pub fn descriptor_table() -> Vec<ParameterDescriptor> {
    use PacketType as W;
    use PropertyId as P;
    use ValueKind::{Scalar, Text};

    vec![
        row(W::PowerOn, P::Power, field!(power), Scalar, Some(("power/set", "power"))),
        row(W::PowerOff, P::Power, field!(power), Scalar, None),
        row(W::Brightness, P::Brightness, field!(brightness), Scalar, Some(("brightness/set", "brightness"))),
        row(W::Color, P::Color, field!(color), Scalar, Some(("color/set", "color"))),
        row(W::Calibration, P::Calibration, field!(calibration), Scalar, None),
        row(W::Temperature, P::ColorTemperature, field!(color_temperature), Scalar, Some(("temperature/set", "temperature"))),
        row(W::NightModeEnabled, P::NightModeEnabled, field!(night_mode.enabled), Scalar, Some(("night_mode/set", "night_mode"))),
        row(W::NightModeStart, P::NightModeStart, field!(night_mode.start_time), Scalar, None),
        row(W::NightModeEnd, P::NightModeEnd, field!(night_mode.end_time), Scalar, None),
        row(W::NightModeInterval, P::NightModeInterval, field!(night_mode.switch_interval), Scalar, None),
        row(W::NightModeBrightness, P::NightModeBrightness, field!(night_mode.brightness), Scalar, Some(("night_mode/brightness/set", "night_mode/brightness"))),
        row(W::SysConfigMdnsName, P::MdnsName, field!(sys_config.mdns_name), Text, None),
        row(W::SysConfigWifiMode, P::WifiMode, field!(sys_config.wifi_mode), Scalar, None),
        row(W::SysConfigWifiSsid, P::WifiSsid, field!(sys_config.wifi_ssid), Text, None),
        row(W::SysConfigWifiPassword, P::WifiPassword, field!(sys_config.wifi_password), Text, None),
        row(W::SysConfigWifiConnectionCheckInterval, P::WifiConnectionCheckInterval, field!(sys_config.wifi_connection_check_interval), Scalar, None),
        row(W::SysConfigWifiMaxConnectionAttemptInterval, P::WifiMaxConnectionAttemptInterval, field!(sys_config.wifi_max_connection_attempt_interval), Scalar, None),
        row(W::SysConfigLedType, P::LedType, field!(sys_config.led_type), Scalar, None),
        row(W::SysConfigLedRPin, P::LedRPin, field!(sys_config.led_r_pin), Scalar, None),
        row(W::SysConfigLedGPin, P::LedGPin, field!(sys_config.led_g_pin), Scalar, None),
        row(W::SysConfigLedBPin, P::LedBPin, field!(sys_config.led_b_pin), Scalar, None),
        row(W::SysConfigPowerChangeTimeout, P::PowerChangeTimeout, field!(sys_config.power_change_timeout), Scalar, None),
        row(W::SysConfigWifiConnectFlashTimeout, P::WifiConnectFlashTimeout, field!(sys_config.wifi_connect_flash_timeout), Scalar, None),
        row(W::SysConfigTimeZone, P::TimeZone, field!(sys_config.time_zone), Scalar, None),
        row(W::SysConfigWebAuthEnabled, P::WebAuthEnabled, field!(sys_config.web_auth), Scalar, None),
        row(W::SysConfigWebAuthUser, P::WebAuthUser, field!(sys_config.web_auth_user), Text, None),
        row(W::SysConfigWebAuthPassword, P::WebAuthPassword, field!(sys_config.web_auth_password), Text, None),
        row(W::SysConfigMqttEnabled, P::MqttEnabled, field!(sys_config.mqtt), Scalar, None),
        row(W::SysConfigMqttHost, P::MqttHost, field!(sys_config.mqtt_host), Text, None),
        row(W::SysConfigMqttPort, P::MqttPort, field!(sys_config.mqtt_port), Scalar, None),
        row(W::SysConfigMqttUser, P::MqttUser, field!(sys_config.mqtt_user), Text, None),
        row(W::SysConfigMqttPassword, P::MqttPassword, field!(sys_config.mqtt_password), Text, None),
        row(W::SysConfigMqttConvertBrightness, P::MqttConvertBrightness, field!(sys_config.mqtt_convert_brightness), Scalar, None),
        row(W::SysConfigLedMinBrightness, P::LedMinBrightness, field!(sys_config.led_min_brightness), Scalar, None),
        row(W::SysConfigLedMinTemperature, P::LedMinTemperature, field!(sys_config.led_min_temperature), Scalar, None),
        row(W::SysConfigLedMaxTemperature, P::LedMaxTemperature, field!(sys_config.led_max_temperature), Scalar, None),
    ]
}

// ═══════════════════════════════════════════════════════════════
//  Registry
// ═══════════════════════════════════════════════════════════════

/// Immutable lookup structure over the parameter table.
pub struct ParameterRegistry {
    /// Rows sorted by property so each property's rows are contiguous.
    descriptors: Vec<ParameterDescriptor>,
    by_wire: [Option<usize>; 256],
    by_property: BTreeMap<PropertyId, Range<usize>>,
    by_topic: BTreeMap<&'static str, usize>,
}

impl ParameterRegistry {
    /// Build the registry from the firmware's own table.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        Self::build(descriptor_table())
    }

    /// Validate `rows` and build the three indices.
    ///
    /// Rejects duplicate wire ids and inbound topics, spans outside
    /// [`Config`], and properties with more than two rows or with a
    /// pair whose spans differ.
    pub fn build(mut rows: Vec<ParameterDescriptor>) -> Result<Self, RegistryError> {
        rows.sort_by_key(|d| d.property);

        let mut by_wire = [None; 256];
        let mut by_property: BTreeMap<PropertyId, Range<usize>> = BTreeMap::new();
        let mut by_topic = BTreeMap::new();

        for (idx, d) in rows.iter().enumerate() {
            let end = d.offset.checked_add(d.size);
            if d.size == 0 || end.is_none_or(|end| end > Config::SIZE) {
                return Err(RegistryError::OutOfBounds {
                    wire_id: d.wire_id as u8,
                    offset: d.offset,
                    size: d.size,
                });
            }

            let slot = &mut by_wire[d.wire_id as usize];
            if slot.is_some() {
                return Err(RegistryError::DuplicateWireId(d.wire_id as u8));
            }
            *slot = Some(idx);

            if let Some(topic) = d.topic_in {
                if by_topic.insert(topic, idx).is_some() {
                    return Err(RegistryError::DuplicateTopic(topic));
                }
            }

            by_property
                .entry(d.property)
                .and_modify(|r| r.end = idx + 1)
                .or_insert(idx..idx + 1);
        }

        for (property, range) in &by_property {
            let group = &rows[range.clone()];
            let consistent = match group {
                [_] => true,
                [a, b] => a.offset == b.offset && a.size == b.size,
                _ => false,
            };
            if !consistent {
                return Err(RegistryError::InvalidTriggerPair(*property));
            }
        }

        info!(
            "Registry: {} descriptors, {} properties, {} topics",
            rows.len(),
            by_property.len(),
            by_topic.len()
        );

        Ok(Self {
            descriptors: rows,
            by_wire,
            by_property,
            by_topic,
        })
    }

    pub fn lookup_by_wire_id(&self, id: u8) -> Option<&ParameterDescriptor> {
        self.by_wire[id as usize].map(|idx| &self.descriptors[idx])
    }

    /// All rows of `property`: one, or two for a trigger pair.
    pub fn lookup_by_property(&self, property: PropertyId) -> &[ParameterDescriptor] {
        match self.by_property.get(&property) {
            Some(range) => &self.descriptors[range.clone()],
            None => &[],
        }
    }

    pub fn lookup_by_topic(&self, topic: &str) -> Option<&ParameterDescriptor> {
        self.by_topic.get(topic).map(|&idx| &self.descriptors[idx])
    }

    /// Every inbound topic suffix, in sorted order.
    pub fn inbound_topics(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_topic.keys().copied()
    }

    pub fn descriptors(&self) -> &[ParameterDescriptor] {
        &self.descriptors
    }
}
