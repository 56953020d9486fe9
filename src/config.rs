//! Light configuration record and firmware tunables.
//!
//! [`Config`] is the single persisted record.  It is `#[repr(C, packed)]`
//! and [`Pod`], so its byte image is stable across builds and can be
//! viewed, diffed, and written to flash without a serialisation step.
//!
//! ```text
//! ┌──────────────────────────── Config (241 B) ───────────────────────────┐
//! │ power │ brightness │ color │ calibration │ color_temperature          │
//! ├───────┴────────────┴───────┴─────────────┴────────────────────────────┤
//! │ NightModeConfig   enabled · brightness · start · end · switch_interval│
//! ├───────────────────────────────────────────────────────────────────────┤
//! │ SysConfig         mdns · wifi · led · button · timing · web · mqtt    │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`AppSettings`] holds runtime tunables that are *not* part of the
//! record (debounce windows, tick periods, MQTT topic prefix).  They are
//! serde-derived and loaded from a JSON blob at boot.

use bytemuck::{Pod, Zeroable};
use log::warn;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════
//  Firmware constants
// ═══════════════════════════════════════════════════════════════

/// PWM duty resolution in bits.
pub const PWM_RESOLUTION_BITS: u32 = 14;
/// Largest duty value the output stage accepts.
pub const PWM_MAX_VALUE: u16 = (1 << PWM_RESOLUTION_BITS) - 1;
/// Full scale of the warm/cold mix stored in `color_temperature`.
pub const TEMPERATURE_MAX_VALUE: u16 = PWM_MAX_VALUE;

/// Magic prefix of the stored record.
pub const STORAGE_HEADER: u32 = 0xd0c1_f2c3;
/// Bump whenever the [`Config`] layout changes.
pub const STORAGE_CONFIG_VERSION: u8 = 1;

pub const MDNS_NAME_SIZE: usize = 16;
pub const WIFI_SSID_SIZE: usize = 32;
pub const WIFI_PASSWORD_SIZE: usize = 32;
pub const AUTH_CREDENTIAL_SIZE: usize = 16;
pub const MQTT_HOST_SIZE: usize = 32;
pub const MQTT_CREDENTIAL_SIZE: usize = 16;

// ═══════════════════════════════════════════════════════════════
//  Enumerated settings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WifiMode {
    AccessPoint = 0,
    Station = 1,
}

impl WifiMode {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::AccessPoint),
            1 => Some(Self::Station),
            _ => None,
        }
    }
}

/// LED channel arrangement driven by the output stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LedType {
    Single = 0,
    Rgb = 1,
    ColdWarm = 2,
}

impl LedType {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Single),
            1 => Some(Self::Rgb),
            2 => Some(Self::ColdWarm),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Persisted record
// ═══════════════════════════════════════════════════════════════

/// Scheduled low-brightness window.  Times are seconds since local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct NightModeConfig {
    pub enabled: u8,
    pub brightness: u16,
    pub start_time: u32,
    pub end_time: u32,
    /// Fade duration on each side of the window, in seconds.
    pub switch_interval: u16,
}

impl Default for NightModeConfig {
    fn default() -> Self {
        Self {
            enabled: 0,
            brightness: 10,
            start_time: 0,
            end_time: 10 * 3600,
            switch_interval: 15 * 60,
        }
    }
}

/// Network, LED hardware, and integration settings.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct SysConfig {
    pub mdns_name: [u8; MDNS_NAME_SIZE],
    pub wifi_mode: u8,
    pub wifi_ssid: [u8; WIFI_SSID_SIZE],
    pub wifi_password: [u8; WIFI_PASSWORD_SIZE],
    pub wifi_connection_check_interval: u32,
    pub wifi_max_connection_attempt_interval: u32,

    pub led_type: u8,
    pub led_r_pin: u8,
    pub led_g_pin: u8,
    pub led_b_pin: u8,
    pub led_min_brightness: u16,
    /// Kelvin at the warm end of the temperature scale.
    pub led_min_temperature: u16,
    /// Kelvin at the cold end of the temperature scale.
    pub led_max_temperature: u16,

    pub button_enabled: u8,
    pub button_pin: u8,
    pub button_high_state: u8,

    /// Duration of the power on/off ramp, in milliseconds.
    pub power_change_timeout: u32,
    /// Pulse period while waiting for the network, in milliseconds.
    pub wifi_connect_flash_timeout: u32,
    /// Offset from UTC, in hours.
    pub time_zone: f32,

    pub web_auth: u8,
    pub web_auth_user: [u8; AUTH_CREDENTIAL_SIZE],
    pub web_auth_password: [u8; AUTH_CREDENTIAL_SIZE],

    pub mqtt: u8,
    pub mqtt_host: [u8; MQTT_HOST_SIZE],
    pub mqtt_port: u16,
    pub mqtt_user: [u8; MQTT_CREDENTIAL_SIZE],
    pub mqtt_password: [u8; MQTT_CREDENTIAL_SIZE],
    pub mqtt_convert_brightness: u8,
}

impl Default for SysConfig {
    fn default() -> Self {
        Self {
            mdns_name: fixed_str("esp_led"),
            wifi_mode: WifiMode::Station as u8,
            wifi_ssid: [0; WIFI_SSID_SIZE],
            wifi_password: [0; WIFI_PASSWORD_SIZE],
            wifi_connection_check_interval: 5000,
            wifi_max_connection_attempt_interval: 0,

            led_type: LedType::Rgb as u8,
            led_r_pin: 0,
            led_g_pin: 1,
            led_b_pin: 2,
            led_min_brightness: 0,
            led_min_temperature: 2700,
            led_max_temperature: 6500,

            button_enabled: 0,
            button_pin: 0,
            button_high_state: 0,

            power_change_timeout: 1000,
            wifi_connect_flash_timeout: 3000,
            time_zone: 5.0,

            web_auth: 0,
            web_auth_user: fixed_str("admin"),
            web_auth_password: fixed_str("admin"),

            mqtt: 0,
            mqtt_host: fixed_str("example.com"),
            mqtt_port: 1234,
            mqtt_user: [0; MQTT_CREDENTIAL_SIZE],
            mqtt_password: [0; MQTT_CREDENTIAL_SIZE],
            mqtt_convert_brightness: 1,
        }
    }
}

/// The persisted light configuration.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct Config {
    pub power: u8,
    pub brightness: u16,
    pub color: u32,
    pub calibration: u32,
    pub color_temperature: u16,
    pub night_mode: NightModeConfig,
    pub sys_config: SysConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            power: 1,
            brightness: 2048,
            color: u32::MAX,
            calibration: u32::MAX,
            color_temperature: 0,
            night_mode: NightModeConfig::default(),
            sys_config: SysConfig::default(),
        }
    }
}

impl Config {
    /// Size of the byte image.
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Opaque byte view of the record.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::bytes_of_mut(self)
    }

    /// Rebuild a record from its byte image.  `None` on a size mismatch.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn is_power_on(&self) -> bool {
        self.power != 0
    }

    pub fn night_mode_enabled(&self) -> bool {
        self.night_mode.enabled != 0
    }

    pub fn mqtt_enabled(&self) -> bool {
        self.sys_config.mqtt != 0
    }
}

// ── Fixed-capacity string helpers ─────────────────────────────

/// Build a NUL-padded fixed-capacity string field.  Input longer than
/// `N` is truncated.
pub fn fixed_str<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let len = s.len().min(N);
    out[..len].copy_from_slice(&s.as_bytes()[..len]);
    out
}

/// Read a fixed-capacity string field up to its first NUL.
/// Invalid UTF-8 yields the longest valid prefix.
pub fn str_field(bytes: &[u8]) -> &str {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    match core::str::from_utf8(&bytes[..end]) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Runtime settings
// ═══════════════════════════════════════════════════════════════

/// Storage key holding the JSON-encoded [`AppSettings`].
pub const SETTINGS_KEY: &str = "settings";

/// Topic prefix used until settings say otherwise.
pub const DEFAULT_MQTT_PREFIX: &str = "esp_led";

/// Runtime tunables, loaded once at boot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Quiet period before a changed config is written to flash.
    pub storage_save_interval_ms: u64,
    /// Delay between a RESTART request and the actual reset.
    pub restart_delay_ms: u64,
    /// Main loop period.
    pub tick_interval_ms: u64,
    /// Fade factor refresh period while inside a night ramp.
    pub night_fade_update_ms: u64,
    /// Fade factor refresh period outside the ramps.
    pub night_steady_update_ms: u64,
    /// Give up on a broker connection attempt after this long.
    pub mqtt_connection_timeout_ms: u64,
    /// Wait this long after a disconnect before reconnecting.
    pub mqtt_reconnect_timeout_ms: u64,
    /// Prefix of every MQTT topic, without a trailing slash.
    pub mqtt_topic_prefix: heapless::String<32>,
    /// TCP port of the binary protocol server.
    pub tcp_port: u16,
}

impl Default for AppSettings {
    fn default() -> Self {
        let mut prefix = heapless::String::new();
        if prefix.push_str(DEFAULT_MQTT_PREFIX).is_err() {
            warn!("Settings: default MQTT prefix does not fit, using an empty prefix");
        }
        Self {
            storage_save_interval_ms: 60_000,
            restart_delay_ms: 500,
            tick_interval_ms: 20,
            night_fade_update_ms: 30,
            night_steady_update_ms: 1000,
            mqtt_connection_timeout_ms: 15_000,
            mqtt_reconnect_timeout_ms: 5_000,
            mqtt_topic_prefix: prefix,
            tcp_port: 8081,
        }
    }
}

impl AppSettings {
    /// Parse settings from JSON, keeping defaults for absent fields.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
