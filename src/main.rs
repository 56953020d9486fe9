//! Lumos firmware: main entry point.
//!
//! Hexagonal architecture driven by one cooperative main loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  PwmOutput         LogEventSink   NvsAdapter    SystemClock    │
//! │  (BrightnessSink)  (EventSink)    (Storage)     (Clock+Time)   │
//! │  TcpPacketServer   EspMqttAdapter                              │
//! │  (ClientSink)      (MqttClientPort)                            │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              LightService (pure logic)                 │    │
//! │  │  Registry · ConfigStore · NightMode · Animation FSM    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  WsServer (binary protocol) · MqttServer (topics)              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

use lumos::adapters::log_sink::LogEventSink;
use lumos::adapters::mqtt_client::EspMqttAdapter;
use lumos::adapters::nvs::NvsAdapter;
use lumos::adapters::socket::TcpPacketServer;
use lumos::adapters::time::SystemClock;
use lumos::app::commands::AppCommand;
use lumos::app::ports::{Clock, StoragePort, TimeSource};
use lumos::app::service::{LightService, TickOutcome};
use lumos::config::{AppSettings, SETTINGS_KEY, str_field};
use lumos::drivers::hw_init;
use lumos::error::Error;
use lumos::drivers::led_output::PwmOutput;
use lumos::rpc::mqtt::MqttServer;
use lumos::rpc::ws::WsServer;
use lumos::storage::{LoadOutcome, STORAGE_NAMESPACE};

/// Largest settings JSON document accepted from storage.
const SETTINGS_MAX_SIZE: usize = 1024;

fn load_settings(nvs: &NvsAdapter) -> AppSettings {
    let mut buf = [0u8; SETTINGS_MAX_SIZE];
    match nvs.read(STORAGE_NAMESPACE, SETTINGS_KEY, &mut buf) {
        Ok(len) => match AppSettings::from_json(&buf[..len]) {
            Ok(settings) => {
                info!("Settings: loaded from storage");
                settings
            }
            Err(e) => {
                warn!("Settings: invalid JSON ({}), using defaults", e);
                AppSettings::default()
            }
        },
        Err(_) => AppSettings::default(),
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Lumos v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Storage, settings, config ──────────────────────────
    let mut nvs = NvsAdapter::new().map_err(Error::from)?;
    let settings = load_settings(&nvs);
    let tick = Duration::from_millis(settings.tick_interval_ms);

    let mut app = LightService::new(settings.clone())?;
    if let LoadOutcome::Defaults(reason) = app.load(&nvs) {
        info!("Config: running with defaults ({:?})", reason);
    }

    // ── 3. Output stage ───────────────────────────────────────
    let led_pin = i32::from(app.config().sys_config.led_r_pin);
    let mut output = PwmOutput::new(hw_init::init_led_pwm(led_pin).map_err(Error::from)?);

    // ── 4. Network ────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let mut wifi = EspWifi::new(peripherals.modem, sysloop, None)?;

    let ssid = str_field(&app.config().sys_config.wifi_ssid).to_owned();
    let password = str_field(&app.config().sys_config.wifi_password).to_owned();
    let mut network_ready = false;
    if ssid.is_empty() {
        warn!("WiFi: no credentials configured, running offline");
        app.handle_command(AppCommand::NetworkReady);
        network_ready = true;
    } else {
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: ssid.as_str().try_into().map_err(|_| Error::Init("SSID too long"))?,
            password: password
                .as_str()
                .try_into()
                .map_err(|_| Error::Init("password too long"))?,
            auth_method: if password.is_empty() { AuthMethod::None } else { AuthMethod::WPA2Personal },
            ..Default::default()
        }))?;
        wifi.start()?;
        wifi.connect()?;
        info!("WiFi: connecting to '{}'", ssid);
    }
    let _sntp = EspSntp::new_default()?;

    let clock = SystemClock::new();
    let mut log_sink = LogEventSink::new();

    let mut socket = TcpPacketServer::bind(settings.tcp_port)?;
    let mut ws = WsServer::new();
    ws.attach(app.bus());

    let mut mqtt_client = EspMqttAdapter::new();
    let mut mqtt = MqttServer::new(
        &settings.mqtt_topic_prefix,
        settings.mqtt_connection_timeout_ms,
        settings.mqtt_reconnect_timeout_ms,
    );
    mqtt.attach(app.bus());

    app.start(clock.now_ms(), &mut log_sink);
    info!("System ready. Entering main loop.");

    // ── 5. Main loop ──────────────────────────────────────────
    loop {
        let now = clock.now_ms();

        if !network_ready && wifi.is_up()? {
            info!("WiFi: connected");
            app.handle_command(AppCommand::NetworkReady);
            network_ready = true;
        }

        socket.poll(&ws);
        ws.handle_incoming(&mut app, &mut socket);
        if network_ready {
            mqtt.tick(now, &mut app, &mut mqtt_client);
        }

        let outcome = app.tick(now, clock.utc_epoch_secs(), &mut nvs, &mut output, &mut log_sink);
        ws.flush(&mut socket);

        if outcome == TickOutcome::Restart {
            // SAFETY: plain SoC reset; pending state was committed by tick().
            unsafe { esp_idf_svc::sys::esp_restart() };
        }

        std::thread::sleep(tick);
    }
}
