//! MQTT server against a mock broker: connection lifecycle, inbound
//! writes, outbound publishes and cross-transport fan-out.

use crate::mocks::{MockBroker, RecordingClients, RecordingSink, packet};

use lumos::app::service::LightService;
use lumos::config::AppSettings;
use lumos::registry::PacketType;
use lumos::rpc::codec::parse;
use lumos::rpc::mqtt::{MqttServer, MqttState};
use lumos::rpc::ws::WsServer;

fn setup() -> (LightService, MqttServer, WsServer) {
    let settings = AppSettings::default();
    let mut app = LightService::new(settings.clone()).unwrap();
    app.config_mut().sys_config.mqtt = 1;
    app.start(0, &mut RecordingSink::new());

    let mut mqtt = MqttServer::new(
        &settings.mqtt_topic_prefix,
        settings.mqtt_connection_timeout_ms,
        settings.mqtt_reconnect_timeout_ms,
    );
    mqtt.attach(app.bus());
    let mut ws = WsServer::new();
    ws.attach(app.bus());
    (app, mqtt, ws)
}

fn connect(app: &mut LightService, mqtt: &mut MqttServer, broker: &mut MockBroker) {
    mqtt.tick(0, app, broker);
    broker.connected = true;
    mqtt.tick(20, app, broker);
    assert_eq!(mqtt.state(), MqttState::Connected);
}

#[test]
fn connects_with_configured_broker_and_subscribes() {
    let (mut app, mut mqtt, _ws) = setup();
    let mut broker = MockBroker::new();
    connect(&mut app, &mut mqtt, &mut broker);

    assert_eq!(
        broker.connects,
        vec![("example.com".to_string(), 1234, "esp_led".to_string())]
    );
    for topic in [
        "esp_led/power/set",
        "esp_led/brightness/set",
        "esp_led/color/set",
        "esp_led/temperature/set",
        "esp_led/night_mode/set",
        "esp_led/night_mode/brightness/set",
    ] {
        assert!(broker.subscriptions.iter().any(|t| t == topic), "missing {topic}");
    }
}

#[test]
fn refused_connect_retries_after_delay() {
    let (mut app, mut mqtt, _ws) = setup();
    let mut broker = MockBroker::new();
    broker.accept_connect = false;

    mqtt.tick(0, &mut app, &mut broker);
    assert_eq!(mqtt.state(), MqttState::Disconnected);
    mqtt.tick(4_999, &mut app, &mut broker);
    assert_eq!(broker.connects.len(), 1);

    broker.accept_connect = true;
    mqtt.tick(5_000, &mut app, &mut broker);
    assert_eq!(broker.connects.len(), 2);
    assert_eq!(mqtt.state(), MqttState::Connecting);
}

#[test]
fn inbound_message_updates_config_and_reaches_binary_clients() {
    let (mut app, mut mqtt, mut ws) = setup();
    let mut broker = MockBroker::new();
    let mut clients = RecordingClients::new();
    connect(&mut app, &mut mqtt, &mut broker);

    broker.deliver("esp_led/night_mode/brightness/set", "300");
    mqtt.tick(40, &mut app, &mut broker);
    assert_eq!({ app.config().night_mode.brightness }, 300);
    assert!(app.store().is_pending_commit());

    // Echoed on the outbound topic
    assert!(
        broker
            .published
            .contains(&("esp_led/night_mode/brightness".to_string(), "300".to_string()))
    );

    // And fanned out to every binary client
    ws.flush(&mut clients);
    let (exclude, frame) = &clients.broadcast[0];
    assert_eq!(*exclude, None);
    let note = parse(frame).unwrap();
    assert_eq!(note.packet_type(), Some(PacketType::NightModeBrightness));
    assert_eq!(note.payload, &300u16.to_le_bytes());
}

#[test]
fn binary_change_is_published_to_broker() {
    let (mut app, mut mqtt, mut ws) = setup();
    let mut broker = MockBroker::new();
    let mut clients = RecordingClients::new();
    connect(&mut app, &mut mqtt, &mut broker);

    ws.on_data(1, &packet(1, PacketType::PowerOff as u8, &[]));
    ws.handle_incoming(&mut app, &mut clients);
    mqtt.tick(60, &mut app, &mut broker);

    assert_eq!(
        broker.published,
        vec![("esp_led/power".to_string(), "0".to_string())]
    );
}

#[test]
fn garbage_is_ignored() {
    let (mut app, mut mqtt, _ws) = setup();
    let mut broker = MockBroker::new();
    connect(&mut app, &mut mqtt, &mut broker);
    let before = *app.config();

    broker.deliver("esp_led/brightness/set", "bright");
    broker.deliver("esp_led/unknown/set", "1");
    broker.deliver("elsewhere/brightness/set", "1");
    mqtt.tick(40, &mut app, &mut broker);

    assert_eq!(app.config().as_bytes(), before.as_bytes());
    assert!(broker.published.is_empty());
    assert_eq!(mqtt.state(), MqttState::Connected);
}

#[test]
fn disabling_mqtt_drops_the_connection() {
    let (mut app, mut mqtt, _ws) = setup();
    let mut broker = MockBroker::new();
    connect(&mut app, &mut mqtt, &mut broker);

    app.config_mut().sys_config.mqtt = 0;
    mqtt.tick(100, &mut app, &mut broker);
    assert_eq!(mqtt.state(), MqttState::Uninitialized);
    assert!(!broker.connected);
}
