//! Binary protocol end to end: intake → queue → dispatch → reply →
//! fan-out → debounced save.

use crate::mocks::{MemStore, RecordingClients, RecordingSink, packet};

use lumos::app::service::LightService;
use lumos::config::{AppSettings, Config};
use lumos::drivers::led_output::MemoryOutput;
use lumos::registry::{PacketType, PropertyId};
use lumos::rpc::codec::{ResponseCode, parse};
use lumos::rpc::ws::WsServer;
use lumos::storage::{CONFIG_KEY, STORAGE_NAMESPACE};

fn setup() -> (LightService, WsServer) {
    let mut app = LightService::new(AppSettings::default()).unwrap();
    app.start(0, &mut RecordingSink::new());
    let mut ws = WsServer::new();
    ws.attach(app.bus());
    (app, ws)
}

#[test]
fn brightness_request_end_to_end() {
    let (mut app, mut ws) = setup();
    let mut clients = RecordingClients::new();
    let mut store = MemStore::new();
    let mut out = MemoryOutput::default();
    let mut sink = RecordingSink::new();

    // Another subscriber on the bus sees the change too.
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let log = std::rc::Rc::clone(&seen);
    app.bus()
        .subscribe(PropertyId::Brightness, move |d| log.borrow_mut().push(d.notification.sender));

    assert!(ws.on_data(5, &packet(7, PacketType::Brightness as u8, &[0x00, 0x40])).is_none());
    assert_eq!(ws.handle_incoming(&mut app, &mut clients), 1);

    // Field updated
    assert_eq!({ app.config().brightness }, 0x4000);

    // Reply to the sender only, echoing the request id
    assert_eq!(clients.sent.len(), 1);
    let (to, reply) = &clients.sent[0];
    assert_eq!(*to, 5);
    let reply = parse(reply).unwrap();
    assert_eq!(reply.request_id(), 7);
    assert_eq!(reply.packet_type(), Some(PacketType::ResponseString));
    assert_eq!(reply.payload, ResponseCode::Ok.code_string().as_bytes());

    // Fan-out to everyone else
    assert_eq!(clients.broadcast.len(), 1);
    let (exclude, frame) = &clients.broadcast[0];
    assert_eq!(*exclude, Some(5));
    let note = parse(frame).unwrap();
    assert_eq!(note.request_id(), 0);
    assert_eq!(note.packet_type(), Some(PacketType::Brightness));
    assert_eq!(note.payload, &[0x00, 0x40]);
    assert_eq!(seen.borrow().len(), 1);

    // Save is debounced, not immediate
    assert!(app.store().is_pending_commit());
    app.tick(1_000, None, &mut store, &mut out, &mut sink);
    assert_eq!(store.writes, 0);
    app.tick(60_000, None, &mut store, &mut out, &mut sink);
    assert_eq!(store.writes, 1);
    let record = store.raw(STORAGE_NAMESPACE, CONFIG_KEY).unwrap();
    assert_eq!(&record[5..], app.config().as_bytes());
}

#[test]
fn rejected_update_leaves_config_and_clients_alone() {
    let (mut app, mut ws) = setup();
    let mut clients = RecordingClients::new();
    let before = *app.config();

    ws.on_data(1, &packet(3, PacketType::Color as u8, &[1, 2]));
    ws.handle_incoming(&mut app, &mut clients);

    let reply = parse(&clients.sent[0].1).unwrap();
    assert_eq!(reply.payload, b"BAD REQUEST");
    assert!(clients.broadcast.is_empty());
    assert_eq!(app.config().as_bytes(), before.as_bytes());
    assert!(!app.store().is_pending_commit());
}

#[test]
fn get_config_returns_live_record() {
    let (mut app, mut ws) = setup();
    let mut clients = RecordingClients::new();

    ws.on_data(1, &packet(1, PacketType::NightModeBrightness as u8, &[0x34, 0x12]));
    ws.on_data(1, &packet(2, PacketType::GetConfig as u8, &[]));
    ws.handle_incoming(&mut app, &mut clients);

    let reply = parse(&clients.sent[1].1).unwrap();
    assert_eq!(reply.request_id(), 2);
    assert_eq!(reply.packet_type(), Some(PacketType::ResponseBinary));
    let cfg = Config::from_bytes(reply.payload).unwrap();
    assert_eq!({ cfg.night_mode.brightness }, 0x1234);
}

#[test]
fn queue_overflow_is_answered_immediately() {
    let (mut app, ws) = setup();
    let mut accepted = 0;
    let mut refused = Vec::new();
    for id in 0..12u16 {
        match ws.on_data(1, &packet(id, PacketType::GetConfig as u8, &[])) {
            None => accepted += 1,
            Some(frame) => refused.push(frame),
        }
    }
    assert_eq!(accepted, 10);
    assert_eq!(refused.len(), 2);
    let first = parse(&refused[0]).unwrap();
    assert_eq!(first.request_id(), 10);
    assert_eq!(first.payload, b"TOO MANY REQUESTS");

    let mut ws = ws;
    let mut clients = RecordingClients::new();
    assert_eq!(ws.handle_incoming(&mut app, &mut clients), 10);
    assert!(ws.on_data(1, &packet(99, PacketType::GetConfig as u8, &[])).is_none());
}

#[test]
fn power_off_fades_output_and_notifies_off_id() {
    let (mut app, mut ws) = setup();
    let mut clients = RecordingClients::new();
    let mut store = MemStore::new();
    let mut out = MemoryOutput::default();
    let mut sink = RecordingSink::new();

    app.handle_command(lumos::app::commands::AppCommand::NetworkReady);
    app.tick(20, None, &mut store, &mut out, &mut sink);
    app.tick(40, None, &mut store, &mut out, &mut sink);
    app.tick(1_100, None, &mut store, &mut out, &mut sink);
    assert_eq!(out.value, 2048);

    ws.on_data(9, &packet(1, PacketType::PowerOff as u8, &[]));
    ws.handle_incoming(&mut app, &mut clients);
    let note = parse(&clients.broadcast[0].1).unwrap();
    assert_eq!(note.packet_type(), Some(PacketType::PowerOff));

    app.tick(1_600, None, &mut store, &mut out, &mut sink);
    assert!(out.value > 0 && out.value < 2048);
    app.tick(2_200, None, &mut store, &mut out, &mut sink);
    assert_eq!(out.value, 0);
}

#[test]
fn restart_commits_pending_changes_first() {
    let (mut app, mut ws) = setup();
    let mut clients = RecordingClients::new();
    let mut store = MemStore::new();
    let mut out = MemoryOutput::default();
    let mut sink = RecordingSink::new();

    app.tick(10, None, &mut store, &mut out, &mut sink);
    ws.on_data(1, &packet(1, PacketType::Brightness as u8, &[0x00, 0x10]));
    ws.on_data(1, &packet(2, PacketType::Restart as u8, &[]));
    ws.handle_incoming(&mut app, &mut clients);
    assert!(app.is_restart_pending());

    use lumos::app::service::TickOutcome;
    assert_eq!(app.tick(100, None, &mut store, &mut out, &mut sink), TickOutcome::Continue);
    assert_eq!(app.tick(510, None, &mut store, &mut out, &mut sink), TickOutcome::Restart);
    assert_eq!(store.writes, 1);
    assert!(!app.store().is_pending_commit());
}
