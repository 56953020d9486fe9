//! LightService as the main loop drives it: boot pulse, power fades,
//! night-mode dimming from the wall clock, factory reset.

use crate::mocks::{MemStore, RecordingSink};

use lumos::app::commands::AppCommand;
use lumos::app::events::AppEvent;
use lumos::app::service::{LightService, TickOutcome};
use lumos::config::AppSettings;
use lumos::drivers::led_output::MemoryOutput;
use lumos::fsm::StateId;
use lumos::scheduler::SECS_PER_DAY;

/// Some UTC midnight.
const DAY: u64 = 19_500 * SECS_PER_DAY;

fn at(h: u64, m: u64) -> Option<u64> {
    Some(DAY + h * 3600 + m * 60)
}

struct Rig {
    app: LightService,
    store: MemStore,
    out: MemoryOutput,
    sink: RecordingSink,
}

impl Rig {
    fn new() -> Self {
        let mut app = LightService::new(AppSettings::default()).unwrap();
        let mut sink = RecordingSink::new();
        app.start(0, &mut sink);
        Self {
            app,
            store: MemStore::new(),
            out: MemoryOutput::default(),
            sink,
        }
    }

    fn night_config(&mut self) {
        let cfg = self.app.config_mut();
        cfg.brightness = 1000;
        cfg.sys_config.time_zone = 0.0;
        cfg.night_mode.enabled = 1;
        cfg.night_mode.brightness = 10;
        cfg.night_mode.start_time = 22 * 3600;
        cfg.night_mode.end_time = 6 * 3600;
        cfg.night_mode.switch_interval = 900;
    }

    fn tick(&mut self, now_ms: u64, utc: Option<u64>) -> TickOutcome {
        self.app.tick(now_ms, utc, &mut self.store, &mut self.out, &mut self.sink)
    }

    /// Boot, report the network, and settle in STAND_BY.
    fn settle(&mut self, utc: Option<u64>) {
        self.app.handle_command(AppCommand::NetworkReady);
        self.tick(20, utc);
        self.tick(40, utc);
        self.tick(1_100, utc);
        assert_eq!(self.app.state(), StateId::StandBy);
    }
}

#[test]
fn boot_pulses_until_network_then_fades_in() {
    let mut rig = Rig::new();
    rig.tick(20, None);
    assert_eq!(rig.app.state(), StateId::Initialization);

    let mut peak = 0;
    for t in (40..3_000).step_by(20) {
        rig.tick(t, None);
        peak = peak.max(rig.out.value);
    }
    assert!(peak > 0 && peak <= 2048);
    assert_eq!(rig.app.state(), StateId::Initialization);

    rig.app.handle_command(AppCommand::NetworkReady);
    rig.tick(3_000, None);
    assert_eq!(rig.app.state(), StateId::TurningOn);

    let mut last = 0;
    for t in (3_100..4_000).step_by(100) {
        rig.tick(t, None);
        assert!(rig.out.value >= last);
        last = rig.out.value;
    }
    rig.tick(4_000, None);
    assert_eq!(rig.out.value, 2048);
    assert_eq!(rig.app.state(), StateId::StandBy);
    assert!(rig.sink.events.contains(&AppEvent::StateChanged {
        from: StateId::TurningOn,
        to: StateId::StandBy,
    }));
}

#[test]
fn powered_off_boot_stays_dark() {
    let mut rig = Rig::new();
    rig.app.config_mut().power = 0;
    for t in (20..2_000).step_by(20) {
        rig.tick(t, None);
        assert_eq!(rig.out.value, 0);
    }
    rig.app.handle_command(AppCommand::NetworkReady);
    rig.tick(2_000, None);
    assert_eq!(rig.app.state(), StateId::StandBy);
    assert_eq!(rig.out.value, 0);
}

#[test]
fn deep_night_uses_night_brightness() {
    let mut rig = Rig::new();
    rig.night_config();
    rig.settle(at(23, 0));

    assert!(rig.app.is_night_time());
    assert_eq!(rig.app.fade_factor(), 1.0);
    assert_eq!(rig.out.value, 10);
    assert!(rig.sink.events.contains(&AppEvent::NightModeChanged(true)));
}

#[test]
fn evening_ramp_blends_toward_night() {
    let mut rig = Rig::new();
    rig.night_config();
    rig.settle(at(21, 50));

    assert!(rig.app.is_night_time());
    assert!((rig.app.fade_factor() - 1.0 / 3.0).abs() < 0.01);
    assert!((668..=672).contains(&rig.out.value), "got {}", rig.out.value);
}

#[test]
fn daytime_and_unsynced_clock_use_normal_brightness() {
    let mut rig = Rig::new();
    rig.night_config();
    rig.settle(at(12, 0));
    assert!(!rig.app.is_night_time());
    assert_eq!(rig.out.value, 1000);

    let mut rig = Rig::new();
    rig.night_config();
    rig.settle(None);
    assert_eq!(rig.out.value, 1000);
}

#[test]
fn leaving_the_window_restores_brightness() {
    let mut rig = Rig::new();
    rig.night_config();
    rig.settle(at(23, 0));
    assert_eq!(rig.out.value, 10);

    let morning = at(24 + 6, 20);
    rig.tick(5_000, morning);
    assert!(!rig.app.is_night_time());
    assert_eq!(rig.out.value, 1000);
    assert!(rig.sink.events.contains(&AppEvent::NightModeChanged(false)));
}

#[test]
fn minimum_brightness_floor_applies() {
    let mut rig = Rig::new();
    rig.night_config();
    rig.app.config_mut().sys_config.led_min_brightness = 50;
    rig.settle(at(23, 0));
    assert_eq!(rig.out.value, 50);
}

#[test]
fn toggle_and_factory_reset() {
    let mut rig = Rig::new();
    rig.settle(None);

    rig.app.handle_command(AppCommand::TogglePower);
    assert!(!rig.app.config().is_power_on());
    assert_eq!(rig.app.state(), StateId::TurningOff);
    assert_eq!(rig.tick(1_200, None), TickOutcome::Continue);
    assert!(rig.sink.events.contains(&AppEvent::PowerChanged(false)));

    rig.app.config_mut().brightness = 77;
    rig.app.handle_command(AppCommand::FactoryReset);
    assert_eq!({ rig.app.config().brightness }, 2048);
    assert!(rig.app.config().is_power_on());
    assert!(rig.app.is_restart_pending());
    assert_eq!(rig.tick(1_700, None), TickOutcome::Restart);
    assert_eq!(rig.store.writes, 1);
}
