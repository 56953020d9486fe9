//! Application service: the root context of the firmware.
//!
//! [`LightService`] owns the single live config (through the
//! [`ConfigStore`]), the parameter registry, the notification bus, the
//! night-mode scheduler and the animation FSM.  All I/O flows through
//! port traits injected at call sites, so the whole service runs under
//! host tests with mock adapters.
//!
//! ```text
//!  StoragePort ◀──▶ ┌──────────────────────────────┐ ──▶ BrightnessSink
//!                   │        LightService          │
//!  TimeSource  ───▶ │ Store · Registry · Bus       │ ──▶ EventSink
//!                   │ NightMode · Animation FSM    │
//!                   └──────────────────────────────┘
//!                        ▲                 │
//!              dispatch / MQTT        Notification
//!                        │                 ▼
//!                   rpc::ws / rpc::mqtt subscribers
//! ```

use log::{info, warn};

use crate::config::{AppSettings, Config, PWM_MAX_VALUE};
use crate::error::Result;
use crate::events::{Notification, NotificationBus, Sender};
use crate::fsm::context::AnimationContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::registry::{ParameterRegistry, PropertyId};
use crate::scheduler::NightModeScheduler;
use crate::storage::{ConfigStore, LoadOutcome};
use crate::timer::OneShot;

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{BrightnessSink, EventSink, StoragePort};

/// What the main loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The restart delay elapsed and pending changes are flushed.
    Restart,
}

/// Clamp `value` to `[floor, PWM_MAX_VALUE]`, with the floor itself
/// capped at `PWM_MAX_VALUE`.
pub fn clamp_brightness(value: u16, floor: u16) -> u16 {
    value.max(floor.min(PWM_MAX_VALUE)).min(PWM_MAX_VALUE)
}

/// Shift a UTC epoch by a fractional hour offset.
pub fn local_epoch(utc_secs: u64, time_zone_hours: f32) -> u64 {
    let offset = (time_zone_hours * 3600.0) as i64;
    utc_secs.saturating_add_signed(offset)
}

// ───────────────────────────────────────────────────────────────
// LightService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct LightService {
    store: ConfigStore,
    registry: ParameterRegistry,
    bus: NotificationBus,
    night: NightModeScheduler,
    fsm: Fsm,
    anim: AnimationContext,
    settings: AppSettings,
    /// Time of the latest tick; stamps debounce and restart timers.
    now_ms: u64,
    restart_timer: OneShot,
    last_output: Option<u16>,
    /// Events raised between ticks, flushed to the sink on the next tick.
    pending_events: Vec<AppEvent>,
}

impl LightService {
    /// Build the service around the firmware's parameter table.
    ///
    /// Fails only if the table itself is inconsistent.
    pub fn new(settings: AppSettings) -> Result<Self> {
        let registry = ParameterRegistry::with_defaults()?;
        Ok(Self::with_registry(settings, registry))
    }

    pub fn with_registry(settings: AppSettings, registry: ParameterRegistry) -> Self {
        let store = ConfigStore::new(settings.storage_save_interval_ms);
        let night = NightModeScheduler::new(
            settings.night_fade_update_ms,
            settings.night_steady_update_ms,
        );
        let (timeout, flash) = Self::animation_timings(store.config());

        Self {
            store,
            registry,
            bus: NotificationBus::new(),
            night,
            fsm: Fsm::new(build_state_table(), StateId::Uninitialized),
            anim: AnimationContext::new(timeout, flash),
            settings,
            now_ms: 0,
            restart_timer: OneShot::new(),
            last_output: None,
            pending_events: Vec::new(),
        }
    }

    fn animation_timings(config: &Config) -> (u32, u32) {
        (
            config.sys_config.power_change_timeout,
            config.sys_config.wifi_connect_flash_timeout,
        )
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load the persisted config (or defaults).  Call before [`start`](Self::start).
    pub fn load(&mut self, storage: &impl StoragePort) -> LoadOutcome {
        let outcome = self.store.load(storage);
        self.night.reset();
        outcome
    }

    /// Start the animation in its initial state.
    pub fn start(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.now_ms = now_ms;
        self.anim.now_ms = now_ms;
        self.sync_animation_inputs();
        self.fsm.start(&mut self.anim);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("LightService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one cycle: restart check → storage → night mode → animation
    /// → output.
    ///
    /// `utc_secs` is the synchronised wall clock, if any.
    pub fn tick(
        &mut self,
        now_ms: u64,
        utc_secs: Option<u64>,
        storage: &mut impl StoragePort,
        output: &mut impl BrightnessSink,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        self.now_ms = now_ms;

        // 1. Restart once the delay has elapsed, flushing pending changes
        if self.restart_timer.poll(now_ms) {
            if self.store.is_pending_commit() {
                if let Err(e) = self.store.force_save(storage) {
                    warn!("LightService: final commit failed ({})", e);
                }
            }
            self.flush_events(sink);
            info!("LightService: restarting");
            return TickOutcome::Restart;
        }

        // 2. Debounced persistence
        if let Ok(true) = self.store.tick(now_ms, storage) {
            self.pending_events.push(AppEvent::ConfigCommitted);
        }

        // 3. Night-mode schedule
        let config = self.store.config();
        let night_mode = config.night_mode;
        let local = utc_secs.map(|utc| local_epoch(utc, config.sys_config.time_zone));
        if let Some(is_night) = self.night.tick(&night_mode, local, now_ms) {
            self.pending_events.push(AppEvent::NightModeChanged(is_night));
        }

        // 4. Animation
        self.sync_animation_inputs();
        let prev = self.fsm.current_state();
        self.fsm.tick(now_ms, &mut self.anim);
        let next = self.fsm.current_state();
        if next != prev {
            self.pending_events.push(AppEvent::StateChanged { from: prev, to: next });
        }

        // 5. Output
        if self.last_output != Some(self.anim.output) {
            output.set_brightness(self.anim.output);
            self.last_output = Some(self.anim.output);
        }

        self.flush_events(sink);
        TickOutcome::Continue
    }

    fn sync_animation_inputs(&mut self) {
        let (timeout, flash) = Self::animation_timings(self.store.config());
        self.anim.power_change_timeout_ms = timeout;
        self.anim.flash_period_ms = flash;
        self.anim.power_on = self.store.config().is_power_on();
        self.anim.target = self.brightness();
    }

    fn flush_events(&mut self, sink: &mut impl EventSink) {
        for event in self.pending_events.drain(..) {
            sink.emit(&event);
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (button, network stack, maintenance).
    pub fn handle_command(&mut self, cmd: AppCommand) {
        match cmd {
            AppCommand::SetPower(on) => self.apply_power(on, Sender::Application),
            AppCommand::TogglePower => {
                let on = !self.store.config().is_power_on();
                self.apply_power(on, Sender::Application);
            }
            AppCommand::NetworkReady => {
                if !self.anim.network_ready {
                    info!("LightService: network ready");
                    self.anim.network_ready = true;
                }
            }
            AppCommand::Restart => self.request_restart(),
            AppCommand::FactoryReset => {
                self.store.reset(self.now_ms);
                self.night.reset();
                self.set_power(self.store.config().is_power_on());
                self.request_restart();
            }
        }
    }

    /// Write the power flag and run the usual post-update reactions.
    pub fn apply_power(&mut self, on: bool, sender: Sender) {
        self.store.config_mut().power = u8::from(on);
        self.after_property_update(PropertyId::Power, sender);
    }

    /// Drive the animation toward `on`.  During boot the new state
    /// applies directly; afterwards it starts a fade.
    pub fn set_power(&mut self, on: bool) {
        self.store.config_mut().power = u8::from(on);
        if self.anim.power_on == on {
            return;
        }
        self.anim.power_on = on;
        self.pending_events.push(AppEvent::PowerChanged(on));

        match self.fsm.current_state() {
            StateId::Uninitialized | StateId::Initialization => {}
            _ => {
                self.anim.now_ms = self.now_ms;
                self.anim.target = self.brightness();
                let next = if on { StateId::TurningOn } else { StateId::TurningOff };
                self.fsm.force_transition(next, &mut self.anim);
            }
        }
    }

    /// Reactions common to every successful parameter write: power
    /// changes animate, night-mode changes reschedule, and every change
    /// is persisted (debounced) and published.
    pub fn after_property_update(&mut self, property: PropertyId, sender: Sender) {
        match property {
            PropertyId::Power => self.set_power(self.store.config().is_power_on()),
            p if p.is_night_mode() => self.night.reset(),
            _ => {}
        }
        self.store.save(self.now_ms);
        self.bus.publish(
            Notification::new(sender, property),
            self.store.config(),
            &self.registry,
        );
    }

    /// Schedule a restart after the configured delay.
    pub fn request_restart(&mut self) {
        let delay_ms = self.settings.restart_delay_ms;
        self.restart_timer.arm(self.now_ms, delay_ms);
        self.pending_events.push(AppEvent::RestartScheduled { delay_ms });
        info!("LightService: restart in {} ms", delay_ms);
    }

    // ── Queries ───────────────────────────────────────────────

    /// Brightness the light settles at when on: the night blend while in
    /// the night window, else the configured value; always clamped to
    /// `[led_min_brightness, PWM_MAX_VALUE]`.
    pub fn brightness(&self) -> u16 {
        let config = self.store.config();
        let night_mode = config.night_mode;
        let value = self.night.current_brightness(config.brightness, &night_mode);
        clamp_brightness(value, config.sys_config.led_min_brightness)
    }

    pub fn config(&self) -> &Config {
        self.store.config()
    }

    /// Mutable config for registry-driven writes.  Follow up with
    /// [`after_property_update`](Self::after_property_update).
    pub fn config_mut(&mut self) -> &mut Config {
        self.store.config_mut()
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Current animation state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn is_night_time(&self) -> bool {
        let night_mode = self.store.config().night_mode;
        self.night.is_night_time(&night_mode)
    }

    pub fn fade_factor(&self) -> f32 {
        self.night.fade_factor()
    }

    /// Brightness applied on the last tick.
    pub fn output(&self) -> u16 {
        self.anim.output
    }

    pub fn is_restart_pending(&self) -> bool {
        self.restart_timer.is_pending()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CONFIG_KEY, STORAGE_NAMESPACE};
    use crate::app::ports::StorageError;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemStore {
        data: HashMap<String, Vec<u8>>,
        writes: usize,
    }

    impl StoragePort for MemStore {
        fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> core::result::Result<usize, StorageError> {
            let v = self.data.get(&format!("{ns}/{key}")).ok_or(StorageError::NotFound)?;
            let n = v.len().min(buf.len());
            buf[..n].copy_from_slice(&v[..n]);
            Ok(n)
        }
        fn len(&self, ns: &str, key: &str) -> core::result::Result<usize, StorageError> {
            self.data.get(&format!("{ns}/{key}")).map(Vec::len).ok_or(StorageError::NotFound)
        }
        fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> core::result::Result<(), StorageError> {
            self.writes += 1;
            self.data.insert(format!("{ns}/{key}"), data.to_vec());
            Ok(())
        }
        fn delete(&mut self, ns: &str, key: &str) -> core::result::Result<(), StorageError> {
            self.data.remove(&format!("{ns}/{key}"));
            Ok(())
        }
        fn exists(&self, ns: &str, key: &str) -> bool {
            self.data.contains_key(&format!("{ns}/{key}"))
        }
    }

    #[derive(Default)]
    struct Out(Vec<u16>);
    impl BrightnessSink for Out {
        fn set_brightness(&mut self, value: u16) {
            self.0.push(value);
        }
    }

    #[derive(Default)]
    struct Events(Vec<AppEvent>);
    impl EventSink for Events {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    struct Rig {
        svc: LightService,
        store: MemStore,
        out: Out,
        events: Events,
    }

    impl Rig {
        fn new() -> Self {
            let mut svc = LightService::new(AppSettings::default()).unwrap();
            let mut events = Events::default();
            svc.start(0, &mut events);
            Self { svc, store: MemStore::default(), out: Out::default(), events }
        }

        fn tick(&mut self, now: u64) -> TickOutcome {
            self.svc.tick(now, None, &mut self.store, &mut self.out, &mut self.events)
        }

        /// Boot through Initialization into StandBy.
        fn ready(mut self) -> Self {
            self.svc.handle_command(AppCommand::NetworkReady);
            for t in [0, 20, 1100, 1200] {
                self.tick(t);
            }
            assert_eq!(self.svc.state(), StateId::StandBy);
            self
        }
    }

    #[test]
    fn boots_into_standby_with_target() {
        let mut rig = Rig::new().ready();
        rig.tick(1300);
        assert_eq!(rig.svc.output(), 2048);
        assert_eq!(rig.out.0.last(), Some(&2048));
        assert!(rig.events.0.contains(&AppEvent::Started(StateId::Uninitialized)));
    }

    #[test]
    fn power_off_fades_then_standby() {
        let mut rig = Rig::new().ready();
        rig.svc.handle_command(AppCommand::SetPower(false));
        assert_eq!(rig.svc.state(), StateId::TurningOff);
        assert!(rig.svc.store().is_pending_commit());

        rig.tick(1700);
        assert!(rig.svc.output() > 0 && rig.svc.output() < 2048);
        rig.tick(2200);
        assert_eq!(rig.svc.output(), 0);
        assert_eq!(rig.svc.state(), StateId::StandBy);
        assert!(rig.events.0.contains(&AppEvent::PowerChanged(false)));
    }

    #[test]
    fn repeated_power_on_does_not_restart_fade() {
        let mut rig = Rig::new().ready();
        rig.svc.handle_command(AppCommand::SetPower(true));
        assert_eq!(rig.svc.state(), StateId::StandBy);
    }

    #[test]
    fn power_during_boot_applies_without_fade() {
        let mut rig = Rig::new();
        rig.tick(0);
        assert_eq!(rig.svc.state(), StateId::Initialization);
        rig.svc.handle_command(AppCommand::SetPower(false));
        assert_eq!(rig.svc.state(), StateId::Initialization);
        rig.tick(1500);
        assert_eq!(rig.svc.output(), 0);
    }

    #[test]
    fn toggle_inverts_power() {
        let mut rig = Rig::new().ready();
        rig.svc.handle_command(AppCommand::TogglePower);
        assert!(!rig.svc.config().is_power_on());
        rig.svc.handle_command(AppCommand::TogglePower);
        assert!(rig.svc.config().is_power_on());
    }

    #[test]
    fn debounced_commit_emits_event() {
        let mut rig = Rig::new().ready();
        rig.svc.config_mut().brightness = 100;
        rig.svc.after_property_update(PropertyId::Brightness, Sender::Application);
        rig.tick(30_000);
        assert_eq!(rig.store.writes, 0);
        rig.tick(1200 + 60_000);
        assert_eq!(rig.store.writes, 1);
        assert!(rig.events.0.contains(&AppEvent::ConfigCommitted));
        assert!(rig.store.exists(STORAGE_NAMESPACE, CONFIG_KEY));
    }

    #[test]
    fn restart_flushes_pending_commit() {
        let mut rig = Rig::new().ready();
        rig.svc.config_mut().brightness = 100;
        rig.svc.after_property_update(PropertyId::Brightness, Sender::Application);
        rig.svc.handle_command(AppCommand::Restart);
        assert!(rig.svc.is_restart_pending());

        assert_eq!(rig.tick(1500), TickOutcome::Continue);
        assert_eq!(rig.tick(1700), TickOutcome::Restart);
        assert_eq!(rig.store.writes, 1);
        assert!(!rig.svc.store().is_pending_commit());
        assert!(rig.events.0.contains(&AppEvent::RestartScheduled { delay_ms: 500 }));
    }

    #[test]
    fn factory_reset_restores_defaults_and_restarts() {
        let mut rig = Rig::new().ready();
        rig.svc.config_mut().brightness = 77;
        rig.svc.handle_command(AppCommand::FactoryReset);
        assert_eq!({ rig.svc.config().brightness }, { Config::default().brightness });
        assert!(rig.svc.is_restart_pending());
        assert!(rig.svc.store().is_pending_commit());
    }

    #[test]
    fn night_window_blends_brightness() {
        let mut rig = Rig::new().ready();
        {
            let cfg = rig.svc.config_mut();
            cfg.night_mode.enabled = 1;
            cfg.night_mode.start_time = 22 * 3600;
            cfg.night_mode.end_time = 6 * 3600;
            cfg.night_mode.brightness = 10;
            cfg.sys_config.time_zone = 0.0;
        }
        rig.svc.after_property_update(PropertyId::NightModeEnabled, Sender::Application);

        let day = 19_000 * 86_400;
        rig.svc.tick(2000, Some(day + 23 * 3600), &mut rig.store, &mut rig.out, &mut rig.events);
        assert!(rig.svc.is_night_time());
        rig.tick(2020);
        assert_eq!(rig.svc.output(), 10);
        assert!(rig.events.0.contains(&AppEvent::NightModeChanged(true)));
    }

    #[test]
    fn time_zone_shifts_local_time() {
        assert_eq!(local_epoch(10_000, 5.0), 28_000);
        assert_eq!(local_epoch(10_000, -1.5), 4_600);
        assert_eq!(local_epoch(100, -1.0), 0);
    }

    #[test]
    fn clamp_order_at_floor_boundary() {
        assert_eq!(clamp_brightness(500, 500), 500);
        assert_eq!(clamp_brightness(499, 500), 500);
        assert_eq!(clamp_brightness(501, 500), 501);
        assert_eq!(clamp_brightness(0, 0), 0);
        assert_eq!(clamp_brightness(u16::MAX, 0), PWM_MAX_VALUE);
        assert_eq!(clamp_brightness(10, u16::MAX), PWM_MAX_VALUE);
    }

    #[test]
    fn brightness_respects_min_floor() {
        let mut rig = Rig::new().ready();
        rig.svc.config_mut().sys_config.led_min_brightness = 300;
        rig.svc.config_mut().brightness = 300;
        assert_eq!(rig.svc.brightness(), 300);
        rig.svc.config_mut().brightness = 100;
        assert_eq!(rig.svc.brightness(), 300);
    }
}
