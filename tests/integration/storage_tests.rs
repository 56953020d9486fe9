//! Persistence through the service: debounce, skip-unchanged, corrupt
//! records, failed writes.

use crate::mocks::{MemStore, RecordingSink};

use lumos::app::events::AppEvent;
use lumos::app::service::{LightService, TickOutcome};
use lumos::config::{AppSettings, STORAGE_CONFIG_VERSION};
use lumos::drivers::led_output::MemoryOutput;
use lumos::events::Sender;
use lumos::registry::PropertyId;
use lumos::storage::{CONFIG_KEY, ConfigStore, LoadOutcome, ResetReason, STORAGE_NAMESPACE};

const DEBOUNCE: u64 = 60_000;

fn app() -> LightService {
    let mut app = LightService::new(AppSettings::default()).unwrap();
    app.start(0, &mut RecordingSink::new());
    app
}

#[test]
fn many_saves_in_one_window_write_once_with_final_value() {
    let mut app = app();
    let mut store = MemStore::new();
    let mut out = MemoryOutput::default();
    let mut sink = RecordingSink::new();

    for (i, t) in [0u64, 10_000, 20_000, 30_000].into_iter().enumerate() {
        app.tick(t, None, &mut store, &mut out, &mut sink);
        app.config_mut().brightness = 100 + i as u16;
        app.after_property_update(PropertyId::Brightness, Sender::Application);
    }

    // The last save re-armed the window at 30 s.
    app.tick(30_000 + DEBOUNCE - 1, None, &mut store, &mut out, &mut sink);
    assert_eq!(store.writes, 0);
    app.tick(30_000 + DEBOUNCE, None, &mut store, &mut out, &mut sink);
    assert_eq!(store.writes, 1);
    assert!(sink.events.contains(&AppEvent::ConfigCommitted));

    let mut reloaded = ConfigStore::new(DEBOUNCE);
    assert_eq!(reloaded.load(&store), LoadOutcome::Loaded);
    assert_eq!({ reloaded.config().brightness }, 103);
}

#[test]
fn unchanged_record_is_not_rewritten() {
    let mut store = MemStore::new();
    let mut cfg = ConfigStore::new(DEBOUNCE);
    assert_eq!(cfg.force_save(&mut store), Ok(true));
    assert_eq!(cfg.force_save(&mut store), Ok(false));
    assert_eq!(store.writes, 1);

    cfg.save(0);
    assert_eq!(cfg.tick(DEBOUNCE, &mut store), Ok(false));
    assert_eq!(store.writes, 1);
    assert!(!cfg.is_pending_commit());
}

#[test]
fn corrupt_or_foreign_records_fall_back_to_defaults() {
    let mut store = MemStore::new();
    let mut cfg = ConfigStore::new(DEBOUNCE);
    cfg.config_mut().brightness = 7;
    cfg.force_save(&mut store).unwrap();

    store.raw_mut(STORAGE_NAMESPACE, CONFIG_KEY).unwrap()[0] ^= 0xFF;
    let mut fresh = ConfigStore::new(DEBOUNCE);
    assert_eq!(fresh.load(&store), LoadOutcome::Defaults(ResetReason::BadHeader));
    assert_eq!({ fresh.config().brightness }, 2048);

    let record = store.raw_mut(STORAGE_NAMESPACE, CONFIG_KEY).unwrap();
    record[0] ^= 0xFF;
    record[4] = STORAGE_CONFIG_VERSION.wrapping_add(1);
    assert_eq!(
        fresh.load(&store),
        LoadOutcome::Defaults(ResetReason::VersionMismatch(STORAGE_CONFIG_VERSION.wrapping_add(1)))
    );

    store.raw_mut(STORAGE_NAMESPACE, CONFIG_KEY).unwrap().pop();
    assert!(matches!(
        fresh.load(&store),
        LoadOutcome::Defaults(ResetReason::SizeMismatch(_))
    ));

    assert_eq!(
        fresh.load(&MemStore::new()),
        LoadOutcome::Defaults(ResetReason::Missing)
    );
}

#[test]
fn failed_write_stays_pending_and_retries() {
    let mut app = app();
    let mut store = MemStore::new();
    store.fail_writes = true;
    let mut out = MemoryOutput::default();
    let mut sink = RecordingSink::new();

    app.apply_power(false, Sender::Application);
    app.tick(DEBOUNCE, None, &mut store, &mut out, &mut sink);
    assert_eq!(store.writes, 0);
    assert!(app.store().is_pending_commit());

    store.fail_writes = false;
    app.tick(2 * DEBOUNCE - 1, None, &mut store, &mut out, &mut sink);
    assert_eq!(store.writes, 0);
    app.tick(2 * DEBOUNCE, None, &mut store, &mut out, &mut sink);
    assert_eq!(store.writes, 1);
    assert!(!app.store().is_pending_commit());
}

#[test]
fn failed_final_commit_before_restart_stays_pending() {
    let mut app = app();
    let mut store = MemStore::new();
    store.fail_writes = true;
    let mut out = MemoryOutput::default();
    let mut sink = RecordingSink::new();

    app.tick(100, None, &mut store, &mut out, &mut sink);
    app.apply_power(false, Sender::Application);
    app.request_restart();
    assert_eq!(app.tick(600, None, &mut store, &mut out, &mut sink), TickOutcome::Restart);
    assert_eq!(store.writes, 0);
    assert!(app.store().is_pending_commit());
}

#[test]
fn loaded_config_drives_the_service() {
    let mut store = MemStore::new();
    let mut seed = ConfigStore::new(DEBOUNCE);
    seed.config_mut().brightness = 5000;
    seed.config_mut().power = 0;
    seed.force_save(&mut store).unwrap();

    let mut app = LightService::new(AppSettings::default()).unwrap();
    assert_eq!(app.load(&store), LoadOutcome::Loaded);
    assert_eq!(app.brightness(), 5000);
    assert!(!app.config().is_power_on());
}
