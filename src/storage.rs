//! Debounced, diff-aware persistence of the config record.
//!
//! Stored layout (one value per key):
//! ```text
//! ┌──────────────┬─────────────┬───────────────────────────┐
//! │ header (4B)  │ version (1B)│ Config bytes (Config::SIZE)│
//! │ LE 0xd0c1f2c3│             │                           │
//! └──────────────┴─────────────┴───────────────────────────┘
//! ```
//!
//! Every mutation calls [`ConfigStore::save`], which (re)arms a single
//! debounce timer; the write happens once mutations stop for the
//! configured quiet period.  A commit whose bytes already match the
//! stored value is skipped to spare flash.

use log::{debug, info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::{Config, STORAGE_CONFIG_VERSION, STORAGE_HEADER};
use crate::timer::OneShot;

/// Namespace of the config record and runtime settings.
pub const STORAGE_NAMESPACE: &str = "storage";
/// Key of the config record.
pub const CONFIG_KEY: &str = "config";

const RECORD_PREFIX_SIZE: usize = 5;
/// Exact size of a valid stored record.
pub const RECORD_SIZE: usize = RECORD_PREFIX_SIZE + Config::SIZE;

/// Why [`ConfigStore::load`] fell back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    Missing,
    SizeMismatch(usize),
    BadHeader,
    VersionMismatch(u8),
    ReadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Defaults(ResetReason),
}

/// Owner of the single live [`Config`].
pub struct ConfigStore {
    config: Config,
    save_timer: OneShot,
    save_interval_ms: u64,
    /// Latest time seen by `save`/`tick`; anchors the retry after a
    /// failed `force_save`.
    last_seen_ms: u64,
}

impl ConfigStore {
    /// A store holding compiled-in defaults.  Call [`load`](Self::load)
    /// at boot to pick up the persisted record.
    pub fn new(save_interval_ms: u64) -> Self {
        Self {
            config: Config::default(),
            save_timer: OneShot::new(),
            save_interval_ms,
            last_seen_ms: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access for application logic.  Callers must follow up
    /// with [`save`](Self::save).
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    // ── Load ──────────────────────────────────────────────────

    /// Read the stored record, or fall back to defaults when it is
    /// missing, the wrong size, or from another header/version.
    pub fn load(&mut self, storage: &impl StoragePort) -> LoadOutcome {
        match Self::read_record(storage) {
            Ok(config) => {
                self.config = config;
                info!("Storage: loaded config ({} bytes)", RECORD_SIZE);
                LoadOutcome::Loaded
            }
            Err(reason) => {
                self.config = Config::default();
                match reason {
                    ResetReason::Missing => info!("Storage: no stored config, using defaults"),
                    other => warn!("Storage: stored config rejected ({:?}), using defaults", other),
                }
                LoadOutcome::Defaults(reason)
            }
        }
    }

    fn read_record(storage: &impl StoragePort) -> Result<Config, ResetReason> {
        let len = match storage.len(STORAGE_NAMESPACE, CONFIG_KEY) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Err(ResetReason::Missing),
            Err(_) => return Err(ResetReason::ReadFailed),
        };
        if len != RECORD_SIZE {
            return Err(ResetReason::SizeMismatch(len));
        }

        let mut buf = [0u8; RECORD_SIZE];
        match storage.read(STORAGE_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(n) if n == RECORD_SIZE => {}
            Ok(n) => return Err(ResetReason::SizeMismatch(n)),
            Err(_) => return Err(ResetReason::ReadFailed),
        }

        let header = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if header != STORAGE_HEADER {
            return Err(ResetReason::BadHeader);
        }
        if buf[4] != STORAGE_CONFIG_VERSION {
            return Err(ResetReason::VersionMismatch(buf[4]));
        }
        Config::from_bytes(&buf[RECORD_PREFIX_SIZE..]).ok_or(ResetReason::SizeMismatch(len))
    }

    // ── Save scheduling ───────────────────────────────────────

    /// Schedule a commit after the quiet period, restarting the window
    /// if one is already pending.
    pub fn save(&mut self, now_ms: u64) {
        self.last_seen_ms = now_ms;
        self.save_timer.arm(now_ms, self.save_interval_ms);
        debug!("Storage: commit scheduled in {} ms", self.save_interval_ms);
    }

    /// Write immediately, cancelling any pending commit once the record
    /// is safely stored.  Returns `Ok(true)` if bytes were written,
    /// `Ok(false)` if skipped.  A failed write leaves a commit pending
    /// one window after the last observed time.
    pub fn force_save(&mut self, storage: &mut impl StoragePort) -> Result<bool, StorageError> {
        match self.commit(storage) {
            Ok(written) => {
                self.save_timer.cancel();
                Ok(written)
            }
            Err(e) => {
                warn!("Storage: forced commit failed ({}), retrying in {} ms", e, self.save_interval_ms);
                self.save_timer.arm(self.last_seen_ms, self.save_interval_ms);
                Err(e)
            }
        }
    }

    /// Restore defaults and schedule a commit.
    pub fn reset(&mut self, now_ms: u64) {
        self.config = Config::default();
        info!("Storage: config reset to defaults");
        self.save(now_ms);
    }

    pub fn is_pending_commit(&self) -> bool {
        self.save_timer.is_pending()
    }

    /// Commit if the debounce window has elapsed.  A failed write is
    /// logged and retried after another window.
    pub fn tick(&mut self, now_ms: u64, storage: &mut impl StoragePort) -> Result<bool, StorageError> {
        self.last_seen_ms = now_ms;
        if !self.save_timer.poll(now_ms) {
            return Ok(false);
        }
        match self.commit(storage) {
            Ok(written) => Ok(written),
            Err(e) => {
                warn!("Storage: commit failed ({}), retrying in {} ms", e, self.save_interval_ms);
                self.save_timer.arm(now_ms, self.save_interval_ms);
                Err(e)
            }
        }
    }

    // ── Commit ────────────────────────────────────────────────

    fn encode_record(&self) -> [u8; RECORD_SIZE] {
        let mut record = [0u8; RECORD_SIZE];
        record[..4].copy_from_slice(&STORAGE_HEADER.to_le_bytes());
        record[4] = STORAGE_CONFIG_VERSION;
        record[RECORD_PREFIX_SIZE..].copy_from_slice(self.config.as_bytes());
        record
    }

    /// `true` unless the stored value has the exact size and bytes of `record`.
    fn differs_from_stored(storage: &impl StoragePort, record: &[u8; RECORD_SIZE]) -> bool {
        match storage.len(STORAGE_NAMESPACE, CONFIG_KEY) {
            Ok(len) if len == RECORD_SIZE => {}
            _ => return true,
        }
        let mut stored = [0u8; RECORD_SIZE];
        match storage.read(STORAGE_NAMESPACE, CONFIG_KEY, &mut stored) {
            Ok(n) if n == RECORD_SIZE => stored != *record,
            _ => true,
        }
    }

    fn commit(&self, storage: &mut impl StoragePort) -> Result<bool, StorageError> {
        let record = self.encode_record();
        if !Self::differs_from_stored(storage, &record) {
            info!("Storage: skip commit, data not changed");
            return Ok(false);
        }
        storage.write(STORAGE_NAMESPACE, CONFIG_KEY, &record)?;
        info!("Storage: committed {} bytes", RECORD_SIZE);
        Ok(true)
    }
}
