//! System time adapter.
//!
//! Implements [`Clock`] (monotonic milliseconds) and [`TimeSource`]
//! (UTC wall clock).
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for the monotonic
//!   clock and `gettimeofday()` (kept in sync by SNTP) for wall time.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `SystemTime` for host-side simulation.

use crate::app::ports::{Clock, TimeSource};

/// Wall-clock readings before 2020-01-01 mean SNTP has not synced yet.
const EPOCH_2020: u64 = 1_577_836_800;

/// Reject obviously unsynced wall-clock readings.
fn synced(secs: u64) -> Option<u64> {
    (secs >= EPOCH_2020).then_some(secs)
}

pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    #[cfg(target_os = "espidf")]
    fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl TimeSource for SystemClock {
    #[cfg(target_os = "espidf")]
    fn utc_epoch_secs(&self) -> Option<u64> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        u64::try_from(tv.tv_sec).ok().and_then(synced)
    }

    #[cfg(not(target_os = "espidf"))]
    fn utc_epoch_secs(&self) -> Option<u64> {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .and_then(|d| synced(d.as_secs()))
    }
}
