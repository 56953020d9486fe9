//! Night-mode scheduler.
//!
//! Computes a daily low-brightness window from a start time, an end
//! time, and a fade duration (all seconds since local midnight), and
//! blends the output brightness across the two ramps.
//!
//! ```text
//!  brightness
//!   normal ───────╮                                ╭──────── normal
//!                  ╲                              ╱
//!   night           ╰────────────────────────────╯
//!           ▲      ▲                         ▲      ▲
//!   next_start_fade next_start          next_end  next_end_fade
//!                 ◀─ switch_interval ─▶          ◀─ switch_interval ─▶
//! ```
//!
//! The window may wrap past midnight (e.g. 22:00–06:00): when the start
//! offset is later than the end offset, the start is taken from the
//! previous day.

use log::{debug, info};

use crate::config::NightModeConfig;
use crate::drivers::waveform::smooth16;
use crate::timer::Interval;

pub const SECS_PER_DAY: u64 = 86_400;

/// Boundaries of the current or next night window, as local epoch seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NightWindow {
    pub next_start_fade: u64,
    pub next_start: u64,
    pub next_end: u64,
    pub next_end_fade: u64,
}

impl NightWindow {
    /// Compute the window that is current at `now`, or the next one if
    /// today's has already elapsed.
    pub fn compute(config: &NightModeConfig, now: u64, today_midnight: u64) -> Self {
        let start_offset = u64::from(config.start_time).min(SECS_PER_DAY);
        let end_offset = u64::from(config.end_time).min(SECS_PER_DAY);
        let interval = u64::from(config.switch_interval);

        let mut day = today_midnight;
        let mut end_fade_time = day + end_offset + interval;
        if now > end_fade_time {
            day += SECS_PER_DAY;
            end_fade_time += SECS_PER_DAY;
        }

        let mut next_start = day + start_offset;
        if start_offset > end_offset {
            next_start = next_start.saturating_sub(SECS_PER_DAY);
        }

        Self {
            next_start_fade: next_start.saturating_sub(interval),
            next_start,
            next_end: end_fade_time - interval,
            next_end_fade: end_fade_time,
        }
    }

    pub fn contains(&self, now: u64) -> bool {
        now >= self.next_start_fade && now <= self.next_end_fade
    }

    /// Inside the window but outside both ramps.
    pub fn is_steady(&self, now: u64) -> bool {
        now >= self.next_start && now <= self.next_end
    }

    /// Blend coefficient at `now`: ramps 0→1 into the window and 1→0 out.
    pub fn fade_factor(&self, now: u64) -> f32 {
        if !self.contains(now) {
            return 0.0;
        }
        if now < self.next_start {
            let span = self.next_start - self.next_start_fade;
            (now - self.next_start_fade) as f32 / span as f32
        } else if now <= self.next_end {
            1.0
        } else {
            let span = self.next_end_fade - self.next_end;
            1.0 - (now - self.next_end) as f32 / span as f32
        }
    }
}

/// Runtime state of the night-mode schedule.
pub struct NightModeScheduler {
    window: NightWindow,
    fade_factor: f32,
    is_night: bool,
    dirty: bool,
    factor_timer: Interval,
    fade_update_ms: u64,
    steady_update_ms: u64,
}

impl NightModeScheduler {
    /// `fade_update_ms` is the factor refresh period inside a ramp,
    /// `steady_update_ms` the period elsewhere in the window.
    pub fn new(fade_update_ms: u64, steady_update_ms: u64) -> Self {
        Self {
            window: NightWindow::default(),
            fade_factor: 0.0,
            is_night: false,
            dirty: true,
            factor_timer: Interval::new(),
            fade_update_ms,
            steady_update_ms,
        }
    }

    /// Force a recompute on the next tick.  Call whenever a night-mode
    /// setting changes.
    pub fn reset(&mut self) {
        self.dirty = true;
        self.factor_timer.reset();
        debug!("NightMode: schedule marked dirty");
    }

    /// Advance the schedule.
    ///
    /// * `local_now`: local epoch seconds, `None` while time is unsynced.
    /// * `now_ms`: monotonic milliseconds, paces fade-factor updates.
    ///
    /// Returns `Some(is_night)` when the light enters or leaves the window.
    pub fn tick(
        &mut self,
        config: &NightModeConfig,
        local_now: Option<u64>,
        now_ms: u64,
    ) -> Option<bool> {
        let was_night = self.is_night;

        if config.enabled == 0 {
            self.is_night = false;
            self.fade_factor = 0.0;
            return (was_night != self.is_night).then_some(self.is_night);
        }
        let now = local_now?;

        if self.dirty {
            self.recompute(config, now);
        }

        self.is_night = self.window.contains(now);
        if self.is_night {
            if !was_night {
                self.factor_timer.reset();
            }
            let period = if self.window.is_steady(now) {
                self.steady_update_ms
            } else {
                self.fade_update_ms
            };
            if self.factor_timer.poll(now_ms, period) {
                self.fade_factor = self.window.fade_factor(now);
            }
        } else {
            self.fade_factor = 0.0;
            if now > self.window.next_start_fade {
                self.recompute(config, now);
            }
        }

        if was_night != self.is_night {
            info!("NightMode: {}", if self.is_night { "entering night window" } else { "leaving night window" });
            Some(self.is_night)
        } else {
            None
        }
    }

    fn recompute(&mut self, config: &NightModeConfig, now: u64) {
        let today_midnight = now - now % SECS_PER_DAY;
        self.window = NightWindow::compute(config, now, today_midnight);
        self.dirty = false;
        info!(
            "NightMode: window start_fade={} start={} end={} end_fade={}",
            self.window.next_start_fade,
            self.window.next_start,
            self.window.next_end,
            self.window.next_end_fade
        );
    }

    /// Whether night mode is enabled and the light is inside the window.
    pub fn is_night_time(&self, config: &NightModeConfig) -> bool {
        config.enabled != 0 && self.is_night
    }

    pub fn fade_factor(&self) -> f32 {
        self.fade_factor
    }

    pub fn window(&self) -> NightWindow {
        self.window
    }

    /// `normal` blended toward the night brightness by the fade factor;
    /// `normal` unchanged outside the window.
    pub fn current_brightness(&self, normal: u16, config: &NightModeConfig) -> u16 {
        if self.is_night_time(config) {
            smooth16(normal, config.brightness, self.fade_factor)
        } else {
            normal
        }
    }
}
