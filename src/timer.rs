//! Deadline timers polled from the main tick.
//!
//! Components own their timers instead of registering callbacks, so a
//! timer can never outlive or alias the state it acts on.  Each tick the
//! owner asks whether the deadline has passed.
//!
//! ```text
//!   arm(now, 60 s) ──▶ [ deadline = now + 60 s ] ──poll(now')──▶ fired?
//!        ▲                       │
//!        └──── re-arm replaces ──┘   cancel() ──▶ idle
//! ```

/// A single-shot deadline.  Re-arming replaces the previous deadline,
/// so at most one is ever outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OneShot {
    deadline: Option<u64>,
}

impl OneShot {
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Fire `interval_ms` after `now_ms`, cancelling any pending deadline.
    pub fn arm(&mut self, now_ms: u64, interval_ms: u64) {
        self.deadline = Some(now_ms.saturating_add(interval_ms));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Returns `true` exactly once when the deadline has been reached,
    /// disarming the timer.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// A repeating period.  The first poll always fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interval {
    last: Option<u64>,
}

impl Interval {
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Returns `true` when at least `period_ms` has passed since the last
    /// firing, and records `now_ms` as the new reference.
    pub fn poll(&mut self, now_ms: u64, period_ms: u64) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= period_ms,
        };
        if due {
            self.last = Some(now_ms);
        }
        due
    }

    /// Make the next poll fire regardless of the period.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
