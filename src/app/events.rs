//! Outbound application events.
//!
//! The [`LightService`](super::service::LightService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them; the firmware logs them to the
//! serial console.

use crate::fsm::StateId;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries the initial animation state).
    Started(StateId),

    /// The animation state machine moved between states.
    StateChanged { from: StateId, to: StateId },

    /// The power intent changed.
    PowerChanged(bool),

    /// The light entered or left the night window.
    NightModeChanged(bool),

    /// The config record was written to storage.
    ConfigCommitted,

    /// A restart was requested and will happen after the delay.
    RestartScheduled { delay_ms: u64 },
}
