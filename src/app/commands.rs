//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (button,
//! network stack, maintenance hooks) that the
//! [`LightService`](super::service::LightService) interprets and acts upon.
//! Parameter writes from the network do not go through here; they use the
//! registry-driven dispatch path.

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Switch the light on or off.
    SetPower(bool),

    /// Invert the power state (button press).
    TogglePower,

    /// The network stack is up; leave the boot pulse.
    NetworkReady,

    /// Persist pending changes and restart after the restart delay.
    Restart,

    /// Restore compiled-in defaults, persist, and restart.
    FactoryReset,
}
