//! Shared mutable context threaded through every FSM handler.
//!
//! The service fills in the inputs (power intent, network readiness,
//! target brightness) before each tick; handlers write `output`, which
//! the service then pushes to the brightness sink.

// ---------------------------------------------------------------------------
// AnimationContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
#[derive(Debug, Clone)]
pub struct AnimationContext {
    // -- Timing (stamped by the engine) --
    /// Time of the current tick (ms).
    pub now_ms: u64,
    /// Milliseconds since the current state was entered.
    pub elapsed_ms: u64,

    // -- Inputs --
    /// Power intent from the config.
    pub power_on: bool,
    /// Set once the network stack reports readiness.
    pub network_ready: bool,
    /// Brightness the light should settle at when on (night-blended, clamped).
    pub target: u16,
    /// Duration of a power on/off fade.
    pub power_change_timeout_ms: u32,
    /// Period of the boot pulse while waiting for the network.
    pub flash_period_ms: u32,

    // -- Output --
    /// Brightness to apply after this tick.
    pub output: u16,
    /// Output when the current power fade began.
    pub fade_from: u16,
}

impl AnimationContext {
    pub fn new(power_change_timeout_ms: u32, flash_period_ms: u32) -> Self {
        Self {
            now_ms: 0,
            elapsed_ms: 0,
            power_on: false,
            network_ready: false,
            target: 0,
            power_change_timeout_ms,
            flash_period_ms,
            output: 0,
            fade_from: 0,
        }
    }

    /// Fraction of the power fade elapsed, clamped to `[0, 1]`.
    pub fn fade_progress(&self) -> f32 {
        if self.power_change_timeout_ms == 0 {
            return 1.0;
        }
        (self.elapsed_ms as f32 / self.power_change_timeout_ms as f32).clamp(0.0, 1.0)
    }
}
