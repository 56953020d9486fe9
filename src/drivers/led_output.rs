//! Brightness sinks.
//!
//! [`PwmOutput`] drives any `embedded-hal` PWM channel (the LEDC driver on
//! target) by mapping `0..=PWM_MAX_VALUE` onto the channel's duty range.
//! [`MemoryOutput`] keeps the last value for simulation and tests.

use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::ports::BrightnessSink;
use crate::config::PWM_MAX_VALUE;

/// PWM-backed brightness sink.
pub struct PwmOutput<P: SetDutyCycle> {
    channel: P,
    last: Option<u16>,
}

impl<P: SetDutyCycle> PwmOutput<P> {
    pub fn new(channel: P) -> Self {
        Self { channel, last: None }
    }

    pub fn last(&self) -> Option<u16> {
        self.last
    }

    pub fn into_inner(self) -> P {
        self.channel
    }
}

impl<P: SetDutyCycle> BrightnessSink for PwmOutput<P> {
    fn set_brightness(&mut self, value: u16) {
        let value = value.min(PWM_MAX_VALUE);
        match self.channel.set_duty_cycle_fraction(value, PWM_MAX_VALUE) {
            Ok(()) => self.last = Some(value),
            Err(e) => warn!("LED: duty update failed: {:?}", e),
        }
    }
}

/// In-memory sink for simulation.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    pub value: u16,
    pub writes: usize,
}

impl BrightnessSink for MemoryOutput {
    fn set_brightness(&mut self, value: u16) {
        self.value = value;
        self.writes += 1;
    }
}
