//! Output drivers, hardware initialisation, and waveform helpers.

pub mod hw_init;
pub mod led_output;
pub mod waveform;
