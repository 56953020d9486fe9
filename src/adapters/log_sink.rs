//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::PowerChanged(on) => {
                info!("POWER | {}", if *on { "on" } else { "off" });
            }
            AppEvent::NightModeChanged(active) => {
                info!("NIGHT | {}", if *active { "entered" } else { "left" });
            }
            AppEvent::ConfigCommitted => {
                info!("STORE | config committed");
            }
            AppEvent::RestartScheduled { delay_ms } => {
                info!("RESET | restarting in {} ms", delay_ms);
            }
        }
    }
}
