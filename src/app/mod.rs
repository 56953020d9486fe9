//! Application core: pure domain logic, zero I/O.
//!
//! This module holds the rules of the light: power and brightness
//! orchestration over the animation FSM, night-mode dimming, debounced
//! persistence, and change notification.  All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this layer
//! fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
