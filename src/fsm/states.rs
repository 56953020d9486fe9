//! Concrete state handler functions and table builder.
//!
//! ```text
//!  UNINITIALIZED ──[boot]──▶ INITIALIZATION ──[network ready, on]──▶ TURNING_ON
//!                                  │                                     │
//!                         [network ready, off]                   [fade done]
//!                                  ▼                                     ▼
//!                              STAND_BY ◀────────[fade done]──────── TURNING_OFF
//!                                  │                                     ▲
//!                                  └──────────[power toggled]────────────┘
//! ```
//!
//! Power toggles are forced from outside via
//! [`Fsm::force_transition`](super::Fsm::force_transition); the handlers
//! only decide when a fade has finished.

use super::context::AnimationContext;
use super::{StateDescriptor, StateId};
use crate::config::PWM_MAX_VALUE;
use crate::drivers::waveform::{cubic_wave16, ease_in_out_cubic, map16, smooth16};
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Uninitialized,
            name: "Uninitialized",
            on_enter: None,
            on_exit: None,
            on_update: uninitialized_update,
        },
        StateDescriptor {
            id: StateId::Initialization,
            name: "Initialization",
            on_enter: Some(initialization_enter),
            on_exit: None,
            on_update: initialization_update,
        },
        StateDescriptor {
            id: StateId::TurningOn,
            name: "TurningOn",
            on_enter: Some(fade_enter),
            on_exit: None,
            on_update: turning_on_update,
        },
        StateDescriptor {
            id: StateId::TurningOff,
            name: "TurningOff",
            on_enter: Some(fade_enter),
            on_exit: None,
            on_update: turning_off_update,
        },
        StateDescriptor {
            id: StateId::StandBy,
            name: "StandBy",
            on_enter: Some(standby_enter),
            on_exit: None,
            on_update: standby_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  UNINITIALIZED
// ═══════════════════════════════════════════════════════════════════════════

fn uninitialized_update(ctx: &mut AnimationContext) -> Option<StateId> {
    ctx.output = 0;
    Some(StateId::Initialization)
}

// ═══════════════════════════════════════════════════════════════════════════
//  INITIALIZATION: pulse while the network comes up
// ═══════════════════════════════════════════════════════════════════════════

fn initialization_enter(ctx: &mut AnimationContext) {
    info!(
        "INITIALIZATION: waiting for network, power {}",
        if ctx.power_on { "on" } else { "off" }
    );
}

fn initialization_update(ctx: &mut AnimationContext) -> Option<StateId> {
    if ctx.network_ready {
        return Some(if ctx.power_on {
            StateId::TurningOn
        } else {
            StateId::StandBy
        });
    }

    ctx.output = if ctx.power_on { pulse(ctx) } else { 0 };
    None
}

/// Eased triangular pulse over `flash_period_ms`, scaled to the target.
fn pulse(ctx: &AnimationContext) -> u16 {
    let period = u64::from(ctx.flash_period_ms.max(1));
    let phase = (ctx.elapsed_ms % period) as u32;
    let scaled = map16(phase, period as u32, u32::from(PWM_MAX_VALUE)) as u16;
    let wave = cubic_wave16(scaled, PWM_MAX_VALUE);
    map16(u32::from(wave), u32::from(PWM_MAX_VALUE), u32::from(ctx.target)) as u16
}

// ═══════════════════════════════════════════════════════════════════════════
//  TURNING_ON / TURNING_OFF: eased fade over power_change_timeout
// ═══════════════════════════════════════════════════════════════════════════

/// A fade starts wherever the output is, so reversing power mid-fade
/// never jumps.
fn fade_enter(ctx: &mut AnimationContext) {
    ctx.fade_from = ctx.output;
    debug!("FADE: from {} over {} ms", ctx.fade_from, ctx.power_change_timeout_ms);
}

fn turning_on_update(ctx: &mut AnimationContext) -> Option<StateId> {
    let progress = ctx.fade_progress();
    if progress >= 1.0 {
        ctx.output = ctx.target;
        return Some(StateId::StandBy);
    }
    ctx.output = smooth16(ctx.fade_from, ctx.target, ease_in_out_cubic(progress));
    None
}

fn turning_off_update(ctx: &mut AnimationContext) -> Option<StateId> {
    let progress = ctx.fade_progress();
    if progress >= 1.0 {
        ctx.output = 0;
        return Some(StateId::StandBy);
    }
    ctx.output = smooth16(ctx.fade_from, 0, ease_in_out_cubic(progress));
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  STAND_BY: steady state
// ═══════════════════════════════════════════════════════════════════════════

fn standby_enter(ctx: &mut AnimationContext) {
    debug!("STAND_BY: output {}", ctx.output);
}

fn standby_update(ctx: &mut AnimationContext) -> Option<StateId> {
    ctx.output = if ctx.power_on { ctx.target } else { 0 };
    None
}
