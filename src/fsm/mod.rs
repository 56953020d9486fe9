//! Function-pointer finite state machine engine.
//!
//! Drives the power/brightness animation:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌────────────────┬───────────┬──────────┬───────────────────┐│
//! │  │ StateId        │ on_enter  │ on_exit  │ on_update         ││
//! │  ├────────────────┼───────────┼──────────┼───────────────────┤│
//! │  │ Uninitialized  │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> ││
//! │  │ Initialization │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> ││
//! │  │ TurningOn      │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> ││
//! │  │ TurningOff     │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> ││
//! │  │ StandBy        │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> ││
//! │  └────────────────┴───────────┴──────────┴───────────────────┘│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine stamps the current time into the context, then
//! calls `on_update` for the **current** state.  If it returns
//! `Some(next_id)`, the engine runs `on_exit` for the current state,
//! records the entry time, and runs `on_enter` for the next.
//!
//! Handlers compute their output from the time elapsed since entry, so
//! a late or skipped tick catches up on the next call instead of
//! accumulating drift.

pub mod context;
pub mod states;

use context::AnimationContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all animation states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Uninitialized = 0,
    Initialization = 1,
    TurningOn = 2,
    TurningOff = 3,
    StandBy = 4,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 5;

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `StandBy` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Uninitialized,
            1 => Self::Initialization,
            2 => Self::TurningOn,
            3 => Self::TurningOff,
            4 => Self::StandBy,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::StandBy
            }
        }
    }

    /// States that animate toward a power target.
    pub fn is_transition(self) -> bool {
        matches!(self, Self::TurningOn | Self::TurningOff)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut AnimationContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut AnimationContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Time (ms) at which the current state was entered.
    state_entry_ms: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            state_entry_ms: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state at `ctx.now_ms`.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut AnimationContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        self.state_entry_ms = ctx.now_ms;
        ctx.elapsed_ms = 0;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM to `now_ms`.
    ///
    /// 1. Stamp `now_ms` and the time spent in the current state.
    /// 2. Call `on_update` for the current state.
    /// 3. If it returns `Some(next)`, execute the transition.
    pub fn tick(&mut self, now_ms: u64, ctx: &mut AnimationContext) {
        ctx.now_ms = now_ms;
        ctx.elapsed_ms = now_ms.saturating_sub(self.state_entry_ms);

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition at `ctx.now_ms` (power toggles).
    pub fn force_transition(&mut self, next: StateId, ctx: &mut AnimationContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn state_entry_ms(&self) -> u64 {
        self.state_entry_ms
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut AnimationContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_ms = ctx.now_ms;
        ctx.elapsed_ms = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
