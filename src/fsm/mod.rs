//! Function-pointer finite state machine engine for the calibration sequence.
//!
//! Classic table-driven embedded FSM:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌─────────────┬───────────┬──────────┬───────────────────┐  │
//! │  │ CalPhase    │ on_enter  │ on_exit  │ on_update         │  │
//! │  ├─────────────┼───────────┼──────────┼───────────────────┤  │
//! │  │ Idle        │ fn(ctx)   │ -        │ fn(ctx)->Option<> │  │
//! │  │ Stabilizing │ fn(ctx)   │ -        │ fn(ctx)->Option<> │  │
//! │  │ Pulsing     │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  └─────────────┴───────────┴──────────┴───────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transitions are driven by wall-clock time, not tick counts: the caller
//! stamps `ctx.now_ms` before every [`Fsm::tick`], and the engine records
//! `ctx.entered_at_ms` on each transition.  Handlers compare the two, so
//! coarse or irregular ticks can delay a transition but never advance it.

pub mod context;
pub mod states;

use context::CalContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Phases of the zero-point calibration sequence.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CalPhase {
    Idle = 0,
    Stabilizing = 1,
    Pulsing = 2,
}

impl CalPhase {
    /// Total number of phases: used to size the table array.
    pub const COUNT: usize = 3;

    /// Convert an index back to `CalPhase`.  Out-of-range asserts in debug
    /// builds and falls back to `Idle` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Stabilizing,
            2 => Self::Pulsing,
            _ => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut CalContext);

/// Per-tick update handler.  Returns `Some(next)` to trigger a transition.
pub type StateUpdateFn = fn(&mut CalContext) -> Option<CalPhase>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single phase.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: CalPhase,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// Owns the state table and the index of the active phase.  The mutable
/// [`CalContext`] lives with the caller and is threaded through every
/// handler call.
pub struct Fsm {
    table: [StateDescriptor; CalPhase::COUNT],
    current: usize,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; CalPhase::COUNT], initial: CalPhase) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting phase.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut CalContext) {
        info!("CAL FSM starting in phase: {}", self.table[self.current].name);
        ctx.entered_at_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Call `on_update` for the current phase and perform the transition it
    /// asks for, if any.  `ctx.now_ms` must already hold the current time.
    pub fn tick(&mut self, ctx: &mut CalContext) {
        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Jump to `next` immediately (external trigger).  No-op when already
    /// there.
    pub fn force_transition(&mut self, next: CalPhase, ctx: &mut CalContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> CalPhase {
        CalPhase::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: CalPhase, ctx: &mut CalContext) {
        let next_idx = next_id as usize;

        info!(
            "CAL FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        ctx.entered_at_ms = ctx.now_ms;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
