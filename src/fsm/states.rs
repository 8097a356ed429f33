//! Concrete phase handler functions and table builder.
//!
//! ```text
//!  IDLE ──[start]──▶ STABILIZING ──[stabilization elapsed]──▶ PULSING
//!    ▲                                                          │
//!    └──────────────────[pulse elapsed, pin released]───────────┘
//! ```
//!
//! The `start` edge is external (`Fsm::force_transition`); the other two are
//! purely time-driven.

use super::context::CalContext;
use super::{CalPhase, StateDescriptor};
use log::info;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static phase table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; CalPhase::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: CalPhase::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: Stabilizing
        StateDescriptor {
            id: CalPhase::Stabilizing,
            name: "Stabilizing",
            on_enter: Some(stabilizing_enter),
            on_exit: None,
            on_update: stabilizing_update,
        },
        // Index 2: Pulsing
        StateDescriptor {
            id: CalPhase::Pulsing,
            name: "Pulsing",
            on_enter: Some(pulsing_enter),
            on_exit: Some(pulsing_exit),
            on_update: pulsing_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut CalContext) {
    ctx.pin_asserted = false;
}

fn idle_update(_ctx: &mut CalContext) -> Option<CalPhase> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  STABILIZING: sensor sits in fresh air before the zero point is taken
// ═══════════════════════════════════════════════════════════════════════════

fn stabilizing_enter(ctx: &mut CalContext) {
    ctx.last_progress_log_ms = ctx.now_ms;
    info!(
        "CAL: stabilizing in fresh air for {}s",
        ctx.stabilization_ms / 1000
    );
}

fn stabilizing_update(ctx: &mut CalContext) -> Option<CalPhase> {
    let elapsed = ctx.elapsed_ms();
    let target = u64::from(ctx.stabilization_ms);

    if elapsed >= target {
        return Some(CalPhase::Pulsing);
    }

    if ctx.now_ms.saturating_sub(ctx.last_progress_log_ms) >= u64::from(ctx.progress_log_ms) {
        ctx.last_progress_log_ms = ctx.now_ms;
        info!("CAL: {}s remaining", (target - elapsed) / 1000);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  PULSING: calibration line held at its active level
// ═══════════════════════════════════════════════════════════════════════════

fn pulsing_enter(ctx: &mut CalContext) {
    ctx.pin_asserted = true;
    info!("CAL: zero-point pulse for {} ms", ctx.pulse_ms);
}

fn pulsing_exit(ctx: &mut CalContext) {
    ctx.pin_asserted = false;
    info!("CAL: pulse complete, calibration line released");
}

fn pulsing_update(ctx: &mut CalContext) -> Option<CalPhase> {
    if ctx.elapsed_ms() >= u64::from(ctx.pulse_ms) {
        return Some(CalPhase::Idle);
    }
    None
}
