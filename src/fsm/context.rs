//! Shared mutable context threaded through every calibration handler.
//!
//! `CalContext` is the "blackboard" the phase handlers read from and write
//! to: the current time, when the active phase was entered, the configured
//! durations, and the requested level of the calibration pin.  The owner
//! applies `pin_asserted` to the real GPIO after each tick.

/// The shared context passed to every phase handler function.
#[derive(Debug, Clone)]
pub struct CalContext {
    // -- Timing --
    /// Wall-clock time of the current tick (ms since boot).
    pub now_ms: u64,
    /// Time the active phase was entered.
    pub entered_at_ms: u64,
    /// Last time a stabilization progress line was logged.
    pub last_progress_log_ms: u64,

    // -- Configuration --
    pub stabilization_ms: u32,
    pub pulse_ms: u32,
    pub progress_log_ms: u32,

    // -- Output --
    /// `true` while the calibration line must be held at its active level.
    pub pin_asserted: bool,
}

impl CalContext {
    pub fn new(stabilization_ms: u32, pulse_ms: u32, progress_log_ms: u32) -> Self {
        Self {
            now_ms: 0,
            entered_at_ms: 0,
            last_progress_log_ms: 0,
            stabilization_ms,
            pulse_ms,
            progress_log_ms,
            pin_asserted: false,
        }
    }

    /// Milliseconds spent in the active phase.
    pub fn elapsed_ms(&self) -> u64 {
        self.now_ms.saturating_sub(self.entered_at_ms)
    }
}
