//! CO2 zero-point calibration sequencer.
//!
//! Wraps the phase [`Fsm`] and owns the sensor's HD (calibration) line.
//! The line idles HIGH; the sensor latches a new 400 ppm baseline when it
//! is held LOW for at least [`MIN_PULSE_MS`].
//!
//! The sequencer never blocks: [`run`](CalibrationSequencer::run) is called
//! once per control tick and only compares timestamps.

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::config::{MIN_PULSE_MS, NodeConfig};
pub use crate::fsm::CalPhase;
use crate::fsm::context::CalContext;
use crate::fsm::states::build_state_table;
use crate::fsm::Fsm;

pub struct CalibrationSequencer<P: OutputPin> {
    fsm: Fsm,
    ctx: CalContext,
    pin: P,
}

impl<P: OutputPin> CalibrationSequencer<P> {
    /// Take ownership of the calibration line and drive it inactive.
    pub fn new(pin: P, config: &NodeConfig) -> Self {
        let pulse_ms = if config.pulse_ms < MIN_PULSE_MS {
            warn!(
                "CAL: pulse {} ms below sensor minimum, using {} ms",
                config.pulse_ms, MIN_PULSE_MS
            );
            MIN_PULSE_MS
        } else {
            config.pulse_ms
        };

        let mut ctx = CalContext::new(
            config.stabilization_ms,
            pulse_ms,
            config.calibration_progress_log_ms,
        );
        let mut fsm = Fsm::new(build_state_table(), CalPhase::Idle);
        fsm.start(&mut ctx);

        let mut seq = Self { fsm, ctx, pin };
        seq.apply_pin();
        seq
    }

    /// Begin a calibration cycle.  Only accepted from `Idle`; returns
    /// whether the request was taken.
    pub fn start_calibration(&mut self, now_ms: u64) -> bool {
        if self.fsm.current_state() != CalPhase::Idle {
            info!(
                "CAL: start ignored, already {:?}",
                self.fsm.current_state()
            );
            return false;
        }
        self.ctx.now_ms = now_ms;
        self.fsm.force_transition(CalPhase::Stabilizing, &mut self.ctx);
        self.apply_pin();
        true
    }

    /// Advance the sequence.  Call every tick, calibrating or not.
    pub fn run(&mut self, now_ms: u64) {
        self.ctx.now_ms = now_ms;
        self.fsm.tick(&mut self.ctx);
        self.apply_pin();
    }

    pub fn is_calibrating(&self) -> bool {
        self.fsm.current_state() != CalPhase::Idle
    }

    pub fn phase(&self) -> CalPhase {
        self.fsm.current_state()
    }

    /// Time the current phase was entered.
    pub fn phase_started_at(&self) -> u64 {
        self.ctx.entered_at_ms
    }

    /// Effective pulse length after the hardware floor was applied.
    pub fn pulse_ms(&self) -> u32 {
        self.ctx.pulse_ms
    }

    // Active level is LOW.  A failed write is logged and the sequence keeps
    // its timing; the next tick re-drives the level.
    fn apply_pin(&mut self) {
        let result = if self.ctx.pin_asserted {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
        if result.is_err() {
            warn!("CAL: calibration pin write failed");
        }
    }
}
