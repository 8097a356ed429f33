//! Calibration sequencer driven through its public API with a recording pin.

use airnode::calibration::{CalPhase, CalibrationSequencer};
use airnode::config::NodeConfig;

use crate::mock_hw::MockPin;

const STAB: u64 = 2_000;
const PULSE: u64 = 7_000;

fn sequencer() -> (CalibrationSequencer<MockPin>, MockPin) {
    let config = NodeConfig {
        stabilization_ms: STAB as u32,
        pulse_ms: PULSE as u32,
        ..NodeConfig::default()
    };
    let pin = MockPin::new();
    (CalibrationSequencer::new(pin.clone(), &config), pin)
}

#[test]
fn line_idles_high_after_construction() {
    let (seq, pin) = sequencer();
    assert_eq!(seq.phase(), CalPhase::Idle);
    assert!(!seq.is_calibrating());
    assert!(pin.is_high());
}

#[test]
fn full_cycle_boundaries() {
    let (mut seq, pin) = sequencer();
    let t0 = 1_000;
    assert!(seq.start_calibration(t0));
    assert_eq!(seq.phase(), CalPhase::Stabilizing);

    seq.run(t0 + STAB - 1);
    assert_eq!(seq.phase(), CalPhase::Stabilizing);
    assert!(pin.is_high());

    seq.run(t0 + STAB);
    assert_eq!(seq.phase(), CalPhase::Pulsing);
    assert_eq!(pin.level(), Some(false));

    seq.run(t0 + STAB + PULSE - 1);
    assert_eq!(seq.phase(), CalPhase::Pulsing);
    assert_eq!(pin.level(), Some(false));

    seq.run(t0 + STAB + PULSE);
    assert_eq!(seq.phase(), CalPhase::Idle);
    assert!(pin.is_high());
}

#[test]
fn start_while_busy_keeps_phase_and_timestamp() {
    let (mut seq, _pin) = sequencer();
    assert!(seq.start_calibration(500));
    assert!(!seq.start_calibration(900));
    assert_eq!(seq.phase(), CalPhase::Stabilizing);
    assert_eq!(seq.phase_started_at(), 500);

    seq.run(500 + STAB);
    assert!(!seq.start_calibration(500 + STAB + 10));
    assert_eq!(seq.phase(), CalPhase::Pulsing);
    assert_eq!(seq.phase_started_at(), 500 + STAB);
}

#[test]
fn pulse_is_timed_from_entry_even_with_coarse_ticks() {
    let (mut seq, pin) = sequencer();
    seq.start_calibration(0);

    // One very late tick: the pulse starts now, it is not shortened.
    let late = STAB + 60_000;
    seq.run(late);
    assert_eq!(seq.phase(), CalPhase::Pulsing);
    assert_eq!(seq.phase_started_at(), late);

    seq.run(late + PULSE - 1);
    assert_eq!(seq.phase(), CalPhase::Pulsing);
    assert_eq!(pin.level(), Some(false));
    seq.run(late + PULSE);
    assert_eq!(seq.phase(), CalPhase::Idle);
}

#[test]
fn short_configured_pulse_is_raised_to_hardware_minimum() {
    let config = NodeConfig {
        pulse_ms: 1_000,
        ..NodeConfig::default()
    };
    let seq = CalibrationSequencer::new(MockPin::new(), &config);
    assert_eq!(seq.pulse_ms(), 7_000);
}

#[test]
fn sequence_can_run_again_after_finishing() {
    let (mut seq, pin) = sequencer();
    seq.start_calibration(0);
    seq.run(STAB);
    seq.run(STAB + PULSE);
    assert_eq!(seq.phase(), CalPhase::Idle);

    let t1 = 100_000;
    assert!(seq.start_calibration(t1));
    assert_eq!(seq.phase_started_at(), t1);
    seq.run(t1 + STAB);
    assert_eq!(pin.level(), Some(false));
}

#[test]
fn pin_is_only_low_while_pulsing() {
    let (mut seq, pin) = sequencer();
    seq.start_calibration(0);
    for t in (0..=STAB + PULSE + 1_000).step_by(250) {
        seq.run(t);
        let pulsing = seq.phase() == CalPhase::Pulsing;
        assert_eq!(pin.level(), Some(!pulsing), "t={t}");
    }
}
