//! End-to-end orchestration tests: `NodeService` wired to mock hardware.
//!
//! The rig uses a 2 s stabilization, the 7 s minimum pulse and the default
//! 60 s preheat / 500 ms cadence.

use airnode::app::events::NodeEvent;
use airnode::calibration::CalPhase;
use airnode::error::SensorError;
use airnode::sensors::ReadinessState;

use crate::mock_hw::{Co2Reply, MockBaro, Rig};

fn telemetry_count(rig: &Rig) -> usize {
    rig.sink
        .count(|e| matches!(e, NodeEvent::Telemetry(_)))
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_enters_preheating_with_fan_off() {
    let mut rig = Rig::new();
    rig.start();
    assert_eq!(
        rig.sink.events,
        vec![NodeEvent::Started(ReadinessState::Preheating)]
    );
    assert_eq!(rig.node.readiness(), ReadinessState::Preheating);
    assert!(!rig.fan_pin.is_high());
    assert!(rig.cal_pin.is_high());
}

// ── Cadence ───────────────────────────────────────────────────

#[test]
fn sensing_runs_on_the_telemetry_cadence() {
    let mut rig = Rig::new();
    rig.start();

    rig.tick_at(0);
    rig.tick_at(499);
    assert_eq!(telemetry_count(&rig), 0);

    rig.tick_at(500);
    assert_eq!(telemetry_count(&rig), 1);

    rig.tick_at(700);
    rig.tick_at(999);
    assert_eq!(telemetry_count(&rig), 1);

    rig.tick_at(1_000);
    assert_eq!(telemetry_count(&rig), 2);
    assert_eq!(rig.node.tick_count(), 6);
}

#[test]
fn snapshots_are_pushed_only_to_a_connected_peer() {
    let mut rig = Rig::new();
    rig.transport.connected = false;
    rig.start();

    rig.tick_at(500);
    assert!(rig.transport.pushed.is_empty());
    assert_eq!(telemetry_count(&rig), 1);

    rig.transport.connected = true;
    rig.tick_at(1_000);
    assert_eq!(rig.transport.pushed.len(), 1);
}

#[test]
fn snapshot_carries_readings_and_state() {
    let mut rig = Rig::new();
    rig.start();
    rig.tick_at(500);

    let snap = rig.transport.pushed[0];
    assert_eq!(snap.reading.temperature_c, 22.5);
    assert_eq!(snap.reading.humidity_pct, 45.0);
    assert!((snap.reading.pressure_hpa - 1013.25).abs() < 1e-3);
    assert_eq!(snap.reading.co2_ppm, 400);
    assert_eq!(snap.readiness, ReadinessState::Preheating);
    assert!(!snap.fan_on);
    assert_eq!(snap.state_attr(), "PREHEATING");
    assert_eq!(snap.pressure_attr().as_str(), "1013.25");
}

#[test]
fn failed_sensors_publish_sentinels() {
    let mut rig = Rig::with(Rig::test_config(), MockBaro::absent());
    rig.climate.set(Err(SensorError::Checksum));
    rig.co2.set_reply(Co2Reply::Silent);
    rig.start();
    rig.tick_at(500);

    let snap = rig.transport.pushed[0];
    assert_eq!(snap.temperature_attr().as_str(), "-1.00");
    assert_eq!(snap.humidity_attr().as_str(), "-1.00");
    assert_eq!(snap.pressure_attr().as_str(), "-1.00");
    assert_eq!(snap.co2_attr().as_str(), "-1");
}

// ── Preheat ───────────────────────────────────────────────────

#[test]
fn preheat_completion_is_reported_once() {
    let mut rig = Rig::new();
    rig.start();
    for t in (500..=62_000).step_by(500) {
        rig.tick_at(t);
    }

    let ready = rig.sink.count(|e| {
        *e == NodeEvent::ReadinessChanged {
            from: ReadinessState::Preheating,
            to: ReadinessState::Ready,
        }
    });
    assert_eq!(ready, 1);
    assert_eq!(rig.sink.count(|e| *e == NodeEvent::FanChanged(true)), 1);
    assert_eq!(rig.node.readiness(), ReadinessState::Ready);
    assert!(rig.fan_pin.is_high());
}

// ── Calibration ───────────────────────────────────────────────

#[test]
fn start_cal_runs_the_full_sequence_and_restores_ready_once() {
    let mut rig = Rig::new();
    rig.start();

    rig.transport.write_command("START_CAL");
    rig.tick_at(1_000);
    assert!(rig.sink.events.contains(&NodeEvent::CalibrationStarted));
    assert_eq!(rig.node.readiness(), ReadinessState::Calibrating);
    assert_eq!(rig.node.calibration_phase(), CalPhase::Stabilizing);

    rig.tick_at(2_999);
    assert_eq!(rig.node.calibration_phase(), CalPhase::Stabilizing);
    rig.tick_at(3_000);
    assert_eq!(rig.node.calibration_phase(), CalPhase::Pulsing);
    assert_eq!(rig.cal_pin.level(), Some(false));

    rig.tick_at(9_999);
    assert_eq!(rig.node.calibration_phase(), CalPhase::Pulsing);
    rig.tick_at(10_000);
    assert_eq!(rig.node.calibration_phase(), CalPhase::Idle);
    assert!(rig.cal_pin.is_high());
    assert_eq!(rig.node.readiness(), ReadinessState::Ready);

    for t in (10_500..=20_000).step_by(500) {
        rig.tick_at(t);
    }
    assert_eq!(
        rig.sink.count(|e| *e == NodeEvent::CalibrationFinished),
        1
    );
    assert_eq!(
        rig.sink.count(|e| {
            *e == NodeEvent::ReadinessChanged {
                from: ReadinessState::Calibrating,
                to: ReadinessState::Ready,
            }
        }),
        1
    );
}

#[test]
fn no_sensing_while_calibrating() {
    let mut rig = Rig::new();
    rig.start();
    rig.transport.write_command("START_CAL");
    rig.tick_at(1_000);
    rig.sink.clear();
    let sends_before = rig.co2.sent().len();

    for t in (1_500..=9_500).step_by(500) {
        rig.tick_at(t);
    }
    assert_eq!(telemetry_count(&rig), 0);
    assert_eq!(rig.co2.sent().len(), sends_before);

    // Sensing resumes on the tick the sequence finishes.
    rig.tick_at(10_000);
    assert_eq!(telemetry_count(&rig), 1);
}

#[test]
fn second_start_cal_is_rejected_without_side_effects() {
    let mut rig = Rig::new();
    rig.start();
    rig.transport.write_command("START_CAL");
    rig.tick_at(1_000);

    rig.transport.write_command("START_CAL");
    rig.tick_at(1_500);
    assert!(
        rig.sink
            .events
            .contains(&NodeEvent::CalibrationRejected(CalPhase::Stabilizing))
    );
    assert_eq!(rig.node.calibration_phase(), CalPhase::Stabilizing);

    // Timing still runs from the first request.
    rig.tick_at(3_000);
    assert_eq!(rig.node.calibration_phase(), CalPhase::Pulsing);
}

#[test]
fn unknown_commands_are_ignored() {
    let mut rig = Rig::new();
    rig.start();
    rig.transport.write_command("start_cal");
    rig.tick_at(100);
    assert_eq!(rig.node.calibration_phase(), CalPhase::Idle);
    assert_eq!(rig.node.readiness(), ReadinessState::Preheating);

    let mut raw = heapless::String::<32>::new();
    raw.push_str("start_cal").unwrap();
    assert!(rig.sink.events.contains(&NodeEvent::CommandIgnored(raw)));
}

// ── Fan toggle ────────────────────────────────────────────────

#[test]
fn fan_toggle_flips_and_two_toggles_restore() {
    let mut rig = Rig::new();
    rig.start();

    rig.transport.fan_toggle = true;
    rig.tick_at(100);
    assert!(rig.node.fan_state());
    assert!(rig.fan_pin.is_high());
    assert!(rig.sink.events.contains(&NodeEvent::FanChanged(true)));

    rig.transport.fan_toggle = true;
    rig.tick_at(200);
    assert!(!rig.node.fan_state());
    assert!(!rig.fan_pin.is_high());
}

#[test]
fn each_fan_change_is_reported_once() {
    let mut rig = Rig::new();
    rig.start();

    rig.transport.fan_toggle = true;
    rig.tick_at(100);
    assert_eq!(rig.sink.count(|e| matches!(e, NodeEvent::FanChanged(_))), 1);

    // Preheat completion switches the fan on again: already on, no event.
    for t in (500..=60_500).step_by(500) {
        rig.tick_at(t);
    }
    assert_eq!(rig.node.readiness(), ReadinessState::Ready);
    assert_eq!(rig.sink.count(|e| matches!(e, NodeEvent::FanChanged(_))), 1);
}

#[test]
fn fan_toggle_is_honoured_during_calibration() {
    let mut rig = Rig::new();
    rig.start();
    rig.transport.write_command("START_CAL");
    rig.tick_at(1_000);

    rig.transport.fan_toggle = true;
    rig.tick_at(1_100);
    assert!(rig.node.fan_state());
    assert!(rig.node.is_calibrating());
}

#[test]
fn snapshot_reports_fan_toggled_by_client() {
    let mut rig = Rig::new();
    rig.start();
    rig.transport.fan_toggle = true;
    rig.tick_at(500);
    let snap = rig.transport.pushed[0];
    assert!(snap.fan_on);
    assert_eq!(snap.fan_attr(), "ON");
}
