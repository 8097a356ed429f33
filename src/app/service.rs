//! Node service: the hexagonal core.
//!
//! [`NodeService`] owns the sensing coordinator and the calibration
//! sequencer and runs one cooperative control tick at a time.  The
//! transport, clock and event sink are injected at call sites, so the whole
//! service runs on the host against mocks.
//!
//! ```text
//!  TransportPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                    │         NodeService           │
//!     ClockPort  ──▶ │ Calibration · Sensing · Fan   │ ──▶ TransportPort
//!                    └──────────────────────────────┘      (snapshots)
//! ```
//!
//! Tick order is fixed: command intake → sequencer → calibration-end edge
//! → fan toggle → (cadence permitting) sensing and telemetry.

use embedded_hal::digital::OutputPin;
use log::{debug, info};

use crate::calibration::{CalPhase, CalibrationSequencer};
use crate::config::NodeConfig;
use crate::sensors::{ReadinessState, SensingCoordinator};

use super::commands::NodeCommand;
use super::events::{NodeEvent, TelemetrySnapshot};
use super::ports::{ClimateSensor, ClockPort, Co2Link, EventSink, PressureSensor, TransportPort};

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService<T, B, L, F, C>
where
    T: ClimateSensor,
    B: PressureSensor,
    L: Co2Link,
    F: OutputPin,
    C: OutputPin,
{
    sensing: SensingCoordinator<T, B, L, F>,
    calibration: CalibrationSequencer<C>,
    telemetry_interval_ms: u32,
    last_cycle_ms: u64,
    was_calibrating: bool,
    tick_count: u64,
}

impl<T, B, L, F, C> NodeService<T, B, L, F, C>
where
    T: ClimateSensor,
    B: PressureSensor,
    L: Co2Link,
    F: OutputPin,
    C: OutputPin,
{
    /// Construct the service.  Does **not** touch the sensors: call
    /// [`start`](Self::start) next.
    pub fn new(
        sensing: SensingCoordinator<T, B, L, F>,
        calibration: CalibrationSequencer<C>,
        config: &NodeConfig,
    ) -> Self {
        Self {
            sensing,
            calibration,
            telemetry_interval_ms: config.telemetry_interval_ms,
            last_cycle_ms: 0,
            was_calibrating: false,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Initialise the sensors and begin preheating.
    pub fn start(&mut self, clock: &impl ClockPort, sink: &mut impl EventSink) {
        self.sensing.init(clock);
        sink.emit(&NodeEvent::Started(self.sensing.state()));
        info!("NodeService started in {:?}", self.sensing.state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control tick.
    pub fn tick(
        &mut self,
        transport: &mut impl TransportPort,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        let now = clock.now_ms();

        // 1. Command intake
        if let Some(raw) = transport.poll_command() {
            self.handle_command(&raw, now, sink);
        }

        // 2. Calibration sequence advances regardless of anything else
        self.calibration.run(now);

        // 3. Calibration finished since the previous tick → back to Ready
        let calibrating = self.calibration.is_calibrating();
        if self.was_calibrating && !calibrating {
            sink.emit(&NodeEvent::CalibrationFinished);
            self.change_readiness(ReadinessState::Ready, sink);
        }
        self.was_calibrating = calibrating;

        // 4. Fan toggle requested by the client
        if transport.take_fan_toggle_request() {
            let on = !self.sensing.fan_state();
            self.sensing.set_fan_state(on);
            sink.emit(&NodeEvent::FanChanged(on));
        }

        // 5. Sensing + telemetry on the cadence, never while calibrating
        if !calibrating
            && now.saturating_sub(self.last_cycle_ms) >= u64::from(self.telemetry_interval_ms)
        {
            self.sensing_cycle(transport, clock, sink);
            self.last_cycle_ms = now;
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn readiness(&self) -> ReadinessState {
        self.sensing.state()
    }

    pub fn calibration_phase(&self) -> CalPhase {
        self.calibration.phase()
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_calibrating()
    }

    pub fn fan_state(&self) -> bool {
        self.sensing.fan_state()
    }

    /// Inspection only; the control loop never branches on it.
    pub fn pressure_online(&self) -> bool {
        self.sensing.pressure_online()
    }

    /// Ticks run since construction.  Inspection only.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn handle_command(&mut self, raw: &str, now: u64, sink: &mut impl EventSink) {
        match NodeCommand::parse(raw) {
            Some(NodeCommand::StartCalibration) => {
                if self.calibration.start_calibration(now) {
                    sink.emit(&NodeEvent::CalibrationStarted);
                    self.change_readiness(ReadinessState::Calibrating, sink);
                } else {
                    sink.emit(&NodeEvent::CalibrationRejected(self.calibration.phase()));
                }
            }
            None => {
                debug!("CMD: ignoring '{}'", raw);
                let mut s = heapless::String::new();
                let _ = s.push_str(raw);
                sink.emit(&NodeEvent::CommandIgnored(s));
            }
        }
    }

    fn sensing_cycle(
        &mut self,
        transport: &mut impl TransportPort,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        let prev_state = self.sensing.state();
        let prev_fan = self.sensing.fan_state();

        let reading = self.sensing.read_all_sensors(clock);

        let state = self.sensing.state();
        if state != prev_state {
            sink.emit(&NodeEvent::ReadinessChanged {
                from: prev_state,
                to: state,
            });
        }
        let fan_on = self.sensing.fan_state();
        if fan_on != prev_fan {
            sink.emit(&NodeEvent::FanChanged(fan_on));
        }

        let snapshot = TelemetrySnapshot {
            reading,
            readiness: state,
            fan_on,
        };
        sink.emit(&NodeEvent::Telemetry(snapshot));
        if transport.is_peer_connected() {
            transport.push_snapshot(&snapshot);
        }
    }

    fn change_readiness(&mut self, to: ReadinessState, sink: &mut impl EventSink) {
        let from = self.sensing.state();
        self.sensing.set_state(to);
        if from != to {
            sink.emit(&NodeEvent::ReadinessChanged { from, to });
        }
    }
}
