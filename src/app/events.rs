//! Outbound application events and the telemetry snapshot.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port and hands snapshots to the
//! [`TransportPort`](super::ports::TransportPort).

use core::fmt::Write;

use crate::calibration::CalPhase;
use crate::sensors::{ReadinessState, SensorReading};

/// Formatted attribute value, sized for the longest field ("CALIBRATING",
/// "-40.00", "100000.00").
pub type AttrString = heapless::String<16>;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// The node finished init (carries initial readiness).
    Started(ReadinessState),

    /// Readiness moved between states.
    ReadinessChanged {
        from: ReadinessState,
        to: ReadinessState,
    },

    /// A calibration request was accepted.
    CalibrationStarted,

    /// A calibration request arrived while one was already running.
    CalibrationRejected(CalPhase),

    /// The calibration sequence returned to idle.
    CalibrationFinished,

    /// The fan output changed (carries the new state).
    FanChanged(bool),

    /// A command string was not recognised and was dropped.
    CommandIgnored(heapless::String<32>),

    /// One sensing cycle completed.
    Telemetry(TelemetrySnapshot),
}

/// A point-in-time snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub reading: SensorReading,
    pub readiness: ReadinessState,
    pub fan_on: bool,
}

impl TelemetrySnapshot {
    pub fn temperature_attr(&self) -> AttrString {
        fixed2(self.reading.temperature_c)
    }

    pub fn humidity_attr(&self) -> AttrString {
        fixed2(self.reading.humidity_pct)
    }

    pub fn pressure_attr(&self) -> AttrString {
        fixed2(self.reading.pressure_hpa)
    }

    pub fn co2_attr(&self) -> AttrString {
        let mut s = AttrString::new();
        let _ = write!(s, "{}", self.reading.co2_ppm);
        s
    }

    pub fn state_attr(&self) -> &'static str {
        self.readiness.as_str()
    }

    pub fn fan_attr(&self) -> &'static str {
        if self.fan_on { "ON" } else { "OFF" }
    }
}

fn fixed2(value: f32) -> AttrString {
    let mut s = AttrString::new();
    if write!(s, "{value:.2}").is_err() {
        // Out-of-range garbage from a sensor; publish the sentinel instead.
        s.clear();
        let _ = s.push_str("-1.00");
    }
    s
}
