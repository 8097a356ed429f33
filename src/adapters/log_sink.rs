//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured node events to the
//! ESP-IDF logger (UART console in production).  Telemetry arrives every
//! cadence period, so it is logged at `debug`; everything else at `info`.

use log::{debug, info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`NodeEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NodeEvent) {
        match event {
            NodeEvent::Telemetry(t) => {
                debug!(
                    "TELEM | state={} | T={}\u{00b0}C | RH={}% | P={}hPa | CO2={}ppm | fan={}",
                    t.state_attr(),
                    t.temperature_attr(),
                    t.humidity_attr(),
                    t.pressure_attr(),
                    t.co2_attr(),
                    t.fan_attr(),
                );
            }
            NodeEvent::ReadinessChanged { from, to } => {
                info!("STATE | {} -> {}", from.as_str(), to.as_str());
            }
            NodeEvent::CalibrationStarted => {
                info!("CAL | started");
            }
            NodeEvent::CalibrationRejected(phase) => {
                warn!("CAL | start rejected, already {:?}", phase);
            }
            NodeEvent::CalibrationFinished => {
                info!("CAL | finished");
            }
            NodeEvent::FanChanged(on) => {
                info!("FAN | {}", if *on { "ON" } else { "OFF" });
            }
            NodeEvent::CommandIgnored(raw) => {
                debug!("CMD | ignored '{}'", raw);
            }
            NodeEvent::Started(state) => {
                info!("START | initial_state={}", state.as_str());
            }
        }
    }
}
