//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService / SensingCoordinator (domain)
//! ```
//!
//! Driven adapters (UART link, climate and pressure sensors, BLE transport,
//! event sinks, clock) implement these traits.  The domain consumes them via
//! generics, so the core never touches hardware directly and every path is
//! exercised on the host with mocks.
//!
//! Output pins (calibration line, fan) are not wrapped in a port: the
//! domain takes any `embedded_hal::digital::OutputPin` directly.

use crate::error::{LinkError, SensorError};

use super::events::{NodeEvent, TelemetrySnapshot};

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock plus a short blocking delay.
pub trait ClockPort {
    /// Milliseconds since boot.  Never goes backwards.
    fn now_ms(&self) -> u64;

    /// Block the calling task for `ms` milliseconds.
    fn delay_ms(&self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// CO2 byte link (driven adapter: UART ↔ frame protocol)
// ───────────────────────────────────────────────────────────────

/// Raw byte stream to the CO2 sensor.
///
/// Reads are non-blocking; the frame protocol layers its own bounded wait
/// on top of [`bytes_available`](Co2Link::bytes_available).
pub trait Co2Link {
    /// Write a complete frame and wait until it has left the FIFO.
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError>;

    /// Bytes currently buffered on the receive side.
    fn bytes_available(&mut self) -> usize;

    /// Copy up to `buf.len()` buffered bytes without waiting.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// Drop everything sitting in the receive buffer.
    fn discard_input(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapters: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One temperature/humidity sample.  Values may be NaN when the driver
/// could talk to the sensor but got an implausible payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Combined temperature / humidity sensor (DHT22 class).
pub trait ClimateSensor {
    fn read(&mut self) -> Result<ClimateSample, SensorError>;
}

/// Barometric pressure sensor that may be absent at boot or drop off the
/// bus at runtime.
pub trait PressureSensor {
    /// Probe the sensor and load its calibration data.
    fn begin(&mut self) -> Result<(), SensorError>;

    /// Push the operating mode / oversampling / filter settings.
    fn apply_sampling(&mut self) -> Result<(), SensorError>;

    /// Compensated pressure in pascals.
    fn read_pressure_pa(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Transport port (driving + driven: remote client ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Bidirectional text-attribute channel to a remote client.
///
/// Implementations own the connection state.  Callbacks coming from the
/// radio stack must only enqueue commands and set flags; the control loop
/// drains them through this trait.
pub trait TransportPort {
    /// Next pending command string, if any.  Consuming a command resets the
    /// command attribute so the client can see it was taken.
    fn poll_command(&mut self) -> Option<heapless::String<32>>;

    /// Whether a peer is currently connected.
    fn is_peer_connected(&self) -> bool;

    /// Publish one telemetry snapshot to the connected peer.
    fn push_snapshot(&mut self, snapshot: &TelemetrySnapshot);

    /// Returns `true` once per fan-toggle request written by the client.
    fn take_fan_toggle_request(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`NodeEvent`]s through this port.  Adapters
/// decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &NodeEvent);
}
