//! Sensing and thermal-readiness coordination.
//!
//! [`SensingCoordinator`] owns every sensor, the fan and the node's
//! [`ReadinessState`].  One call to
//! [`read_all_sensors`](SensingCoordinator::read_all_sensors) produces one
//! [`SensorReading`]; each field degrades independently to the `-1`
//! sentinel when its sensor fails, so a single bad sensor never blanks the
//! whole snapshot.
//!
//! ```text
//!  ClimateSensor ──┐
//!  PressureSensor ─┼──▶ SensingCoordinator ──▶ SensorReading
//!  Mhz19<Co2Link> ─┘          │
//!                       FanController  (on at end of preheat)
//! ```

pub mod bmp280;
pub mod dht22;
pub mod mhz19;

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::app::ports::{ClimateSensor, ClockPort, Co2Link, PressureSensor};
use crate::config::NodeConfig;
use crate::drivers::fan::FanController;
use mhz19::Mhz19;

/// Value published for any field whose sensor could not be read.
pub const SENTINEL_F32: f32 = -1.0;
pub const SENTINEL_CO2: i32 = -1;

// ───────────────────────────────────────────────────────────────
// Domain types
// ───────────────────────────────────────────────────────────────

/// Lifecycle phase exposed to clients.  Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    /// CO2 sensor warming up; readings are not yet trusted.
    Preheating,
    Ready,
    /// A zero-point calibration sequence is running.
    Calibrating,
}

impl ReadinessState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preheating => "PREHEATING",
            Self::Ready => "READY",
            Self::Calibrating => "CALIBRATING",
        }
    }
}

/// One sensing cycle.  There is no reading-level success flag; check each
/// field against the sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub pressure_hpa: f32,
    pub co2_ppm: i32,
}

impl SensorReading {
    pub const fn invalid() -> Self {
        Self {
            temperature_c: SENTINEL_F32,
            humidity_pct: SENTINEL_F32,
            pressure_hpa: SENTINEL_F32,
            co2_ppm: SENTINEL_CO2,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// SensingCoordinator
// ───────────────────────────────────────────────────────────────

pub struct SensingCoordinator<T, B, L, F>
where
    T: ClimateSensor,
    B: PressureSensor,
    L: Co2Link,
    F: OutputPin,
{
    climate: T,
    pressure: B,
    co2: Mhz19<L>,
    fan: FanController<F>,
    state: ReadinessState,

    pressure_online: bool,
    last_pressure_attempt_ms: u64,
    pressure_retry_ms: u32,

    preheat_started_ms: u64,
    preheat_ms: u32,
}

impl<T, B, L, F> SensingCoordinator<T, B, L, F>
where
    T: ClimateSensor,
    B: PressureSensor,
    L: Co2Link,
    F: OutputPin,
{
    pub fn new(climate: T, pressure: B, co2_link: L, fan_pin: F, config: &NodeConfig) -> Self {
        Self {
            climate,
            pressure,
            co2: Mhz19::new(co2_link, config.co2_response_timeout_ms),
            fan: FanController::new(fan_pin),
            state: ReadinessState::Preheating,
            pressure_online: false,
            last_pressure_attempt_ms: 0,
            pressure_retry_ms: config.pressure_retry_ms,
            preheat_started_ms: 0,
            preheat_ms: config.preheat_ms,
        }
    }

    /// Probe the pressure sensor, disable the CO2 sensor's automatic
    /// baseline correction, and start the preheat timer.
    pub fn init(&mut self, clock: &impl ClockPort) {
        let now = clock.now_ms();

        self.last_pressure_attempt_ms = now;
        self.pressure_online = self.connect_pressure();
        if !self.pressure_online {
            warn!(
                "SENSE: pressure sensor not found, retrying every {} ms",
                self.pressure_retry_ms
            );
        }

        // Baseline only moves through an explicit calibration cycle.
        if let Err(e) = self.co2.set_auto_calibration(false) {
            warn!("SENSE: could not disable CO2 auto calibration: {}", e);
        }

        self.preheat_started_ms = now;
        self.state = ReadinessState::Preheating;
        self.fan.set_fan_state(false);
        info!("SENSE: preheating for {}s", self.preheat_ms / 1000);
    }

    /// Run one sensing cycle.  Also completes preheating once the warm-up
    /// time has passed.
    pub fn read_all_sensors(&mut self, clock: &impl ClockPort) -> SensorReading {
        let mut reading = SensorReading::invalid();

        // ── Temperature / humidity ────────────────────────────
        match self.climate.read() {
            Ok(s) if !s.temperature_c.is_nan() && !s.humidity_pct.is_nan() => {
                reading.temperature_c = s.temperature_c;
                reading.humidity_pct = s.humidity_pct;
            }
            Ok(_) => warn!("SENSE: climate sensor returned NaN"),
            Err(e) => warn!("SENSE: climate read failed: {}", e),
        }

        // ── Pressure ──────────────────────────────────────────
        let now = clock.now_ms();
        if self.pressure_online {
            match self.pressure.read_pressure_pa() {
                Ok(pa) => reading.pressure_hpa = pa / 100.0,
                Err(e) => {
                    warn!("SENSE: pressure read failed ({}), marking offline", e);
                    self.pressure_online = false;
                    self.last_pressure_attempt_ms = now;
                }
            }
        } else if now.saturating_sub(self.last_pressure_attempt_ms)
            >= u64::from(self.pressure_retry_ms)
        {
            self.last_pressure_attempt_ms = now;
            info!("SENSE: attempting pressure sensor reconnect");
            if self.connect_pressure() {
                info!("SENSE: pressure sensor reconnected");
                self.pressure_online = true;
            }
        }

        // ── CO2 ───────────────────────────────────────────────
        match self.co2.read_co2(clock) {
            Ok(ppm) => reading.co2_ppm = i32::from(ppm),
            Err(e) => warn!("SENSE: CO2 read failed: {}", e),
        }

        // ── Preheat completion ────────────────────────────────
        if self.state == ReadinessState::Preheating
            && clock.now_ms().saturating_sub(self.preheat_started_ms)
                >= u64::from(self.preheat_ms)
        {
            info!("SENSE: preheat complete");
            self.state = ReadinessState::Ready;
            self.fan.set_fan_state(true);
        }

        reading
    }

    pub fn state(&self) -> ReadinessState {
        self.state
    }

    pub fn set_state(&mut self, state: ReadinessState) {
        if state != self.state {
            info!("SENSE: readiness {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }

    pub fn fan_state(&self) -> bool {
        self.fan.fan_state()
    }

    pub fn set_fan_state(&mut self, on: bool) {
        self.fan.set_fan_state(on);
    }

    pub fn pressure_online(&self) -> bool {
        self.pressure_online
    }

    fn connect_pressure(&mut self) -> bool {
        match self
            .pressure
            .begin()
            .and_then(|()| self.pressure.apply_sampling())
        {
            Ok(()) => true,
            Err(e) => {
                warn!("SENSE: pressure sensor unavailable: {}", e);
                false
            }
        }
    }
}
