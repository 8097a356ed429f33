//! Node configuration parameters
//!
//! All tunable timings for the sensor node.  Defaults match the deployed
//! hardware; a JSON document baked in at build time (`AIRNODE_CONFIG_JSON`)
//! can override any subset of fields.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The CO2 sensor needs the HD line held low for at least this long to
/// register a zero-point calibration.
pub const MIN_PULSE_MS: u32 = 7_000;

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    // --- Calibration ---
    /// Fresh-air settling time before the calibration pulse (ms)
    pub stabilization_ms: u32,
    /// Calibration pin low time (ms), never below [`MIN_PULSE_MS`]
    pub pulse_ms: u32,
    /// Interval between "remaining time" log lines while stabilizing (ms)
    pub calibration_progress_log_ms: u32,

    // --- Sensing ---
    /// CO2 sensor warm-up before readings are trusted (ms)
    pub preheat_ms: u32,
    /// Minimum gap between pressure sensor reconnect attempts (ms)
    pub pressure_retry_ms: u32,
    /// Response window for one CO2 frame exchange (ms)
    pub co2_response_timeout_ms: u32,

    // --- Timing ---
    /// Sensing / telemetry cadence (ms)
    pub telemetry_interval_ms: u32,
    /// Idle delay between control ticks (ms)
    pub tick_idle_ms: u32,

    // --- Transport ---
    /// BLE advertised device name
    pub device_name: heapless::String<24>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let mut device_name = heapless::String::new();
        let _ = device_name.push_str("Sensor_1");

        Self {
            // Calibration
            stabilization_ms: 20 * 60 * 1000, // 20 min
            pulse_ms: MIN_PULSE_MS,
            calibration_progress_log_ms: 10_000,

            // Sensing
            preheat_ms: 60_000,
            pressure_retry_ms: 5_000,
            co2_response_timeout_ms: 150,

            // Timing
            telemetry_interval_ms: 500,
            tick_idle_ms: 10,

            device_name,
        }
    }
}

impl NodeConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    /// Missing fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the running configuration from an optional override document.
    /// A missing or rejected document falls back to the defaults.
    pub fn resolve(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        match Self::from_json(raw) {
            Ok(config) => {
                info!("Config: override applied");
                config
            }
            Err(e) => {
                warn!("Config: override rejected ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Reject values the hardware cannot honour.  Out-of-range values are
    /// refused rather than clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pulse_ms < MIN_PULSE_MS {
            return Err(ConfigError::ValidationFailed("pulse_ms below 7000 ms"));
        }
        if self.co2_response_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("co2_response_timeout_ms is zero"));
        }
        if self.telemetry_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("telemetry_interval_ms is zero"));
        }
        if self.pressure_retry_ms == 0 {
            return Err(ConfigError::ValidationFailed("pressure_retry_ms is zero"));
        }
        if self.calibration_progress_log_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "calibration_progress_log_ms is zero",
            ));
        }
        if self.device_name.is_empty() {
            return Err(ConfigError::ValidationFailed("device_name is empty"));
        }
        Ok(())
    }
}
