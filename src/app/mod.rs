//! Application core: orchestration, zero I/O.
//!
//! This module holds the per-tick rules of the sensor node: command intake,
//! calibration edge detection, fan toggles and the telemetry cadence.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
