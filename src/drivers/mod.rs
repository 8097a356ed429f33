//! Actuator drivers.

pub mod fan;
