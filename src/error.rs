//! Unified error types for the AirNode firmware.
//!
//! Every subsystem has its own small `Copy` enum; the top-level [`Error`]
//! wraps them so the binary can funnel anything into one type.  Nothing in
//! the control core is fatal: these errors are logged and degraded to
//! sentinel readings by the callers.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A climate or pressure sensor could not be read.
    Sensor(SensorError),
    /// The CO2 request/response exchange failed.
    Protocol(ProtocolError),
    /// The byte link to the CO2 sensor failed.
    Link(LinkError),
    /// Configuration is invalid or could not be parsed.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Protocol(e) => write!(f, "co2 protocol: {e}"),
            Self::Link(e) => write!(f, "co2 link: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Sensor did not answer on the bus (absent or unpowered).
    NotPresent,
    /// Bus transaction (I2C / GPIO) failed.
    Bus,
    /// Single-wire timing window missed at the named stage.
    Timeout(&'static str),
    /// Payload checksum did not match.
    Checksum,
    /// Sensor answered with an unexpected chip id.
    WrongChip(u8),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPresent => write!(f, "sensor not present"),
            Self::Bus => write!(f, "bus transaction failed"),
            Self::Timeout(stage) => write!(f, "timeout waiting for {stage}"),
            Self::Checksum => write!(f, "checksum mismatch"),
            Self::WrongChip(id) => write!(f, "unexpected chip id 0x{id:02X}"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// CO2 link / protocol errors
// ---------------------------------------------------------------------------

/// Transport-level failure on the UART link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    WriteFailed,
    ReadFailed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "UART write failed"),
            Self::ReadFailed => write!(f, "UART read failed"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

/// Failure of one framed request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer than a full frame arrived inside the response window.
    Timeout { received: usize },
    /// Response did not start with the expected start byte / command echo.
    BadHeader { start: u8, command: u8 },
    /// The request could not be written.
    Link(LinkError),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { received } => {
                write!(f, "timeout waiting for frame ({received}/9 bytes)")
            }
            Self::BadHeader { start, command } => {
                write!(f, "bad frame header {start:02X} {command:02X}")
            }
            Self::Link(e) => write!(f, "{e}"),
        }
    }
}

impl From<LinkError> for ProtocolError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// JSON could not be parsed into a [`NodeConfig`](crate::config::NodeConfig).
    Malformed,
    /// A field failed range validation; the message names the field.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed config document"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
