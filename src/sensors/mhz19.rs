//! MH-Z19 CO2 sensor: 9-byte UART frame protocol.
//!
//! ```text
//!  request   FF 01 cmd p0 p1 p2 p3 p4 cs
//!  response  FF cmd hi lo .. .. .. .. cs
//! ```
//!
//! `cs = 0xFF - (sum(frame[1..8]) & 0xFF) + 1`, i.e. the two's complement
//! of the byte sum, so `frame[1..=8]` always sums to zero mod 256.
//!
//! Every exchange is bounded by the configured response window; the driver
//! never waits on the link indefinitely.

use log::{debug, info, warn};

use crate::app::ports::{ClockPort, Co2Link};
use crate::error::{LinkError, ProtocolError};

pub const FRAME_LEN: usize = 9;
pub const START_BYTE: u8 = 0xFF;
/// Sensor address byte used in every request.
pub const SENSOR_ID: u8 = 0x01;

pub const CMD_READ_CO2: u8 = 0x86;
pub const CMD_SET_ABC: u8 = 0x79;

const ABC_ON: u8 = 0xA0;
const ABC_OFF: u8 = 0x00;

/// The read request never changes, so it is sent as a literal.
pub const READ_CO2_FRAME: [u8; FRAME_LEN] = [0xFF, 0x01, 0x86, 0x00, 0x00, 0x00, 0x00, 0x00, 0x79];

/// Two's-complement checksum over the bytes between the start byte and the
/// checksum slot (`frame[1..8]`).
pub fn checksum(body: &[u8]) -> u8 {
    let sum = body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0xFFu8.wrapping_sub(sum).wrapping_add(1)
}

/// Build a request frame for `cmd` with up to five payload bytes.
pub fn build_command(cmd: u8, payload: &[u8]) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = START_BYTE;
    frame[1] = SENSOR_ID;
    frame[2] = cmd;
    let n = payload.len().min(5);
    frame[3..3 + n].copy_from_slice(&payload[..n]);
    frame[8] = checksum(&frame[1..8]);
    frame
}

/// Frame-level driver.  Exclusively owns the link so requests and replies
/// can never interleave.
pub struct Mhz19<L: Co2Link> {
    link: L,
    response_timeout_ms: u32,
}

impl<L: Co2Link> Mhz19<L> {
    pub fn new(link: L, response_timeout_ms: u32) -> Self {
        Self {
            link,
            response_timeout_ms,
        }
    }

    /// Enable or disable automatic baseline correction.  Fire-and-forget:
    /// the sensor does not acknowledge this command.
    pub fn set_auto_calibration(&mut self, enabled: bool) -> Result<(), LinkError> {
        let frame = build_command(CMD_SET_ABC, &[if enabled { ABC_ON } else { ABC_OFF }]);
        self.link.send(&frame)?;
        info!("MH-Z19: auto calibration {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// One read exchange.  Returns the concentration in ppm.
    pub fn read_co2(&mut self, clock: &impl ClockPort) -> Result<u16, ProtocolError> {
        // A late reply to an earlier timed-out request would otherwise be
        // taken as the answer to this one.
        self.link.discard_input();
        self.link.send(&READ_CO2_FRAME)?;

        let start = clock.now_ms();
        let window = u64::from(self.response_timeout_ms);
        while self.link.bytes_available() < FRAME_LEN {
            if clock.now_ms().saturating_sub(start) > window {
                let received = self.link.bytes_available();
                warn!("MH-Z19: timeout, {}/{} bytes", received, FRAME_LEN);
                return Err(ProtocolError::Timeout { received });
            }
            clock.delay_ms(1);
        }

        let mut frame = [0u8; FRAME_LEN];
        let n = self.link.read(&mut frame).map_err(ProtocolError::Link)?;
        if n < FRAME_LEN {
            return Err(ProtocolError::Timeout { received: n });
        }
        debug!("MH-Z19 frame: {:02X?}", frame);

        if frame[0] != START_BYTE || frame[1] != CMD_READ_CO2 {
            warn!("MH-Z19: bad header {:02X} {:02X}", frame[0], frame[1]);
            return Err(ProtocolError::BadHeader {
                start: frame[0],
                command: frame[1],
            });
        }

        Ok((u16::from(frame[2]) << 8) | u16::from(frame[3]))
    }
}
