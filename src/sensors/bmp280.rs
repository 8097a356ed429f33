//! Bosch BMP280 barometric pressure sensor over I2C.
//!
//! Generic over `embedded_hal::i2c::I2c` so the same driver runs against an
//! ESP-IDF `I2cDriver` on the board and a register-file mock on the host.
//!
//! Compensation follows the 64-bit integer formulas from the datasheet
//! (section 3.11.3); temperature is read alongside pressure only to derive
//! `t_fine`.

use embedded_hal::i2c::I2c;
use log::debug;

use crate::app::ports::PressureSensor;
use crate::error::SensorError;

/// SDO tied high.  Use 0x76 when SDO is grounded.
pub const DEFAULT_ADDR: u8 = 0x77;
pub const CHIP_ID: u8 = 0x58;

const REG_CALIB: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_PRESS_MSB: u8 = 0xF7;

const CALIB_LEN: usize = 24;

// Sampling profile: normal mode, temperature x2, pressure x16, IIR filter
// x16, 500 ms standby.
const MODE_NORMAL: u8 = 0b11;
const OSRS_T_X2: u8 = 0b010;
const OSRS_P_X16: u8 = 0b101;
const FILTER_X16: u8 = 0b100;
const STANDBY_500_MS: u8 = 0b100;

pub const CTRL_MEAS_VALUE: u8 = (OSRS_T_X2 << 5) | (OSRS_P_X16 << 2) | MODE_NORMAL;
pub const CONFIG_VALUE: u8 = (STANDBY_500_MS << 5) | (FILTER_X16 << 2);

/// Factory trimming parameters (`dig_T1` .. `dig_P9`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

impl Calibration {
    pub fn from_bytes(b: &[u8; CALIB_LEN]) -> Self {
        let u = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([b[i], b[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
        }
    }

    /// Fine temperature used by the pressure formula.
    pub fn t_fine(&self, adc_t: i32) -> i32 {
        let t1 = i32::from(self.t1);
        let var1 = (((adc_t >> 3) - (t1 << 1)) * i32::from(self.t2)) >> 11;
        let d = (adc_t >> 4) - t1;
        let var2 = (((d * d) >> 12) * i32::from(self.t3)) >> 14;
        var1 + var2
    }

    /// Compensated pressure in pascals.  `None` if the trimming data would
    /// divide by zero (blank / corrupted NVM).
    pub fn pressure_pa(&self, adc_p: i32, t_fine: i32) -> Option<f32> {
        let mut var1 = i64::from(t_fine) - 128_000;
        let mut var2 = var1 * var1 * i64::from(self.p6);
        var2 += (var1 * i64::from(self.p5)) << 17;
        var2 += i64::from(self.p4) << 35;
        var1 = ((var1 * var1 * i64::from(self.p3)) >> 8) + ((var1 * i64::from(self.p2)) << 12);
        var1 = (((1i64 << 47) + var1) * i64::from(self.p1)) >> 33;
        if var1 == 0 {
            return None;
        }

        let mut p = 1_048_576 - i64::from(adc_p);
        p = (((p << 31) - var2) * 3125) / var1;
        let var1 = (i64::from(self.p9) * (p >> 13) * (p >> 13)) >> 25;
        let var2 = (i64::from(self.p8) * p) >> 19;
        p = ((p + var1 + var2) >> 8) + (i64::from(self.p7) << 4);

        // Q24.8 fixed point.
        Some(p as f32 / 256.0)
    }
}

pub struct Bmp280<I: I2c> {
    i2c: I,
    addr: u8,
    calib: Option<Calibration>,
}

impl<I: I2c> Bmp280<I> {
    pub fn new(i2c: I, addr: u8) -> Self {
        Self {
            i2c,
            addr,
            calib: None,
        }
    }

    pub fn new_default(i2c: I) -> Self {
        Self::new(i2c, DEFAULT_ADDR)
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calib.as_ref()
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.addr, &[reg, value])
            .map_err(|_| SensorError::Bus)
    }

    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        self.i2c
            .write_read(self.addr, &[reg], buf)
            .map_err(|_| SensorError::Bus)
    }
}

impl<I: I2c> PressureSensor for Bmp280<I> {
    fn begin(&mut self) -> Result<(), SensorError> {
        self.calib = None;

        let mut id = [0u8; 1];
        self.read_regs(REG_CHIP_ID, &mut id)
            .map_err(|_| SensorError::NotPresent)?;
        if id[0] != CHIP_ID {
            return Err(SensorError::WrongChip(id[0]));
        }

        let mut raw = [0u8; CALIB_LEN];
        self.read_regs(REG_CALIB, &mut raw)?;
        let calib = Calibration::from_bytes(&raw);
        debug!("BMP280 calibration: {:?}", calib);
        self.calib = Some(calib);
        Ok(())
    }

    fn apply_sampling(&mut self) -> Result<(), SensorError> {
        // config is only guaranteed to be taken in sleep mode, so it goes
        // first; ctrl_meas then switches to normal mode.
        self.write_reg(REG_CTRL_MEAS, 0x00)?;
        self.write_reg(REG_CONFIG, CONFIG_VALUE)?;
        self.write_reg(REG_CTRL_MEAS, CTRL_MEAS_VALUE)
    }

    fn read_pressure_pa(&mut self) -> Result<f32, SensorError> {
        let calib = self.calib.ok_or(SensorError::NotPresent)?;

        let mut raw = [0u8; 6];
        self.read_regs(REG_PRESS_MSB, &mut raw)?;
        let adc_p = (i32::from(raw[0]) << 12) | (i32::from(raw[1]) << 4) | (i32::from(raw[2]) >> 4);
        let adc_t = (i32::from(raw[3]) << 12) | (i32::from(raw[4]) << 4) | (i32::from(raw[5]) >> 4);

        let t_fine = calib.t_fine(adc_t);
        calib.pressure_pa(adc_p, t_fine).ok_or(SensorError::Checksum)
    }
}
