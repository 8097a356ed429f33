//! GPIO / peripheral pin assignments for the AirNode board (ESP32 DevKit).
//!
//! Single source of truth: `main.rs` references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// MH-Z19 CO2 sensor
// ---------------------------------------------------------------------------

/// UART2 RX (sensor TX → ESP32).
pub const CO2_UART_RX_GPIO: i32 = 16;
/// UART2 TX (ESP32 → sensor RX).
pub const CO2_UART_TX_GPIO: i32 = 17;
/// Sensor UART baud rate (8N1).
pub const CO2_UART_BAUD: u32 = 9_600;
/// HD (zero-point calibration) line.  Idles HIGH, pulled LOW to calibrate.
pub const CO2_CAL_GPIO: i32 = 12;

// ---------------------------------------------------------------------------
// Climate sensors
// ---------------------------------------------------------------------------

/// DHT22 single-wire data line (open-drain, external 4.7 kΩ pull-up).
pub const DHT_GPIO: i32 = 25;
/// BMP280 I2C data.
pub const I2C_SDA_GPIO: i32 = 21;
/// BMP280 I2C clock.
pub const I2C_SCL_GPIO: i32 = 22;
/// I2C bus frequency.
pub const I2C_FREQ_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Fan relay / MOSFET gate (active HIGH).
pub const FAN_GPIO: i32 = 26;
