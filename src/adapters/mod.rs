//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements      | Connects to                 |
//! |------------|-----------------|-----------------------------|
//! | `ble`      | TransportPort   | Bluedroid GATT server       |
//! | `log_sink` | EventSink       | Serial log output           |
//! | `time`     | ClockPort       | ESP32 high-resolution timer |
//! | `uart`     | Co2Link         | UART2 → MH-Z19              |

pub mod ble;
pub mod log_sink;
pub mod time;
#[cfg(target_os = "espidf")]
pub mod uart;
