//! Fan output (relay / MOSFET gate, active HIGH).
//!
//! A dumb binary actuator: the logical state and the pin are written
//! together and the controller never decides on its own when to switch.
//!
//! ## Dual-target design
//!
//! Generic over `embedded_hal::digital::OutputPin`, so the firmware hands
//! in an ESP-IDF `PinDriver` and host tests hand in a recording mock.

use embedded_hal::digital::OutputPin;
use log::warn;

pub struct FanController<P: OutputPin> {
    pin: P,
    on: bool,
}

impl<P: OutputPin> FanController<P> {
    /// Take the pin and drive it off.
    pub fn new(pin: P) -> Self {
        let mut fan = Self { pin, on: false };
        fan.write_pin(false);
        fan
    }

    /// Switch the fan.  Repeating the current state re-drives the pin.
    /// Changes are reported by the caller as `FanChanged` events.
    pub fn set_fan_state(&mut self, on: bool) {
        self.on = on;
        self.write_pin(on);
    }

    pub fn fan_state(&self) -> bool {
        self.on
    }

    fn write_pin(&mut self, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if result.is_err() {
            warn!("FAN: pin write failed");
        }
    }
}
