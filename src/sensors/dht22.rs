//! DHT22 temperature / humidity sensor on a single open-drain GPIO.
//!
//! Frame decoding and read pacing are target-independent; the bit-banged
//! reader only exists on the board, where it needs `esp_timer_get_time()`
//! for microsecond pulse timing.
//!
//! The sensor stays busy for about 2 s after a transfer, while the sensing
//! cadence is much shorter.  Reads inside that window return the previous
//! outcome instead of starting a new transfer.

use crate::app::ports::ClimateSample;
use crate::error::SensorError;

/// Bytes per DHT22 transfer: humidity (2), temperature (2), checksum.
pub const FRAME_LEN: usize = 5;

/// Shortest interval between two bus transfers.
pub const MIN_READ_INTERVAL_MS: u64 = 2_000;

/// Last read outcome and when it was taken.
#[derive(Debug, Default)]
pub struct ReadCache {
    last: Option<(u64, Result<ClimateSample, SensorError>)>,
}

impl ReadCache {
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Return the cached outcome while it is younger than
    /// [`MIN_READ_INTERVAL_MS`], otherwise run `transfer` and cache it.
    /// Failures are cached too.
    pub fn get_or_read(
        &mut self,
        now_ms: u64,
        transfer: impl FnOnce() -> Result<ClimateSample, SensorError>,
    ) -> Result<ClimateSample, SensorError> {
        if let Some((taken_at, outcome)) = self.last {
            if now_ms.saturating_sub(taken_at) < MIN_READ_INTERVAL_MS {
                return outcome;
            }
        }
        let outcome = transfer();
        self.last = Some((now_ms, outcome));
        outcome
    }
}

/// Decode a raw DHT22 frame.
///
/// Humidity and temperature are tenths; the temperature's top bit is a sign
/// flag, not two's complement.
pub fn decode_frame(data: &[u8; FRAME_LEN]) -> Result<ClimateSample, SensorError> {
    let sum = data[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != data[4] {
        return Err(SensorError::Checksum);
    }

    let raw_humidity = u16::from_be_bytes([data[0], data[1]]);
    let raw_temp = u16::from_be_bytes([data[2], data[3]]);

    let mut temperature_c = f32::from(raw_temp & 0x7FFF) / 10.0;
    if raw_temp & 0x8000 != 0 {
        temperature_c = -temperature_c;
    }

    Ok(ClimateSample {
        temperature_c,
        humidity_pct: f32::from(raw_humidity) / 10.0,
    })
}

#[cfg(target_os = "espidf")]
pub use device::{Dht22, init_dht22};

#[cfg(target_os = "espidf")]
mod device {
    use esp_idf_hal::delay::Ets;
    use esp_idf_hal::gpio::{InputOutput, InputPin, OutputPin, PinDriver, Pull};
    use esp_idf_hal::peripheral::Peripheral;
    use esp_idf_sys::{self as sys, EspError};

    use super::{FRAME_LEN, ReadCache, decode_frame};
    use crate::app::ports::{ClimateSample, ClimateSensor};
    use crate::error::SensorError;

    /// High pulses longer than this are a `1` bit (~70 us vs ~27 us).
    const ONE_BIT_THRESHOLD_US: i64 = 50;

    pub struct Dht22<'d, P>
    where
        P: InputPin + OutputPin,
    {
        pin: PinDriver<'d, P, InputOutput>,
        cache: ReadCache,
    }

    impl<'d, P> Dht22<'d, P>
    where
        P: InputPin + OutputPin,
    {
        pub fn new(mut pin: PinDriver<'d, P, InputOutput>) -> Result<Self, EspError> {
            pin.set_pull(Pull::Up)?;
            pin.set_high()?;
            Ok(Self {
                pin,
                cache: ReadCache::new(),
            })
        }
    }

    impl<P> ClimateSensor for Dht22<'_, P>
    where
        P: InputPin + OutputPin,
    {
        fn read(&mut self) -> Result<ClimateSample, SensorError> {
            let now_ms = (now_us() / 1000) as u64;
            let Self { pin, cache } = self;
            cache.get_or_read(now_ms, || {
                let frame = read_frame(pin)?;
                decode_frame(&frame)
            })
        }
    }

    /// Configure `pin` as open-drain I/O with pull-up and wrap it.
    pub fn init_dht22<'d, P>(pin: impl Peripheral<P = P> + 'd) -> Result<Dht22<'d, P>, EspError>
    where
        P: InputPin + OutputPin,
    {
        Dht22::new(PinDriver::input_output_od(pin)?)
    }

    fn read_frame<P>(pin: &mut PinDriver<'_, P, InputOutput>) -> Result<[u8; FRAME_LEN], SensorError>
    where
        P: InputPin + OutputPin,
    {
        // Start signal: hold the line low for >1 ms, then release.
        pin.set_low().map_err(|_| SensorError::Bus)?;
        Ets::delay_ms(2);
        pin.set_high().map_err(|_| SensorError::Bus)?;
        Ets::delay_us(30);

        wait_for_level(pin, false, 200, "response low")?;
        wait_for_level(pin, true, 200, "response high")?;
        wait_for_level(pin, false, 200, "data preamble")?;

        let mut data = [0u8; FRAME_LEN];
        for byte in &mut data {
            for _ in 0..8 {
                wait_for_level(pin, true, 80, "bit high")?;
                let start = now_us();
                wait_for_level(pin, false, 120, "bit low")?;
                *byte <<= 1;
                if now_us() - start > ONE_BIT_THRESHOLD_US {
                    *byte |= 1;
                }
            }
        }
        Ok(data)
    }

    fn wait_for_level<P>(
        pin: &PinDriver<'_, P, InputOutput>,
        high: bool,
        timeout_us: i64,
        stage: &'static str,
    ) -> Result<(), SensorError>
    where
        P: InputPin + OutputPin,
    {
        let deadline = now_us() + timeout_us;
        while now_us() <= deadline {
            if pin.is_high() == high {
                return Ok(());
            }
        }
        Err(SensorError::Timeout(stage))
    }

    fn now_us() -> i64 {
        unsafe { sys::esp_timer_get_time() }
    }
}
