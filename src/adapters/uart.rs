//! UART link to the MH-Z19 CO2 sensor.
//!
//! Wraps an ESP-IDF [`UartDriver`] behind [`Co2Link`].  Reads never block;
//! the frame layer above does its own bounded polling.

use esp_idf_svc::hal::delay::{BLOCK, NON_BLOCK};
use esp_idf_svc::hal::gpio::{InputPin, OutputPin};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::uart::{Uart, UartConfig, UartDriver};
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::sys::EspError;
use log::warn;

use crate::app::ports::Co2Link;
use crate::error::LinkError;
use crate::pins::CO2_UART_BAUD;

pub struct EspUartLink<'d> {
    uart: UartDriver<'d>,
}

impl<'d> EspUartLink<'d> {
    /// 9600 8N1, no flow control.
    pub fn new<U: Uart>(
        uart: impl Peripheral<P = U> + 'd,
        tx: impl Peripheral<P = impl OutputPin> + 'd,
        rx: impl Peripheral<P = impl InputPin> + 'd,
    ) -> Result<Self, EspError> {
        let config = UartConfig::new().baudrate(Hertz(CO2_UART_BAUD));
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<esp_idf_svc::hal::gpio::AnyIOPin>::None,
            Option::<esp_idf_svc::hal::gpio::AnyIOPin>::None,
            &config,
        )?;
        Ok(Self { uart })
    }
}

impl Co2Link for EspUartLink<'_> {
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        let mut sent = 0;
        while sent < frame.len() {
            sent += self
                .uart
                .write(&frame[sent..])
                .map_err(|_| LinkError::WriteFailed)?;
        }
        self.uart
            .wait_tx_done(BLOCK)
            .map_err(|_| LinkError::WriteFailed)
    }

    fn bytes_available(&mut self) -> usize {
        self.uart.remaining_read().unwrap_or(0)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        self.uart
            .read(buf, NON_BLOCK)
            .map_err(|_| LinkError::ReadFailed)
    }

    fn discard_input(&mut self) {
        if let Err(e) = self.uart.clear_rx() {
            warn!("UART: failed to flush rx: {}", e);
        }
    }
}
