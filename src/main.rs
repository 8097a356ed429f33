//! AirNode Firmware: Main Entry Point
//!
//! Single cooperative control loop: one [`NodeService::tick`] per pass,
//! then a short idle delay.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspUartLink   Dht22          Bmp280        Esp32TimeAdapter   │
//! │  (Co2Link)     (Climate)      (Pressure)    (ClockPort)        │
//! │  BleTransport  LogEventSink                                    │
//! │  (Transport)   (EventSink)                                     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  CalibrationSequencer · SensingCoordinator · Fan       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use log::info;

use airnode::adapters::ble::{BLE_INBOX, BleTransport};
use airnode::adapters::log_sink::LogEventSink;
use airnode::adapters::time::Esp32TimeAdapter;
use airnode::adapters::uart::EspUartLink;
use airnode::app::service::NodeService;
use airnode::calibration::CalibrationSequencer;
use airnode::config::NodeConfig;
use airnode::pins;
use airnode::sensors::SensingCoordinator;
use airnode::sensors::bmp280::Bmp280;
use airnode::sensors::dht22::init_dht22;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AirNode v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = NodeConfig::resolve(option_env!("AIRNODE_CONFIG_JSON"));
    info!(
        "Config: stabilization={}s pulse={}ms preheat={}s cadence={}ms",
        config.stabilization_ms / 1000,
        config.pulse_ms,
        config.preheat_ms / 1000,
        config.telemetry_interval_ms
    );

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;

    // SAFETY: each GPIO below is claimed exactly once and never taken from
    // `peripherals.pins`.
    let (uart_tx, uart_rx, dht_pin, sda, scl, cal_pin, fan_pin) = unsafe {
        (
            AnyIOPin::new(pins::CO2_UART_TX_GPIO),
            AnyIOPin::new(pins::CO2_UART_RX_GPIO),
            AnyIOPin::new(pins::DHT_GPIO),
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
            AnyOutputPin::new(pins::CO2_CAL_GPIO),
            AnyOutputPin::new(pins::FAN_GPIO),
        )
    };

    let co2_link = EspUartLink::new(peripherals.uart2, uart_tx, uart_rx)?;
    let climate = init_dht22(dht_pin)?;
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        sda,
        scl,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;
    let pressure = Bmp280::new_default(i2c);
    let cal_pin = PinDriver::output(cal_pin)?;
    let fan_pin = PinDriver::output(fan_pin)?;

    // ── 4. Adapters ───────────────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let mut log_sink = LogEventSink::new();
    let mut transport = BleTransport::new(&BLE_INBOX, config.device_name.clone());
    transport.start()?;

    // ── 5. Node service ───────────────────────────────────────
    let sensing = SensingCoordinator::new(climate, pressure, co2_link, fan_pin, &config);
    let calibration = CalibrationSequencer::new(cal_pin, &config);
    let mut node = NodeService::new(sensing, calibration, &config);
    node.start(&clock, &mut log_sink);

    // ── 6. Control loop ───────────────────────────────────────
    info!("Entering control loop");
    loop {
        node.tick(&mut transport, &clock, &mut log_sink);
        FreeRtos::delay_ms(config.tick_idle_ms);
    }
}
