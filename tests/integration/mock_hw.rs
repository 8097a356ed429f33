//! Mock hardware for integration tests.
//!
//! Every mock hands out a cheap handle (`Rc`) so a test can keep poking at
//! the device after ownership of the mock has moved into the node.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use airnode::app::events::{NodeEvent, TelemetrySnapshot};
use airnode::app::ports::{
    ClimateSample, ClimateSensor, ClockPort, Co2Link, EventSink, PressureSensor, TransportPort,
};
use airnode::app::service::NodeService;
use airnode::calibration::CalibrationSequencer;
use airnode::config::NodeConfig;
use airnode::error::{LinkError, SensorError};
use airnode::sensors::SensingCoordinator;
use airnode::sensors::mhz19::{CMD_READ_CO2, FRAME_LEN, checksum};

// ── Clock ─────────────────────────────────────────────────────

/// Manually advanced clock.  `delay_ms` moves time forward.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn delay_ms(&self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

// ── Output pin ────────────────────────────────────────────────

/// Records every level written.  `None` until first write.
#[derive(Clone, Default)]
pub struct MockPin {
    history: Rc<RefCell<Vec<bool>>>,
}

#[allow(dead_code)]
impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> Option<bool> {
        self.history.borrow().last().copied()
    }

    pub fn is_high(&self) -> bool {
        self.level() == Some(true)
    }

    pub fn history(&self) -> Vec<bool> {
        self.history.borrow().clone()
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.history.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.history.borrow_mut().push(true);
        Ok(())
    }
}

// ── CO2 UART link ─────────────────────────────────────────────

/// How the simulated sensor answers a read request.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(dead_code)]
pub enum Co2Reply {
    Ppm(u16),
    Silent,
    /// Only the first `n` bytes of a valid reply arrive.
    Partial(usize),
    BadHeader,
}

#[derive(Default)]
struct LinkState {
    reply: Option<Co2Reply>,
    rx: VecDeque<u8>,
    sent: Vec<[u8; FRAME_LEN]>,
}

#[derive(Clone, Default)]
pub struct MockCo2Link {
    state: Rc<RefCell<LinkState>>,
}

#[allow(dead_code)]
impl MockCo2Link {
    pub fn answering(reply: Co2Reply) -> Self {
        let link = Self::default();
        link.set_reply(reply);
        link
    }

    pub fn set_reply(&self, reply: Co2Reply) {
        self.state.borrow_mut().reply = Some(reply);
    }

    pub fn sent(&self) -> Vec<[u8; FRAME_LEN]> {
        self.state.borrow().sent.clone()
    }

    /// Inject bytes as if they arrived late from an earlier request.
    pub fn inject(&self, bytes: &[u8]) {
        self.state.borrow_mut().rx.extend(bytes.iter().copied());
    }

    fn reply_frame(ppm: u16) -> [u8; FRAME_LEN] {
        let [hi, lo] = ppm.to_be_bytes();
        let mut f = [0xFF, CMD_READ_CO2, hi, lo, 0x40, 0x00, 0x00, 0x00, 0x00];
        f[8] = checksum(&f[1..8]);
        f
    }
}

impl Co2Link for MockCo2Link {
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        let mut st = self.state.borrow_mut();
        let mut f = [0u8; FRAME_LEN];
        f.copy_from_slice(frame);
        st.sent.push(f);
        if frame[2] != CMD_READ_CO2 {
            return Ok(());
        }
        match st.reply {
            Some(Co2Reply::Ppm(ppm)) => st.rx.extend(Self::reply_frame(ppm)),
            Some(Co2Reply::Partial(n)) => st.rx.extend(Self::reply_frame(400).into_iter().take(n)),
            Some(Co2Reply::BadHeader) => {
                let mut f = Self::reply_frame(400);
                f[1] = 0x99;
                st.rx.extend(f);
            }
            Some(Co2Reply::Silent) | None => {}
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> usize {
        self.state.borrow().rx.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let mut st = self.state.borrow_mut();
        let n = buf.len().min(st.rx.len());
        for (slot, byte) in buf.iter_mut().zip(st.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn discard_input(&mut self) {
        self.state.borrow_mut().rx.clear();
    }
}

// ── Climate sensor ────────────────────────────────────────────

#[derive(Clone)]
pub struct MockClimate {
    result: Rc<RefCell<Result<ClimateSample, SensorError>>>,
}

#[allow(dead_code)]
impl MockClimate {
    pub fn reading(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            result: Rc::new(RefCell::new(Ok(ClimateSample {
                temperature_c,
                humidity_pct,
            }))),
        }
    }

    pub fn set(&self, result: Result<ClimateSample, SensorError>) {
        *self.result.borrow_mut() = result;
    }
}

impl ClimateSensor for MockClimate {
    fn read(&mut self) -> Result<ClimateSample, SensorError> {
        *self.result.borrow()
    }
}

// ── Pressure sensor ───────────────────────────────────────────

struct BaroState {
    present: bool,
    pressure_pa: f32,
    begin_calls: u32,
    sampling_calls: u32,
}

#[derive(Clone)]
pub struct MockBaro {
    state: Rc<RefCell<BaroState>>,
}

#[allow(dead_code)]
impl MockBaro {
    pub fn present(pressure_pa: f32) -> Self {
        Self {
            state: Rc::new(RefCell::new(BaroState {
                present: true,
                pressure_pa,
                begin_calls: 0,
                sampling_calls: 0,
            })),
        }
    }

    pub fn absent() -> Self {
        let baro = Self::present(0.0);
        baro.set_present(false);
        baro
    }

    pub fn set_present(&self, present: bool) {
        self.state.borrow_mut().present = present;
    }

    pub fn begin_calls(&self) -> u32 {
        self.state.borrow().begin_calls
    }

    pub fn sampling_calls(&self) -> u32 {
        self.state.borrow().sampling_calls
    }
}

impl PressureSensor for MockBaro {
    fn begin(&mut self) -> Result<(), SensorError> {
        let mut st = self.state.borrow_mut();
        st.begin_calls += 1;
        if st.present { Ok(()) } else { Err(SensorError::NotPresent) }
    }

    fn apply_sampling(&mut self) -> Result<(), SensorError> {
        let mut st = self.state.borrow_mut();
        st.sampling_calls += 1;
        if st.present { Ok(()) } else { Err(SensorError::Bus) }
    }

    fn read_pressure_pa(&mut self) -> Result<f32, SensorError> {
        let st = self.state.borrow();
        if st.present { Ok(st.pressure_pa) } else { Err(SensorError::Bus) }
    }
}

// ── Transport ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockTransport {
    pub commands: VecDeque<heapless::String<32>>,
    pub connected: bool,
    pub fan_toggle: bool,
    pub pushed: Vec<TelemetrySnapshot>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    pub fn write_command(&mut self, raw: &str) {
        let mut s = heapless::String::new();
        s.push_str(raw).expect("command fits");
        self.commands.push_back(s);
    }
}

impl TransportPort for MockTransport {
    fn poll_command(&mut self) -> Option<heapless::String<32>> {
        self.commands.pop_front()
    }

    fn is_peer_connected(&self) -> bool {
        self.connected
    }

    fn push_snapshot(&mut self, snapshot: &TelemetrySnapshot) {
        self.pushed.push(*snapshot);
    }

    fn take_fan_toggle_request(&mut self) -> bool {
        core::mem::take(&mut self.fan_toggle)
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<NodeEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&NodeEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &NodeEvent) {
        self.events.push(event.clone());
    }
}

// ── Assembled node ────────────────────────────────────────────

pub type TestNode = NodeService<MockClimate, MockBaro, MockCo2Link, MockPin, MockPin>;

/// A node wired to mocks, with handles kept for inspection.
#[allow(dead_code)]
pub struct Rig {
    pub node: TestNode,
    pub clock: ManualClock,
    pub transport: MockTransport,
    pub sink: RecordingSink,
    pub climate: MockClimate,
    pub baro: MockBaro,
    pub co2: MockCo2Link,
    pub fan_pin: MockPin,
    pub cal_pin: MockPin,
    pub config: NodeConfig,
}

#[allow(dead_code)]
impl Rig {
    /// Short timings so tests stay readable: 2 s stabilization, 7 s pulse,
    /// 60 s preheat.
    pub fn test_config() -> NodeConfig {
        NodeConfig {
            stabilization_ms: 2_000,
            ..NodeConfig::default()
        }
    }

    pub fn new() -> Self {
        Self::with(Self::test_config(), MockBaro::present(101_325.0))
    }

    pub fn with(config: NodeConfig, baro: MockBaro) -> Self {
        let clock = ManualClock::new();
        let climate = MockClimate::reading(22.5, 45.0);
        let co2 = MockCo2Link::answering(Co2Reply::Ppm(400));
        let fan_pin = MockPin::new();
        let cal_pin = MockPin::new();

        let sensing = SensingCoordinator::new(
            climate.clone(),
            baro.clone(),
            co2.clone(),
            fan_pin.clone(),
            &config,
        );
        let calibration = CalibrationSequencer::new(cal_pin.clone(), &config);
        let node = NodeService::new(sensing, calibration, &config);

        Self {
            node,
            clock,
            transport: MockTransport::connected(),
            sink: RecordingSink::new(),
            climate,
            baro,
            co2,
            fan_pin,
            cal_pin,
            config,
        }
    }

    pub fn start(&mut self) {
        self.node.start(&self.clock, &mut self.sink);
    }

    pub fn tick(&mut self) {
        self.node
            .tick(&mut self.transport, &self.clock, &mut self.sink);
    }

    /// Set the clock to `ms` and run one tick.
    pub fn tick_at(&mut self, ms: u64) {
        self.clock.set(ms);
        self.tick();
    }
}
