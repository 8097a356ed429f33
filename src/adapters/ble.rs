//! BLE telemetry adapter.
//!
//! Implements [`TransportPort`] as a GATT server that exposes each reading
//! as a short text attribute and accepts commands on a writable one.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server via raw `esp_idf_svc::sys`.
//! - **all other targets**: in-memory simulation; host tests drive the
//!   inbox callbacks directly.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                   | Perms        |
//! |----------------|----------------------------------------|--------------|
//! | Temperature    | `beb5483e-…-ea07361b26a8`              | Read         |
//! | Pressure       | `cba1d466-…-189f80dd7518`              | Read         |
//! | Humidity       | `d2b2d3e1-…-ea07361b26a8`              | Read         |
//! | CO2            | `a1b2c3d4-…-1234567890ab`              | Read         |
//! | Calibrate      | `12345678-…-123456789abc`              | Read+Write   |
//! | System state   | `7d2a0001-…-ea07361b26a8`              | Read         |
//! | Fan state      | `7d2a0002-…-ea07361b26a8`              | Read         |
//! | Fan toggle     | `7d2a0003-…-ea07361b26a8`              | Write        |
//!
//! ## Threading
//!
//! GATT callbacks run in the Bluedroid task.  They never touch the node
//! core: writes land in a [`TransportInbox`] (bounded `embassy-sync`
//! channel plus atomics) which the control loop drains through the port.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::commands::READY_ACK;
use crate::app::events::{AttrString, TelemetrySnapshot};
use crate::app::ports::TransportPort;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x4fafc201_1fb5_459e_8fcc_c5c9c331914b;
pub const CHAR_TEMPERATURE: u128 = 0xbeb5483e_36e1_4688_b7f5_ea07361b26a8;
pub const CHAR_PRESSURE: u128 = 0xcba1d466_344c_4be3_ab3f_189f80dd7518;
pub const CHAR_HUMIDITY: u128 = 0xd2b2d3e1_36e1_4688_b7f5_ea07361b26a8;
pub const CHAR_CO2: u128 = 0xa1b2c3d4_5678_90ab_cdef_1234567890ab;
pub const CHAR_CALIBRATE: u128 = 0x12345678_1234_1234_1234_123456789abc;
pub const CHAR_SYSTEM_STATE: u128 = 0x7d2a0001_36e1_4688_b7f5_ea07361b26a8;
pub const CHAR_FAN_STATE: u128 = 0x7d2a0002_36e1_4688_b7f5_ea07361b26a8;
pub const CHAR_FAN_TOGGLE: u128 = 0x7d2a0003_36e1_4688_b7f5_ea07361b26a8;

/// Maximum accepted command write.
pub const MAX_COMMAND_LEN: usize = 32;
const COMMAND_DEPTH: usize = 4;

pub type CommandString = heapless::String<MAX_COMMAND_LEN>;

// ───────────────────────────────────────────────────────────────
// Inbox (callback context → control loop)
// ───────────────────────────────────────────────────────────────

/// Everything the radio callbacks are allowed to touch.
pub struct TransportInbox {
    commands: Channel<CriticalSectionRawMutex, CommandString, COMMAND_DEPTH>,
    connected: AtomicBool,
    fan_toggle: AtomicBool,
    /// The client overwrote the calibrate attribute in the GATT database.
    calibrate_written: AtomicBool,
}

impl Default for TransportInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportInbox {
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
            connected: AtomicBool::new(false),
            fan_toggle: AtomicBool::new(false),
            calibrate_written: AtomicBool::new(false),
        }
    }

    pub fn on_connected(&self) {
        self.connected.store(true, Ordering::Release);
        info!("BLE: central connected");
    }

    pub fn on_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
        info!("BLE: central disconnected");
    }

    /// Queue a write to the calibrate attribute.  Returns `false` when the
    /// payload is dropped (not UTF-8, too long, or inbox full).
    pub fn on_command_write(&self, raw: &[u8]) -> bool {
        let queued = self.queue_command(raw);
        // Set after queueing so the reset never lands before its command.
        self.calibrate_written.store(true, Ordering::Release);
        queued
    }

    fn queue_command(&self, raw: &[u8]) -> bool {
        let Ok(text) = core::str::from_utf8(raw) else {
            warn!("BLE: command write is not UTF-8 ({} bytes)", raw.len());
            return false;
        };
        let mut cmd = CommandString::new();
        if cmd.push_str(text).is_err() {
            warn!("BLE: command write too long ({} bytes)", raw.len());
            return false;
        }
        if self.commands.try_send(cmd).is_err() {
            warn!("BLE: command inbox full, dropping write");
            return false;
        }
        true
    }

    /// Any write to the fan-toggle attribute counts as one request.
    pub fn on_fan_toggle_write(&self) {
        self.fan_toggle.store(true, Ordering::Release);
    }

    fn take_command(&self) -> Option<CommandString> {
        self.commands.try_receive().ok()
    }

    fn take_calibrate_written(&self) -> bool {
        self.calibrate_written.swap(false, Ordering::AcqRel)
    }

    fn take_fan_toggle(&self) -> bool {
        self.fan_toggle.swap(false, Ordering::AcqRel)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Inbox shared with the Bluedroid callbacks on the device.
pub static BLE_INBOX: TransportInbox = TransportInbox::new();

// ───────────────────────────────────────────────────────────────
// Attribute table
// ───────────────────────────────────────────────────────────────

/// Index of each characteristic in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Attr {
    Temperature = 0,
    Pressure = 1,
    Humidity = 2,
    Co2 = 3,
    Calibrate = 4,
    SystemState = 5,
    FanState = 6,
    FanToggle = 7,
}

const ATTR_COUNT: usize = 8;
#[cfg(target_os = "espidf")]
const ATTR_MAX_LEN: u16 = 16;

#[cfg(target_os = "espidf")]
const ATTR_UUIDS: [u128; ATTR_COUNT] = [
    CHAR_TEMPERATURE,
    CHAR_PRESSURE,
    CHAR_HUMIDITY,
    CHAR_CO2,
    CHAR_CALIBRATE,
    CHAR_SYSTEM_STATE,
    CHAR_FAN_STATE,
    CHAR_FAN_TOGGLE,
];

/// Local copy of every attribute value; the device pushes each change into
/// the GATT database as well.
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    values: [AttrString; ATTR_COUNT],
}

impl AttributeTable {
    pub fn get(&self, attr: Attr) -> &str {
        self.values[attr as usize].as_str()
    }

    fn set(&mut self, attr: Attr, value: &str) -> bool {
        let slot = &mut self.values[attr as usize];
        if slot.as_str() == value {
            return false;
        }
        slot.clear();
        let _ = slot.push_str(value);
        true
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF Bluedroid glue
// ───────────────────────────────────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. These atomics carry the handles from the callbacks to the
// adapter.

#[cfg(target_os = "espidf")]
use core::sync::atomic::AtomicU32;

#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_HANDLES: [AtomicU32; ATTR_COUNT] = [const { AtomicU32::new(0) }; ATTR_COUNT];

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    unsafe {
        t.uuid.uuid128 = uuid.to_le_bytes();
    }
    t
}

#[cfg(target_os = "espidf")]
fn attr_perms(index: usize) -> (u32, u32) {
    use esp_idf_svc::sys::*;
    if index == Attr::Calibrate as usize {
        (
            ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE,
            ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_WRITE,
        )
    } else if index == Attr::FanToggle as usize {
        (ESP_GATT_PERM_WRITE, ESP_GATT_CHAR_PROP_BIT_WRITE)
    } else {
        (ESP_GATT_PERM_READ, ESP_GATT_CHAR_PROP_BIT_READ)
    }
}

/// Register characteristic `index`.  The stack keeps the value and answers
/// reads itself.
#[cfg(target_os = "espidf")]
unsafe fn add_gatt_char(svc_handle: u16, index: usize) {
    use esp_idf_svc::sys::*;
    let (perm, prop) = attr_perms(index);
    let mut char_uuid = uuid128_to_esp(ATTR_UUIDS[index]);
    let mut initial = *b"READY";
    let mut value = esp_attr_value_t {
        attr_max_len: ATTR_MAX_LEN,
        attr_len: if index == Attr::Calibrate as usize { initial.len() as u16 } else { 0 },
        attr_value: initial.as_mut_ptr(),
    };
    let mut control = esp_attr_control_t {
        auto_rsp: ESP_GATT_AUTO_RSP as u8,
    };
    unsafe {
        esp_ble_gatts_add_char(
            svc_handle,
            &mut char_uuid,
            perm as esp_gatt_perm_t,
            prop as esp_gatt_char_prop_t,
            &mut value,
            &mut control,
        );
    }
}

#[cfg(target_os = "espidf")]
unsafe fn start_advertising() {
    use esp_idf_svc::sys::*;
    let mut adv_params = esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    };
    unsafe {
        esp_ble_gap_start_advertising(&mut adv_params);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use core::sync::atomic::Ordering::Relaxed;
    use esp_idf_svc::sys::*;

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: uuid128_to_esp(SERVICE_UUID),
                    inst_id: 0,
                },
                is_primary: true,
            };
            // Service declaration + (declaration, value) per characteristic.
            unsafe {
                esp_ble_gatts_create_service(gatts_if, &mut svc_id, (1 + 2 * ATTR_COUNT) as u16);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let svc_handle = unsafe { (*param).create.service_handle };
            BLE_SVC_HANDLE.store(u32::from(svc_handle), Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            BLE_CHAR_STEP.store(0, Relaxed);
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
                add_gatt_char(svc_handle, 0);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let handle = unsafe { (*param).add_char.attr_handle };
            let step = BLE_CHAR_STEP.load(Relaxed) as usize;
            if step >= ATTR_COUNT {
                return;
            }
            BLE_CHAR_HANDLES[step].store(u32::from(handle), Relaxed);
            log::info!("BLE GATTS: char {} (handle={})", step, handle);

            let next = step + 1;
            BLE_CHAR_STEP.store(next as u32, Relaxed);
            if next < ATTR_COUNT {
                let svc_handle = BLE_SVC_HANDLE.load(Relaxed) as u16;
                unsafe { add_gatt_char(svc_handle, next) };
            } else {
                log::info!("BLE GATTS: all characteristics registered");
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            BLE_INBOX.on_connected();
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_INBOX.on_disconnected();
            unsafe { start_advertising() };
            log::info!("BLE GATTS: advertising restarted");
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            let handle = u32::from(p.handle);
            let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };

            if handle == BLE_CHAR_HANDLES[Attr::Calibrate as usize].load(Relaxed) {
                BLE_INBOX.on_command_write(data);
            } else if handle == BLE_CHAR_HANDLES[Attr::FanToggle as usize].load(Relaxed) {
                BLE_INBOX.on_fan_toggle_write();
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE transport
// ───────────────────────────────────────────────────────────────

pub struct BleTransport {
    inbox: &'static TransportInbox,
    device_name: heapless::String<24>,
    attrs: AttributeTable,
    #[cfg(not(target_os = "espidf"))]
    sim_writes: heapless::Vec<(Attr, AttrString), 16>,
}

impl BleTransport {
    pub fn new(inbox: &'static TransportInbox, device_name: heapless::String<24>) -> Self {
        let mut attrs = AttributeTable::default();
        attrs.set(Attr::Calibrate, READY_ACK);
        Self {
            inbox,
            device_name,
            attrs,
            #[cfg(not(target_os = "espidf"))]
            sim_writes: heapless::Vec::new(),
        }
    }

    /// Bring up the radio and start advertising.
    pub fn start(&mut self) -> crate::error::Result<()> {
        info!("BLE: starting advertising as '{}'", self.device_name);
        self.platform_start()
    }

    pub fn attributes(&self) -> &AttributeTable {
        &self.attrs
    }

    fn set_attr(&mut self, attr: Attr, value: &str) {
        if self.attrs.set(attr, value) {
            self.platform_set_attr(attr, value);
        }
    }

    /// Restore `READY` in the GATT database after a client write.  The
    /// local copy never saw the written value, so this bypasses the
    /// change check.
    fn reset_calibrate_attr(&mut self) {
        self.attrs.set(Attr::Calibrate, READY_ACK);
        self.platform_set_attr(Attr::Calibrate, READY_ACK);
    }

    /// Attribute writes the simulated radio has published, oldest first.
    /// Keeps the most recent 16.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_writes(&self) -> &[(Attr, AttrString)] {
        &self.sim_writes
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> crate::error::Result<()> {
        use crate::error::Error;
        use esp_idf_svc::sys::*;

        let check = |ret: esp_err_t, stage: &'static str| {
            if ret == ESP_OK as esp_err_t {
                Ok(())
            } else {
                log::error!("BLE: {} failed ({})", stage, ret);
                Err(Error::Init(stage))
            }
        };

        unsafe {
            // BLE-only mode frees the classic BT controller memory.
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            check(esp_bt_controller_init(&mut bt_cfg), "bt_controller_init")?;
            check(
                esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE),
                "bt_controller_enable",
            )?;
            check(esp_bluedroid_init(), "bluedroid_init")?;
            check(esp_bluedroid_enable(), "bluedroid_enable")?;

            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
            esp_ble_gatts_app_register(0);

            let mut name = [0u8; 25];
            name[..self.device_name.len()].copy_from_slice(self.device_name.as_bytes());
            esp_ble_gap_set_device_name(name.as_ptr() as *const _);

            start_advertising();
        }
        info!(
            "BLE(espidf): Bluedroid stack initialized, advertising as '{}'",
            self.device_name
        );
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> crate::error::Result<()> {
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            self.device_name, SERVICE_UUID
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_set_attr(&mut self, attr: Attr, value: &str) {
        use core::sync::atomic::Ordering::Relaxed;
        let handle = BLE_CHAR_HANDLES[attr as usize].load(Relaxed);
        if handle == 0 {
            return;
        }
        let ret = unsafe {
            esp_idf_svc::sys::esp_ble_gatts_set_attr_value(
                handle as u16,
                value.len() as u16,
                value.as_ptr(),
            )
        };
        if ret != esp_idf_svc::sys::ESP_OK as esp_idf_svc::sys::esp_err_t {
            warn!("BLE: set_attr_value({:?}) failed ({})", attr, ret);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_set_attr(&mut self, attr: Attr, value: &str) {
        log::debug!("BLE(sim): {:?} = {}", attr, value);
        if self.sim_writes.is_full() {
            self.sim_writes.remove(0);
        }
        let mut stored = AttrString::new();
        let _ = stored.push_str(value);
        let _ = self.sim_writes.push((attr, stored));
    }
}

// ───────────────────────────────────────────────────────────────
// TransportPort implementation
// ───────────────────────────────────────────────────────────────

impl TransportPort for BleTransport {
    fn poll_command(&mut self) -> Option<CommandString> {
        let cmd = self.inbox.take_command();
        // The client reads the attribute back to see that it was consumed.
        // Dropped writes are cleared the same way.
        if self.inbox.take_calibrate_written() {
            self.reset_calibrate_attr();
        }
        cmd
    }

    fn is_peer_connected(&self) -> bool {
        self.inbox.is_connected()
    }

    fn push_snapshot(&mut self, snapshot: &TelemetrySnapshot) {
        self.set_attr(Attr::Temperature, &snapshot.temperature_attr());
        self.set_attr(Attr::Pressure, &snapshot.pressure_attr());
        self.set_attr(Attr::Humidity, &snapshot.humidity_attr());
        self.set_attr(Attr::Co2, &snapshot.co2_attr());
        self.set_attr(Attr::SystemState, snapshot.state_attr());
        self.set_attr(Attr::FanState, snapshot.fan_attr());
    }

    fn take_fan_toggle_request(&mut self) -> bool {
        self.inbox.take_fan_toggle()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
