//! Bluedroid glue: the espidf-only radio stack adapter.
//!
//! Bridges the pure [`BleLink`] machine to the ESP-IDF Bluedroid
//! stack. Bluedroid delivers GAP/GATTS events through C function
//! pointers that cannot capture Rust closures, so the link lives in a
//! process-wide `Mutex` with atomic mirrors for the scalar queries:
//!
//! - GATTS/GAP callbacks run serially on the Bluedroid task (not an
//!   ISR), so a std `Mutex` is safe there.
//! - The application loop reads `state`/`is_enabled`/`last_rx_len`
//!   from atomics without touching the lock.
//! - Effects are applied to the stack only after the lock is dropped,
//!   so a synchronously proxied confirmation cannot deadlock.
//!
//! There is exactly one radio, so this module is the runtime singleton
//! guard: `init_once` executes side effects on the first call only.

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;

use log::{info, warn};

use esp_idf_svc::sys::{self as sys};

use crate::ble::events::LinkEvent;
use crate::ble::link::BleLink;
use crate::ble::port::{apply_effects, format_address, RadioPort};
use crate::ble::{LinkState, CCCD_UUID, CHARACTERISTIC_UUID, RX_CAP, SERVICE_UUID};
use crate::config::LinkConfig;

// ── Shared state ──────────────────────────────────────────────

static LINK: Mutex<Option<BleLink>> = Mutex::new(None);
static INITED: AtomicBool = AtomicBool::new(false);

// GATT interface assigned by the stack at registration.
static GATTS_IF: AtomicU8 = AtomicU8::new(sys::ESP_GATT_IF_NONE as u8);

// Lock-free mirrors of the scalar link state, refreshed after every
// transition while still under the link lock.
static STATE: AtomicU8 = AtomicU8::new(LinkState::Off as u8);
static ENABLED: AtomicBool = AtomicBool::new(false);
static LAST_RX_LEN: AtomicUsize = AtomicUsize::new(0);

// Advertising interval window, captured from the config at init so
// the radio impl does not need the link lock.
static ADV_INT_MIN: AtomicU16 = AtomicU16::new(0x20);
static ADV_INT_MAX: AtomicU16 = AtomicU16::new(0x40);

fn lock_link() -> std::sync::MutexGuard<'static, Option<BleLink>> {
    // A poisoned lock only means a panic elsewhere already unwound;
    // the link data itself is fine to keep serving.
    LINK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn sync_mirrors(link: &BleLink) {
    STATE.store(link.state() as u8, Ordering::Release);
    ENABLED.store(link.is_enabled(), Ordering::Release);
    LAST_RX_LEN.store(link.last_rx_len(), Ordering::Release);
}

/// Feed one event through the machine and apply the resulting radio
/// calls outside the lock.
fn dispatch(event: LinkEvent<'_>) {
    let fx = {
        let mut guard = lock_link();
        let Some(link) = guard.as_mut() else {
            warn!("ble(espidf): event before init dropped");
            return;
        };
        let fx = link.handle(event);
        sync_mirrors(link);
        fx
    };
    apply_effects(&mut BluedroidRadio, &fx);
}

// ── Error check helper ────────────────────────────────────────

/// Log-and-degrade on ESP-IDF status codes: the subsystem stays
/// non-functional on failure but never takes the process down.
fn check(ret: sys::esp_err_t, what: &str) {
    if ret != sys::ESP_OK as sys::esp_err_t {
        warn!("ble(espidf): {what} err={ret}");
    }
}

// ── Radio primitives ──────────────────────────────────────────

fn uuid16(uuid: u16) -> sys::esp_bt_uuid_t {
    let mut t: sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = sys::ESP_UUID_LEN_16 as u16;
    t.uuid.uuid16 = uuid;
    t
}

// Initial CCCD value: notifications off. Bluedroid copies the bytes
// at creation time and never writes back through this pointer.
static mut CCCD_DEFAULT: [u8; 2] = [0x00, 0x00];

/// [`RadioPort`] backed by the Bluedroid GAP/GATTS C API.
struct BluedroidRadio;

impl RadioPort for BluedroidRadio {
    fn create_service(&mut self) {
        let gatts_if = GATTS_IF.load(Ordering::Relaxed);
        let mut svc_id = sys::esp_gatt_srvc_id_t {
            id: sys::esp_gatt_id_t {
                uuid: uuid16(SERVICE_UUID),
                inst_id: 0,
            },
            is_primary: true,
        };
        // 8 attribute handles: service + char decl/value + CCCD, with
        // headroom.
        unsafe {
            check(
                sys::esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8),
                "create_service",
            );
        }
    }

    fn start_service(&mut self, service: u16) {
        unsafe {
            check(sys::esp_ble_gatts_start_service(service), "start_service");
        }
    }

    fn add_characteristic(&mut self, service: u16) {
        let mut uuid = uuid16(CHARACTERISTIC_UUID);
        let mut val: sys::esp_attr_value_t = unsafe { core::mem::zeroed() };
        val.attr_max_len = RX_CAP as u16;
        unsafe {
            check(
                sys::esp_ble_gatts_add_char(
                    service,
                    &mut uuid,
                    sys::ESP_GATT_PERM_WRITE as sys::esp_gatt_perm_t,
                    (sys::ESP_GATT_CHAR_PROP_BIT_WRITE | sys::ESP_GATT_CHAR_PROP_BIT_NOTIFY)
                        as sys::esp_gatt_char_prop_t,
                    &mut val,
                    core::ptr::null_mut(),
                ),
                "add_char",
            );
        }
    }

    fn add_cccd(&mut self, service: u16) {
        let mut uuid = uuid16(CCCD_UUID);
        let mut val: sys::esp_attr_value_t = unsafe { core::mem::zeroed() };
        val.attr_max_len = 2;
        val.attr_len = 2;
        // SAFETY: the stack reads the initial value during creation
        // and does not retain the pointer.
        val.attr_value = unsafe { core::ptr::addr_of_mut!(CCCD_DEFAULT).cast() };
        unsafe {
            check(
                sys::esp_ble_gatts_add_char_descr(
                    service,
                    &mut uuid,
                    (sys::ESP_GATT_PERM_READ | sys::ESP_GATT_PERM_WRITE) as sys::esp_gatt_perm_t,
                    &mut val,
                    core::ptr::null_mut(),
                ),
                "add_char_descr",
            );
        }
    }

    fn start_advertising(&mut self) {
        let mut adv_params: sys::esp_ble_adv_params_t = unsafe { core::mem::zeroed() };
        adv_params.adv_int_min = ADV_INT_MIN.load(Ordering::Relaxed);
        adv_params.adv_int_max = ADV_INT_MAX.load(Ordering::Relaxed);
        adv_params.adv_type = sys::esp_ble_adv_type_t_ADV_TYPE_IND;
        adv_params.own_addr_type = sys::esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC;
        adv_params.channel_map = sys::esp_ble_adv_channel_t_ADV_CHNL_ALL;
        adv_params.adv_filter_policy =
            sys::esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY;
        unsafe {
            check(
                sys::esp_ble_gap_start_advertising(&mut adv_params),
                "start_advertising",
            );
        }
    }

    fn stop_advertising(&mut self) {
        unsafe {
            check(sys::esp_ble_gap_stop_advertising(), "stop_advertising");
        }
    }

    fn close_connection(&mut self, conn_id: u16) {
        let gatts_if = GATTS_IF.load(Ordering::Relaxed);
        unsafe {
            check(sys::esp_ble_gatts_close(gatts_if, conn_id), "close");
        }
    }

    fn notify(&mut self, conn_id: u16, handle: u16, payload: &[u8]) {
        let gatts_if = GATTS_IF.load(Ordering::Relaxed);
        unsafe {
            // need_confirm=false: notification, not indication.
            check(
                sys::esp_ble_gatts_send_indicate(
                    gatts_if,
                    conn_id,
                    handle,
                    payload.len() as u16,
                    payload.as_ptr() as *mut u8,
                    false,
                ),
                "send_notify",
            );
        }
    }

    fn address(&self) -> Option<[u8; 6]> {
        let bda = unsafe { sys::esp_bt_dev_get_address() };
        if bda.is_null() {
            return None;
        }
        let mut out = [0u8; 6];
        unsafe {
            core::ptr::copy_nonoverlapping(bda, out.as_mut_ptr(), 6);
        }
        Some(out)
    }
}

// ── GAP / GATTS callbacks ─────────────────────────────────────

unsafe extern "C" fn gap_handler(
    event: sys::esp_gap_ble_cb_event_t,
    param: *mut sys::esp_ble_gap_cb_param_t,
) {
    match event {
        sys::esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_SET_COMPLETE_EVT => {
            // Advertising is driven by the enable gate, never started
            // from here.
            info!("ble(espidf): adv data set");
        }
        sys::esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            let status = unsafe { (*param).adv_start_cmpl.status };
            let ok = status == sys::esp_bt_status_t_ESP_BT_STATUS_SUCCESS;
            dispatch(LinkEvent::AdvertisingStarted { ok });
        }
        sys::esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            dispatch(LinkEvent::AdvertisingStopped);
        }
        _ => {}
    }
}

/// Push the configured identity into the stack: device name and the
/// advertising payload (name + TX power, general discoverable,
/// BR/EDR not supported).
fn configure_identity() {
    let (name, int_min, int_max) = {
        let guard = lock_link();
        match guard.as_ref() {
            Some(link) => {
                let c = link.config();
                (
                    c.device_name.clone(),
                    c.adv_interval_min,
                    c.adv_interval_max,
                )
            }
            None => return,
        }
    };

    // NUL-terminated copy for the C API.
    let mut cname = [0u8; 25];
    let n = name.len().min(cname.len() - 1);
    cname[..n].copy_from_slice(&name.as_bytes()[..n]);

    let mut adv_data: sys::esp_ble_adv_data_t = unsafe { core::mem::zeroed() };
    adv_data.set_scan_rsp = false;
    adv_data.include_name = true;
    adv_data.include_txpower = true;
    adv_data.min_interval = i32::from(int_min);
    adv_data.max_interval = i32::from(int_max);
    adv_data.flag = (sys::ESP_BLE_ADV_FLAG_GEN_DISC | sys::ESP_BLE_ADV_FLAG_BREDR_NOT_SPT) as u8;

    unsafe {
        check(
            sys::esp_ble_gap_set_device_name(cname.as_ptr().cast()),
            "set_device_name",
        );
        check(sys::esp_ble_gap_config_adv_data(&mut adv_data), "config_adv_data");
    }
}

unsafe extern "C" fn gatts_handler(
    event: sys::esp_gatts_cb_event_t,
    gatts_if: sys::esp_gatt_if_t,
    param: *mut sys::esp_ble_gatts_cb_param_t,
) {
    match event {
        sys::esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            info!("ble(espidf): gatts registered (if={gatts_if})");
            GATTS_IF.store(gatts_if, Ordering::Relaxed);
            configure_identity();
            dispatch(LinkEvent::Registered);
        }
        sys::esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let p = unsafe { &(*param).create };
            dispatch(LinkEvent::ServiceCreated {
                ok: p.status == sys::esp_gatt_status_t_ESP_GATT_OK,
                handle: p.service_handle,
            });
        }
        sys::esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let p = unsafe { &(*param).add_char };
            dispatch(LinkEvent::CharacteristicAdded {
                ok: p.status == sys::esp_gatt_status_t_ESP_GATT_OK,
                handle: p.attr_handle,
            });
        }
        sys::esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            let p = unsafe { &(*param).add_char_descr };
            dispatch(LinkEvent::DescriptorAdded {
                ok: p.status == sys::esp_gatt_status_t_ESP_GATT_OK,
                handle: p.attr_handle,
            });
        }
        sys::esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let p = unsafe { &(*param).connect };
            dispatch(LinkEvent::Connected {
                conn_id: p.conn_id,
                peer: p.remote_bda,
            });
        }
        sys::esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            let p = unsafe { &(*param).disconnect };
            dispatch(LinkEvent::Disconnected {
                reason: p.reason as u8,
            });
        }
        sys::esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            if p.is_prep {
                // Prepared writes are not part of the contract.
                return;
            }
            let payload = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };
            dispatch(LinkEvent::Write {
                handle: p.handle,
                payload,
            });
        }
        _ => {}
    }
}

// ── Public façade ─────────────────────────────────────────────

/// One-time stack bring-up and GATT table construction. Idempotent:
/// side effects run on the first call only. Failures are logged and
/// leave the subsystem inactive; nothing panics.
pub fn init_once(config: LinkConfig) {
    if INITED.swap(true, Ordering::SeqCst) {
        return;
    }

    ADV_INT_MIN.store(config.adv_interval_min, Ordering::Relaxed);
    ADV_INT_MAX.store(config.adv_interval_max, Ordering::Relaxed);
    {
        let mut guard = lock_link();
        let link = BleLink::new(config);
        sync_mirrors(&link);
        *guard = Some(link);
    }

    unsafe {
        // NVS backs Bluedroid's internal storage.
        let err = sys::nvs_flash_init();
        if err == sys::ESP_ERR_NVS_NO_FREE_PAGES as i32
            || err == sys::ESP_ERR_NVS_NEW_VERSION_FOUND as i32
        {
            check(sys::nvs_flash_erase(), "nvs_flash_erase");
            check(sys::nvs_flash_init(), "nvs_flash_init");
        } else {
            check(err, "nvs_flash_init");
        }

        let mut bt_cfg = sys::esp_bt_controller_config_t::default();
        check(sys::esp_bt_controller_init(&mut bt_cfg), "controller_init");
        check(
            sys::esp_bt_controller_enable(sys::esp_bt_mode_t_ESP_BT_MODE_BLE),
            "controller_enable",
        );
        check(sys::esp_bluedroid_init(), "bluedroid_init");
        check(sys::esp_bluedroid_enable(), "bluedroid_enable");

        check(
            sys::esp_ble_gap_register_callback(Some(gap_handler)),
            "gap_register",
        );
        check(
            sys::esp_ble_gatts_register_callback(Some(gatts_handler)),
            "gatts_register",
        );
        check(sys::esp_ble_gatts_app_register(0), "app_register");
    }

    info!("ble(espidf): stack initialised (disabled)");
}

/// Flip the enable gate. Initialises the stack on first use.
pub fn set_enabled(enabled: bool) {
    if !INITED.load(Ordering::SeqCst) {
        init_once(LinkConfig::default());
    }
    let fx = {
        let mut guard = lock_link();
        let Some(link) = guard.as_mut() else { return };
        let fx = link.set_enabled(enabled);
        sync_mirrors(link);
        fx
    };
    apply_effects(&mut BluedroidRadio, &fx);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Acquire)
}

pub fn state() -> LinkState {
    LinkState::from_u8(STATE.load(Ordering::Acquire))
}

/// Advertised device name.
pub fn device_name() -> heapless::String<24> {
    let guard = lock_link();
    match guard.as_ref() {
        Some(link) => link.config().device_name.clone(),
        None => LinkConfig::default().device_name,
    }
}

/// Controller address as `AA:BB:CC:DD:EE:FF`; all zeros until the
/// controller is up.
pub fn address_string() -> heapless::String<17> {
    format_address(BluedroidRadio.address())
}

/// Copy the most recent inbound payload into `out`; returns the number
/// of bytes copied.
pub fn last_rx(out: &mut [u8]) -> usize {
    let guard = lock_link();
    let Some(link) = guard.as_ref() else { return 0 };
    let rx = link.last_rx();
    let n = rx.len().min(out.len());
    out[..n].copy_from_slice(&rx[..n]);
    n
}

pub fn last_rx_len() -> usize {
    LAST_RX_LEN.load(Ordering::Acquire)
}

pub fn clear_last_rx() {
    let mut guard = lock_link();
    if let Some(link) = guard.as_mut() {
        link.clear_last_rx();
        sync_mirrors(link);
    }
}
