//! Radio stack port: the boundary the link core drives.
//!
//! Implementations:
//! - `BluedroidRadio` (espidf.rs) issues the real
//!   `esp_ble_gap_*`/`esp_ble_gatts_*` calls.
//! - `MockRadio` (tests) records every call for assertions.
//!
//! All methods are fire-and-forget: failures are reported by the stack
//! through a later [`crate::ble::LinkEvent`], or logged and dropped.

use crate::ble::events::{Effect, Effects};

/// Primitive calls into the underlying radio/link-layer stack.
pub trait RadioPort {
    fn create_service(&mut self);
    fn start_service(&mut self, service: u16);
    fn add_characteristic(&mut self, service: u16);
    fn add_cccd(&mut self, service: u16);
    fn start_advertising(&mut self);
    fn stop_advertising(&mut self);
    fn close_connection(&mut self, conn_id: u16);
    fn notify(&mut self, conn_id: u16, handle: u16, payload: &[u8]);
    /// Public device address, if the controller has one yet.
    fn address(&self) -> Option<[u8; 6]>;
}

/// Apply a transition's effect list to the radio, in order.
pub fn apply_effects(radio: &mut impl RadioPort, effects: &Effects) {
    for effect in effects {
        match effect {
            Effect::CreateService => radio.create_service(),
            Effect::StartService { service } => radio.start_service(*service),
            Effect::AddCharacteristic { service } => radio.add_characteristic(*service),
            Effect::AddCccd { service } => radio.add_cccd(*service),
            Effect::StartAdvertising => radio.start_advertising(),
            Effect::StopAdvertising => radio.stop_advertising(),
            Effect::CloseConnection { conn_id } => radio.close_connection(*conn_id),
            Effect::Notify {
                conn_id,
                handle,
                payload,
            } => radio.notify(*conn_id, *handle, payload),
        }
    }
}

/// Format a device address as six uppercase hex octet pairs joined by
/// `:`. `None` (address not yet available) yields the all-zero
/// placeholder.
pub fn format_address(addr: Option<[u8; 6]>) -> heapless::String<17> {
    use core::fmt::Write;
    let a = addr.unwrap_or([0; 6]);
    let mut out = heapless::String::new();
    // 17 bytes exactly; write! cannot fail.
    let _ = write!(
        out,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        a[0], a[1], a[2], a[3], a[4], a[5]
    );
    out
}
