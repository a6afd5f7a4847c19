//! Link configuration.
//!
//! Build-time tunables for the BLE peripheral link. The GATT layout
//! itself (UUIDs, buffer capacity) is fixed in [`crate::ble`]; only
//! the identity and advertising cadence are configurable.

use serde::{Deserialize, Serialize};

/// Advertised device name baked in at build time.
pub const DEVICE_NAME: &str = "STEM-BLE";

/// Tunables for the BLE link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// GAP device name included in the advertising payload.
    pub device_name: heapless::String<24>,
    /// Minimum advertising interval (0.625 ms units).
    pub adv_interval_min: u16,
    /// Maximum advertising interval (0.625 ms units).
    pub adv_interval_max: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        let mut device_name = heapless::String::new();
        // DEVICE_NAME fits the 24-byte cap; push cannot fail.
        let _ = device_name.push_str(DEVICE_NAME);
        Self {
            device_name,
            adv_interval_min: 0x20, // 20 ms
            adv_interval_max: 0x40, // 40 ms
        }
    }
}
