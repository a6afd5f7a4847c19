//! STEM lab BLE link: demo entry point.
//!
//! Brings the Bluedroid stack up, enables the link, and polls it the
//! way the lab UI does: log every state transition and dump each new
//! inbound payload as hex. A central that subscribes to notifications
//! and writes to the characteristic gets every byte echoed back
//! incremented by one.

#![deny(unused_must_use)]

use anyhow::Result;
use log::info;

use esp_idf_hal::delay::FreeRtos;

use stemlink::ble::channel::hex_preview;
use stemlink::ble::{espidf as ble, LinkState, RX_CAP};
use stemlink::config::LinkConfig;

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("stemlink v{}", env!("CARGO_PKG_VERSION"));

    let config = LinkConfig::default();
    info!("device name: {}", config.device_name);

    ble::init_once(config);
    ble::clear_last_rx();
    ble::set_enabled(true);

    let mut last_state = LinkState::Off;
    let mut last_len = 0usize;
    let mut rx = [0u8; RX_CAP];

    loop {
        FreeRtos::delay_ms(250);

        let state = ble::state();
        if state != last_state {
            last_state = state;
            info!(
                "link: {} name={} addr={}",
                state.as_str(),
                ble::device_name(),
                ble::address_string()
            );
        }

        let len = ble::last_rx_len();
        if len != last_len {
            last_len = len;
            if len > 0 {
                let n = ble::last_rx(&mut rx);
                info!("rx[{n}]: {}", hex_preview(&rx[..n]));
            }
        }
    }
}
