//! Bidirectional data channel: write-in, notify-out.
//!
//! Owns the notify-subscription flag and the most recent inbound
//! payload. The outbound reply is the inbound payload with every byte
//! incremented by one modulo 256, same length, sent as an
//! unacknowledged notification.

use log::info;

use crate::ble::RX_CAP;

/// CCCD value that enables notifications. Any other value,
/// including `0x0000` and the indication bit, disables them.
const CCCD_NOTIFY_ENABLE: u16 = 0x0001;

/// Inbound buffer + notify flag for the single characteristic.
#[derive(Debug)]
pub struct DataChannel {
    notify_enabled: bool,
    rx: heapless::Vec<u8, RX_CAP>,
}

impl DataChannel {
    pub fn new() -> Self {
        Self {
            notify_enabled: false,
            rx: heapless::Vec::new(),
        }
    }

    pub fn notify_enabled(&self) -> bool {
        self.notify_enabled
    }

    /// Most recent inbound payload (possibly truncated at write time).
    pub fn rx_payload(&self) -> &[u8] {
        &self.rx
    }

    pub fn rx_len(&self) -> usize {
        self.rx.len()
    }

    /// Decode a CCCD write. The caller has already checked the payload
    /// is at least two bytes; the first two are little-endian.
    pub fn on_cccd_write(&mut self, payload: &[u8]) {
        let value = u16::from_le_bytes([payload[0], payload[1]]);
        self.notify_enabled = value == CCCD_NOTIFY_ENABLE;
        info!("ble: CCCD={value:#06x} notify={}", self.notify_enabled);
    }

    /// Store an inbound characteristic write, overwriting the previous
    /// payload. Oversized payloads are truncated silently to capacity.
    pub fn store(&mut self, payload: &[u8]) {
        let take = payload.len().min(RX_CAP);
        self.rx.clear();
        // Truncated to capacity above; extend cannot fail.
        let _ = self.rx.extend_from_slice(&payload[..take]);
        info!("ble: RX {}", hex_preview(&self.rx));
    }

    /// Compute the reply for the buffered payload: byte-wise +1 mod
    /// 256, same length. Empty when nothing has been received.
    pub fn reply(&self) -> heapless::Vec<u8, RX_CAP> {
        self.rx.iter().map(|b| b.wrapping_add(1)).collect()
    }

    /// New connection or disconnection: the subscription does not
    /// survive, the buffer does.
    pub fn reset_notify(&mut self) {
        self.notify_enabled = false;
    }

    /// Drop the buffered payload (UI reset, enable/disable edges).
    pub fn clear_rx(&mut self) {
        self.rx.clear();
    }

    /// Full logical reset on a gate edge.
    pub fn reset(&mut self) {
        self.notify_enabled = false;
        self.rx.clear();
    }
}

impl Default for DataChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Spaced uppercase hex of the first 16 bytes, for logs and the status
/// screen.
pub fn hex_preview(bytes: &[u8]) -> heapless::String<48> {
    use core::fmt::Write;
    let mut out = heapless::String::new();
    for b in bytes.iter().take(16) {
        let _ = write!(out, "{b:02X} ");
    }
    out
}
