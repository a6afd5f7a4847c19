//! BLE peripheral link subsystem.
//!
//! One primary GATT service with a single write+notify characteristic
//! and its CCCD, one connection at a time, all of it gated by an
//! explicit enable flag that the application toggles at will.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Bluedroid task (espidf.rs)          Main loop (application) │
//! │  GAP/GATTS callbacks                 set_enabled / queries  │
//! │        │                                      │             │
//! │        ▼                                      ▼             │
//! │  LinkEvent ─────────▶ BleLink ◀────────── façade fns        │
//! │                      (link.rs)                              │
//! │                         │                                   │
//! │                      Effects ──▶ RadioPort (port.rs)        │
//! │                                   │                         │
//! │                                   ▼                         │
//! │              esp_ble_gap_* / esp_ble_gatts_* primitives     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The state machine in [`link::BleLink`] is pure: stack callbacks are
//! translated into [`events::LinkEvent`] values, dispatched under a
//! lock, and the returned [`events::Effect`] list is applied to the
//! radio *after* the lock is released. This keeps the Bluedroid
//! event-delivery path free of re-entrant locking and makes every race
//! rule testable on the host by injecting synthetic events.

pub mod channel;
pub mod events;
pub mod link;
pub mod port;
pub mod table;

#[cfg(target_os = "espidf")]
pub mod espidf;

pub use channel::DataChannel;
pub use events::{Effect, Effects, LinkEvent};
pub use link::BleLink;
pub use port::RadioPort;
pub use table::GattTable;

// ── Wire constants ────────────────────────────────────────────
//
// 16-bit UUIDs keep the service easy to poke at from any generic
// BLE scanner app.

/// Primary service UUID.
pub const SERVICE_UUID: u16 = 0x00FF;
/// Write+notify characteristic UUID.
pub const CHARACTERISTIC_UUID: u16 = 0xFF01;
/// Client Characteristic Configuration Descriptor (Bluetooth SIG).
pub const CCCD_UUID: u16 = 0x2902;

/// Inbound payload capacity in bytes. Longer writes are truncated,
/// never rejected and never overflowed.
pub const RX_CAP: usize = 64;

// ── Link state ────────────────────────────────────────────────

/// Externally observable state of the link.
///
/// Invariant: `Off` if and only if the enable gate is disabled; at
/// most one peer is ever attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    /// Gate disabled: no advertising, all I/O rejected.
    Off = 0,
    /// Gate enabled, no advertising in flight (transient).
    Idle = 1,
    /// Broadcasting, no peer attached.
    Advertising = 2,
    /// Exactly one peer attached.
    Connected = 3,
}

impl LinkState {
    /// Recover a state from its `u8` mirror (see the atomic state
    /// mirror in the espidf glue). Out-of-range values map to `Off`.
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Idle,
            2 => Self::Advertising,
            3 => Self::Connected,
            _ => Self::Off,
        }
    }

    /// Short label for status screens and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Idle => "IDLE",
            Self::Advertising => "ADV",
            Self::Connected => "CONN",
        }
    }
}
