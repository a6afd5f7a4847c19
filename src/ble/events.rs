//! Event and effect vocabulary of the link state machine.
//!
//! Stack callbacks are translated into [`LinkEvent`] values and fed to
//! [`crate::ble::BleLink::handle`]; the machine answers with a bounded
//! list of [`Effect`]s, the primitive radio calls to issue. The caller
//! applies them *after* dropping the link lock, so the stack can proxy
//! a confirmation synchronously without deadlocking.
//!
//! Keeping both directions as plain data is what makes the
//! re-check-the-gate-at-completion-time rules testable: a test injects
//! any event sequence and asserts on the exact effect history.

use crate::ble::RX_CAP;

/// Asynchronous events delivered by the radio stack.
///
/// The stack delivers these serially from its own task; they are never
/// concurrent with each other. `Write` borrows the stack-owned payload
/// to avoid a copy on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent<'a> {
    /// GATT application registered; the table build may begin.
    Registered,
    /// Service creation completed.
    ServiceCreated { ok: bool, handle: u16 },
    /// Characteristic creation completed.
    CharacteristicAdded { ok: bool, handle: u16 },
    /// CCCD creation completed; the table is ready on success.
    DescriptorAdded { ok: bool, handle: u16 },
    /// Advertising start request completed.
    AdvertisingStarted { ok: bool },
    /// Advertising stop request completed.
    AdvertisingStopped,
    /// A central connected.
    Connected { conn_id: u16, peer: [u8; 6] },
    /// The connection dropped. `reason` is the stack's HCI reason code,
    /// logged only, no retry policy lives here.
    Disconnected { reason: u8 },
    /// Attribute write from the peer.
    Write { handle: u16, payload: &'a [u8] },
}

/// Fire-and-forget radio primitives requested by the state machine.
///
/// Completion (where the stack reports one) arrives later as a
/// [`LinkEvent`]; nothing blocks waiting for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Create the primary service.
    CreateService,
    /// Start the created service.
    StartService { service: u16 },
    /// Add the write+notify characteristic to the service.
    AddCharacteristic { service: u16 },
    /// Add the CCCD under the characteristic.
    AddCccd { service: u16 },
    /// Begin advertising.
    StartAdvertising,
    /// Stop advertising.
    StopAdvertising,
    /// Forcibly close the given connection.
    CloseConnection { conn_id: u16 },
    /// Send an unacknowledged notification on the value handle.
    Notify {
        conn_id: u16,
        handle: u16,
        payload: heapless::Vec<u8, RX_CAP>,
    },
}

/// Bounded effect list. The widest transition (disable while
/// connected: stop advertising + close) emits two effects; four leaves
/// headroom without heap allocation.
pub type Effects = heapless::Vec<Effect, 4>;
