//! Mock radio for integration tests.
//!
//! Records every primitive call so tests can assert on the full
//! command history without a Bluetooth controller, plus a harness that
//! wires a [`BleLink`] to the mock the way the espidf glue wires it to
//! Bluedroid: dispatch an event, then apply the returned effects.

use stemlink::ble::port::apply_effects;
use stemlink::ble::{BleLink, LinkEvent, RadioPort};
use stemlink::config::LinkConfig;

// Handles the "stack" assigns during table construction.
pub const SERVICE_HANDLE: u16 = 40;
pub const VALUE_HANDLE: u16 = 42;
pub const CCCD_HANDLE: u16 = 43;

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    CreateService,
    StartService(u16),
    AddCharacteristic(u16),
    AddCccd(u16),
    StartAdvertising,
    StopAdvertising,
    Close(u16),
    Notify {
        conn_id: u16,
        handle: u16,
        payload: Vec<u8>,
    },
}

// ── MockRadio ─────────────────────────────────────────────────

pub struct MockRadio {
    pub calls: Vec<RadioCall>,
    pub address: Option<[u8; 6]>,
}

#[allow(dead_code)]
impl MockRadio {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            address: Some([0xAA, 0xBB, 0xCC, 0x01, 0x02, 0x03]),
        }
    }

    pub fn notifications(&self) -> Vec<&RadioCall> {
        self.calls
            .iter()
            .filter(|c| matches!(c, RadioCall::Notify { .. }))
            .collect()
    }

    pub fn count(&self, call: &RadioCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

impl RadioPort for MockRadio {
    fn create_service(&mut self) {
        self.calls.push(RadioCall::CreateService);
    }
    fn start_service(&mut self, service: u16) {
        self.calls.push(RadioCall::StartService(service));
    }
    fn add_characteristic(&mut self, service: u16) {
        self.calls.push(RadioCall::AddCharacteristic(service));
    }
    fn add_cccd(&mut self, service: u16) {
        self.calls.push(RadioCall::AddCccd(service));
    }
    fn start_advertising(&mut self) {
        self.calls.push(RadioCall::StartAdvertising);
    }
    fn stop_advertising(&mut self) {
        self.calls.push(RadioCall::StopAdvertising);
    }
    fn close_connection(&mut self, conn_id: u16) {
        self.calls.push(RadioCall::Close(conn_id));
    }
    fn notify(&mut self, conn_id: u16, handle: u16, payload: &[u8]) {
        self.calls.push(RadioCall::Notify {
            conn_id,
            handle,
            payload: payload.to_vec(),
        });
    }
    fn address(&self) -> Option<[u8; 6]> {
        self.address
    }
}

// ── Harness ───────────────────────────────────────────────────

/// A link wired to the mock radio the way espidf wires it to the real
/// stack.
pub struct Harness {
    pub link: BleLink,
    pub radio: MockRadio,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self {
            link: BleLink::new(LinkConfig::default()),
            radio: MockRadio::new(),
        }
    }

    /// A link whose GATT table has completed construction.
    pub fn with_table() -> Self {
        let mut h = Self::new();
        h.build_table();
        h
    }

    /// Drive the one-time table construction callback sequence.
    pub fn build_table(&mut self) {
        self.step(LinkEvent::Registered);
        self.step(LinkEvent::ServiceCreated {
            ok: true,
            handle: SERVICE_HANDLE,
        });
        self.step(LinkEvent::CharacteristicAdded {
            ok: true,
            handle: VALUE_HANDLE,
        });
        self.step(LinkEvent::DescriptorAdded {
            ok: true,
            handle: CCCD_HANDLE,
        });
    }

    pub fn step(&mut self, event: LinkEvent<'_>) {
        let fx = self.link.handle(event);
        apply_effects(&mut self.radio, &fx);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        let fx = self.link.set_enabled(enabled);
        apply_effects(&mut self.radio, &fx);
    }

    /// Enable and complete the advertising start.
    pub fn enable_and_advertise(&mut self) {
        self.set_enabled(true);
        self.step(LinkEvent::AdvertisingStarted { ok: true });
    }

    /// Connect a peer (the stack stops advertising implicitly).
    pub fn connect(&mut self, conn_id: u16) {
        self.step(LinkEvent::Connected {
            conn_id,
            peer: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
        });
    }
}
