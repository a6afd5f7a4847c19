//! GATT table construction state machine.
//!
//! The stack imposes a strict creation order, each step confirmed by
//! its own callback:
//!
//! ```text
//! NotRegistered ──registered──▶ ServiceCreating ──created──▶ CharAdding
//!     CharAdding ──char added──▶ DescrAdding ──descr added──▶ Ready
//! ```
//!
//! The sequence runs exactly once per process lifetime; disable/enable
//! cycles touch advertising and connections, never this table. The
//! table parameters are static, so a stack-level error at any step is
//! a configuration bug: it is logged and the table simply never
//! reaches `Ready`; the affected handles stay `0`, and writes to them
//! degrade to the unknown-handle path.

use log::{error, info, warn};

use crate::ble::events::{Effect, Effects};

/// Construction phase. Creation callbacks chain directly into the next
/// request, so the "created"/"added" rest states the stack passes
/// through are not observable between events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablePhase {
    NotRegistered,
    ServiceCreating,
    CharAdding,
    DescrAdding,
    Ready,
}

/// Which attribute a write landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// The characteristic value handle.
    Value,
    /// The client configuration descriptor.
    Cccd,
    /// Anything else, including handles not yet assigned.
    Unknown,
}

/// Declarative table: one primary service, one write+notify
/// characteristic, one CCCD. Handles are assigned once by the stack
/// and stable for the process lifetime; `0` means "not yet assigned".
#[derive(Debug)]
pub struct GattTable {
    phase: TablePhase,
    service: u16,
    characteristic: u16,
    cccd: u16,
}

impl GattTable {
    pub fn new() -> Self {
        Self {
            phase: TablePhase::NotRegistered,
            service: 0,
            characteristic: 0,
            cccd: 0,
        }
    }

    pub fn phase(&self) -> TablePhase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == TablePhase::Ready
    }

    /// Characteristic value handle (`0` until assigned).
    pub fn value_handle(&self) -> u16 {
        self.characteristic
    }

    /// CCCD handle (`0` until assigned).
    pub fn cccd_handle(&self) -> u16 {
        self.cccd
    }

    /// GATT application registered: kick off service creation.
    pub fn on_registered(&mut self) -> Effects {
        let mut fx = Effects::new();
        if self.phase != TablePhase::NotRegistered {
            warn!("gatt: duplicate registration ignored (phase {:?})", self.phase);
            return fx;
        }
        self.phase = TablePhase::ServiceCreating;
        let _ = fx.push(Effect::CreateService);
        fx
    }

    /// Service creation completed: start it and request the
    /// characteristic.
    pub fn on_service_created(&mut self, ok: bool, handle: u16) -> Effects {
        let mut fx = Effects::new();
        if self.phase != TablePhase::ServiceCreating {
            warn!("gatt: unexpected service-created in phase {:?}", self.phase);
            return fx;
        }
        if !ok {
            error!("gatt: service creation failed, table stays not-ready");
            return fx;
        }
        info!("gatt: service created (handle={handle})");
        self.service = handle;
        self.phase = TablePhase::CharAdding;
        let _ = fx.push(Effect::StartService { service: handle });
        let _ = fx.push(Effect::AddCharacteristic { service: handle });
        fx
    }

    /// Characteristic added: request the CCCD.
    pub fn on_characteristic_added(&mut self, ok: bool, handle: u16) -> Effects {
        let mut fx = Effects::new();
        if self.phase != TablePhase::CharAdding {
            warn!("gatt: unexpected char-added in phase {:?}", self.phase);
            return fx;
        }
        if !ok {
            error!("gatt: characteristic creation failed, table stays not-ready");
            return fx;
        }
        info!("gatt: characteristic added (handle={handle})");
        self.characteristic = handle;
        self.phase = TablePhase::DescrAdding;
        let _ = fx.push(Effect::AddCccd {
            service: self.service,
        });
        fx
    }

    /// CCCD added: the table is complete.
    pub fn on_descriptor_added(&mut self, ok: bool, handle: u16) -> Effects {
        let fx = Effects::new();
        if self.phase != TablePhase::DescrAdding {
            warn!("gatt: unexpected descr-added in phase {:?}", self.phase);
            return fx;
        }
        if !ok {
            error!("gatt: CCCD creation failed, table stays not-ready");
            return fx;
        }
        info!("gatt: CCCD added (handle={handle}), table ready");
        self.cccd = handle;
        self.phase = TablePhase::Ready;
        fx
    }

    /// Route an incoming write by handle. Unassigned handles never
    /// match, so writes that arrive before the table is ready fall
    /// into `Unknown`.
    pub fn classify(&self, handle: u16) -> HandleKind {
        if handle != 0 && handle == self.characteristic {
            HandleKind::Value
        } else if handle != 0 && handle == self.cccd {
            HandleKind::Cccd
        } else {
            HandleKind::Unknown
        }
    }
}

impl Default for GattTable {
    fn default() -> Self {
        Self::new()
    }
}
