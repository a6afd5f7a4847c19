//! Link state machine: enable gate, advertising control, connection
//! tracking.
//!
//! `BleLink` is pure logic and never calls the radio. Each entry
//! point returns the effect list to apply once the caller has dropped
//! its lock. Two rules govern every transition:
//!
//! 1. The gate authorises everything: never advertise while disabled
//!    or while serving a connection, never process payload traffic on
//!    a connection formed while disabled.
//! 2. Async completions re-read the *current* gate value. The gate may
//!    have flipped between issuing a request and its completion
//!    callback, so the value captured at request time is never
//!    trusted.

use log::{info, warn};

use crate::ble::channel::DataChannel;
use crate::ble::events::{Effect, Effects, LinkEvent};
use crate::ble::port::format_address;
use crate::ble::table::{GattTable, HandleKind};
use crate::ble::LinkState;
use crate::config::LinkConfig;

// ── Enable gate ───────────────────────────────────────────────

/// The single authorisation flag. Transitions are edge-triggered:
/// setting the current value again is a no-op.
#[derive(Debug)]
struct EnableGate {
    enabled: bool,
}

impl EnableGate {
    /// Returns `true` only on an actual edge.
    fn set(&mut self, enabled: bool) -> bool {
        if self.enabled == enabled {
            return false;
        }
        self.enabled = enabled;
        true
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ── Link ──────────────────────────────────────────────────────

/// The peripheral link core. One instance per radio; the espidf glue
/// enforces the process singleton, tests create as many as they like.
#[derive(Debug)]
pub struct BleLink {
    config: LinkConfig,
    gate: EnableGate,
    state: LinkState,
    table: GattTable,
    channel: DataChannel,
    conn_id: Option<u16>,
    peer: [u8; 6],
}

impl BleLink {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            gate: EnableGate { enabled: false },
            state: LinkState::Off,
            table: GattTable::new(),
            channel: DataChannel::new(),
            conn_id: None,
            peer: [0; 6],
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn device_name(&self) -> &str {
        self.config.device_name.as_str()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn table(&self) -> &GattTable {
        &self.table
    }

    /// Address of the attached peer, while connected.
    pub fn peer_address(&self) -> Option<[u8; 6]> {
        self.conn_id.map(|_| self.peer)
    }

    /// Most recent inbound payload.
    pub fn last_rx(&self) -> &[u8] {
        self.channel.rx_payload()
    }

    pub fn last_rx_len(&self) -> usize {
        self.channel.rx_len()
    }

    pub fn clear_last_rx(&mut self) {
        self.channel.clear_rx();
    }

    // ── Gate transitions ──────────────────────────────────────

    /// Flip the enable gate. Idempotent; the returned effects are
    /// empty when no edge occurred.
    pub fn set_enabled(&mut self, enabled: bool) -> Effects {
        let mut fx = Effects::new();
        if !self.gate.set(enabled) {
            return fx;
        }

        if enabled {
            info!("ble: enabled, requesting advertising");
            self.channel.clear_rx();
            self.state = LinkState::Idle;
            self.request_advertising(&mut fx);
        } else {
            info!("ble: disabled, stopping advertising and dropping peer");
            let _ = fx.push(Effect::StopAdvertising);
            if self.state == LinkState::Connected {
                if let Some(conn_id) = self.conn_id {
                    let _ = fx.push(Effect::CloseConnection { conn_id });
                }
            }
            self.channel.reset();
            self.conn_id = None;
            self.state = LinkState::Off;
        }
        fx
    }

    // ── Stack events ──────────────────────────────────────────

    /// Dispatch one asynchronous stack event into the machine.
    pub fn handle(&mut self, event: LinkEvent<'_>) -> Effects {
        match event {
            LinkEvent::Registered => self.table.on_registered(),
            LinkEvent::ServiceCreated { ok, handle } => self.table.on_service_created(ok, handle),
            LinkEvent::CharacteristicAdded { ok, handle } => {
                self.table.on_characteristic_added(ok, handle)
            }
            LinkEvent::DescriptorAdded { ok, handle } => {
                self.table.on_descriptor_added(ok, handle)
            }
            LinkEvent::AdvertisingStarted { ok } => self.on_advertising_started(ok),
            LinkEvent::AdvertisingStopped => self.on_advertising_stopped(),
            LinkEvent::Connected { conn_id, peer } => self.on_connected(conn_id, peer),
            LinkEvent::Disconnected { reason } => self.on_disconnected(reason),
            LinkEvent::Write { handle, payload } => self.on_write(handle, payload),
        }
    }

    // ── Advertising controller ────────────────────────────────

    /// Issue a start request unless the gate or an active connection
    /// forbids it.
    fn request_advertising(&self, fx: &mut Effects) {
        if !self.gate.is_enabled() {
            info!("ble: adv skipped (disabled)");
        } else if self.state == LinkState::Connected {
            info!("ble: adv skipped (already connected)");
        } else {
            let _ = fx.push(Effect::StartAdvertising);
        }
    }

    fn on_advertising_started(&mut self, ok: bool) -> Effects {
        // The gate may have flipped since the start request was
        // issued; its current value decides the state, not the
        // outcome alone.
        if ok {
            if self.gate.is_enabled() {
                info!("ble: advertising started");
                self.state = LinkState::Advertising;
            } else {
                // Disable raced the start; the stop request is already
                // in flight from the disable path.
                info!("ble: advertising started after disable, staying off");
                self.state = LinkState::Off;
            }
        } else {
            warn!("ble: advertising start failed");
            self.state = if self.gate.is_enabled() {
                LinkState::Idle
            } else {
                LinkState::Off
            };
        }
        Effects::new()
    }

    fn on_advertising_stopped(&mut self) -> Effects {
        info!("ble: advertising stopped");
        self.state = if self.gate.is_enabled() {
            LinkState::Idle
        } else {
            LinkState::Off
        };
        Effects::new()
    }

    // ── Connection manager ────────────────────────────────────

    fn on_connected(&mut self, conn_id: u16, peer: [u8; 6]) -> Effects {
        let mut fx = Effects::new();
        info!(
            "ble: connected conn_id={conn_id} peer={}",
            format_address(Some(peer))
        );
        self.conn_id = Some(conn_id);
        self.peer = peer;
        self.channel.reset_notify();
        self.state = LinkState::Connected;

        // A connect may race a disable. Close before any payload
        // traffic can be processed on it.
        if !self.gate.is_enabled() {
            info!("ble: closing connection formed while disabled");
            let _ = fx.push(Effect::CloseConnection { conn_id });
        }
        fx
    }

    fn on_disconnected(&mut self, reason: u8) -> Effects {
        let mut fx = Effects::new();
        info!("ble: disconnected reason={reason:#04x}");
        self.channel.reset_notify();
        self.conn_id = None;

        if self.gate.is_enabled() {
            self.state = LinkState::Idle;
            info!("ble: restarting advertising");
            self.request_advertising(&mut fx);
        } else {
            self.state = LinkState::Off;
        }
        fx
    }

    // ── Data channel dispatch ─────────────────────────────────

    fn on_write(&mut self, handle: u16, payload: &[u8]) -> Effects {
        let mut fx = Effects::new();
        if !self.gate.is_enabled() {
            info!(
                "ble: write ignored (disabled) handle={handle} len={}",
                payload.len()
            );
            return fx;
        }

        match self.table.classify(handle) {
            HandleKind::Cccd if payload.len() >= 2 => {
                self.channel.on_cccd_write(payload);
            }
            HandleKind::Value => {
                self.channel.store(payload);
                if self.channel.notify_enabled() && self.state == LinkState::Connected {
                    if let Some(conn_id) = self.conn_id {
                        let reply = self.channel.reply();
                        if !reply.is_empty() {
                            let _ = fx.push(Effect::Notify {
                                conn_id,
                                handle: self.table.value_handle(),
                                payload: reply,
                            });
                        }
                    }
                }
            }
            // Includes CCCD writes shorter than two bytes: a protocol
            // violation, logged and ignored, connection stays open.
            _ => {
                warn!(
                    "ble: write to unknown handle={handle} (value={} cccd={})",
                    self.table.value_handle(),
                    self.table.cccd_handle()
                );
            }
        }
        fx
    }
}
