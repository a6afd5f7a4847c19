//! Lifecycle scenarios: gate edges, table construction, advertising
//! races, connection handling.

use crate::mock_radio::{Harness, RadioCall, CCCD_HANDLE, SERVICE_HANDLE, VALUE_HANDLE};
use stemlink::ble::{LinkEvent, LinkState};

#[test]
fn table_construction_issues_stack_calls_in_order() {
    let mut h = Harness::new();
    h.build_table();
    assert_eq!(
        h.radio.calls,
        vec![
            RadioCall::CreateService,
            RadioCall::StartService(SERVICE_HANDLE),
            RadioCall::AddCharacteristic(SERVICE_HANDLE),
            RadioCall::AddCccd(SERVICE_HANDLE),
        ]
    );
    assert!(h.link.table().is_ready());
}

#[test]
fn enable_starts_advertising_and_disable_stops_it() {
    let mut h = Harness::with_table();
    h.set_enabled(true);
    assert_eq!(h.radio.count(&RadioCall::StartAdvertising), 1);

    h.step(LinkEvent::AdvertisingStarted { ok: true });
    assert_eq!(h.link.state(), LinkState::Advertising);

    h.set_enabled(false);
    assert_eq!(h.radio.count(&RadioCall::StopAdvertising), 1);
    assert_eq!(h.link.state(), LinkState::Off);

    h.step(LinkEvent::AdvertisingStopped);
    assert_eq!(h.link.state(), LinkState::Off);
}

#[test]
fn enabling_twice_requests_advertising_once() {
    let mut h = Harness::with_table();
    h.set_enabled(true);
    h.set_enabled(true);
    assert_eq!(h.radio.count(&RadioCall::StartAdvertising), 1);
}

#[test]
fn state_is_off_iff_disabled_across_gate_edges() {
    let mut h = Harness::with_table();
    for &on in &[true, true, false, true, false, false, true] {
        h.set_enabled(on);
        assert_eq!(h.link.is_enabled(), on);
        assert_eq!(h.link.state() == LinkState::Off, !on);
    }
}

#[test]
fn disable_while_connected_closes_and_goes_off() {
    let mut h = Harness::with_table();
    h.enable_and_advertise();
    h.connect(5);
    assert_eq!(h.link.state(), LinkState::Connected);

    h.set_enabled(false);
    assert_eq!(h.link.state(), LinkState::Off);
    assert_eq!(h.radio.count(&RadioCall::Close(5)), 1);

    // The stack's disconnect callback arrives later; state stays Off.
    h.step(LinkEvent::Disconnected { reason: 0x16 });
    assert_eq!(h.link.state(), LinkState::Off);
    assert_eq!(h.radio.count(&RadioCall::StartAdvertising), 1);
}

#[test]
fn connection_racing_a_disable_is_rejected() {
    let mut h = Harness::with_table();
    h.enable_and_advertise();
    h.set_enabled(false);

    // The central's connect was already in flight when the gate
    // dropped.
    h.connect(9);
    assert_eq!(h.radio.count(&RadioCall::Close(9)), 1);

    // No payload traffic is processed on that connection.
    h.step(LinkEvent::Write {
        handle: VALUE_HANDLE,
        payload: &[0x05],
    });
    assert_eq!(h.link.last_rx_len(), 0);
    assert!(h.radio.notifications().is_empty());
}

#[test]
fn adv_start_success_after_disable_leaves_state_off() {
    let mut h = Harness::with_table();
    h.set_enabled(true);
    h.set_enabled(false);
    h.step(LinkEvent::AdvertisingStarted { ok: true });
    assert_eq!(h.link.state(), LinkState::Off);
}

#[test]
fn adv_start_failure_while_enabled_returns_to_idle() {
    let mut h = Harness::with_table();
    h.set_enabled(true);
    h.step(LinkEvent::AdvertisingStarted { ok: false });
    assert_eq!(h.link.state(), LinkState::Idle);
    assert!(h.link.is_enabled());
}

#[test]
fn disconnect_restarts_advertising_only_while_enabled() {
    let mut h = Harness::with_table();
    h.enable_and_advertise();
    h.connect(1);
    assert_eq!(
        h.link.peer_address(),
        Some([0x11, 0x22, 0x33, 0x44, 0x55, 0x66])
    );
    h.step(LinkEvent::Disconnected { reason: 0x13 });
    assert_eq!(h.link.state(), LinkState::Idle);
    assert_eq!(h.link.peer_address(), None);
    assert_eq!(h.radio.count(&RadioCall::StartAdvertising), 2);
}

#[test]
fn gate_cycles_never_rebuild_the_table() {
    let mut h = Harness::with_table();
    h.set_enabled(true);
    h.set_enabled(false);
    h.set_enabled(true);
    assert_eq!(h.radio.count(&RadioCall::CreateService), 1);
    assert!(h.link.table().is_ready());
}

#[test]
fn failed_table_step_degrades_writes_to_unknown_handle() {
    let mut h = Harness::new();
    h.step(LinkEvent::Registered);
    h.step(LinkEvent::ServiceCreated {
        ok: false,
        handle: SERVICE_HANDLE,
    });
    assert!(!h.link.table().is_ready());

    h.set_enabled(true);
    h.step(LinkEvent::Connected {
        conn_id: 2,
        peer: [0; 6],
    });
    // Value/CCCD handles were never assigned; these writes are
    // unknown-handle no-ops.
    h.step(LinkEvent::Write {
        handle: CCCD_HANDLE,
        payload: &[0x01, 0x00],
    });
    h.step(LinkEvent::Write {
        handle: VALUE_HANDLE,
        payload: &[0x05],
    });
    assert_eq!(h.link.last_rx_len(), 0);
    assert!(h.radio.notifications().is_empty());
}
