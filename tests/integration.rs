//! Integration tests for the corehub session core, driven through the
//! public API against the in-memory transport.

use embassy_futures::join::join;
use embassy_futures::{block_on, yield_now};

use corehub::ble::uuids;
use corehub::mock::{MockCall, MockOp, MockTransport, USER_DESCRIPTION_DESCRIPTOR};
use corehub::{
    ConnectionState, PeripheralHandle, Session, TestId, TransportError, TransportErrorKind,
};

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn hub() -> PeripheralHandle {
    PeripheralHandle::new("hub-01", [0xC0, 0xFF, 0xEE, 0x00, 0x00, 0x01], "CoreHub-01")
        .with_rssi(-58)
}

fn connected(mock: MockTransport) -> Session<MockTransport> {
    let session = Session::new(mock);
    session.on_peripheral_found(hub());
    block_on(session.connect());
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    session
}

fn latest_log(session: &Session<MockTransport>) -> String {
    session
        .store()
        .read(|s| s.logs.latest().map(str::to_owned))
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════
// Connection lifecycle
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn full_connect_disconnect_cycle() {
    let session = connected(MockTransport::with_sample_data());
    block_on(session.disconnect());

    let snap = session.snapshot();
    assert_eq!(snap.connection_state, ConnectionState::Disconnected);
    assert_eq!(
        snap.logs.to_vec(),
        [
            "Connection state changed: DISCONNECTING -> DISCONNECTED",
            "Connection state changed: CONNECTED -> DISCONNECTING",
            "Connection state changed: DISCOVERING -> CONNECTED",
            "Connection state changed: CONNECTING -> DISCOVERING",
            "Connection state changed: DISCONNECTED -> CONNECTING",
            "Peripheral found: hub-01",
        ]
    );
}

#[test]
fn discovery_failure_never_reaches_connected() {
    let session = Session::new(MockTransport::with_sample_data());
    session.on_peripheral_found(hub());
    session.transport().fail(
        MockOp::DiscoverServices,
        TransportError::new(TransportErrorKind::DiscoveryFailed, "Services discovery failed")
            .with_reason("GATT_ERROR"),
    );
    block_on(session.connect());

    let logs = session.snapshot().logs.to_vec();
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert!(logs.iter().all(|l| !l.ends_with("-> CONNECTED")));
    assert!(logs.contains(
        &"ERROR: Services discovery failed, ATT: null, platform: null, reason: GATT_ERROR"
            .to_string()
    ));
}

#[test]
fn forget_keeps_handle_while_connected() {
    let session = connected(MockTransport::with_sample_data());
    session.forget();
    assert!(session.snapshot().peripheral.is_some());

    block_on(session.disconnect());
    session.forget();
    assert!(session.snapshot().peripheral.is_none());

    // a new scan result is accepted again
    session.on_peripheral_found(PeripheralHandle::new("hub-02", [0; 6], "CoreHub-02"));
    assert_eq!(latest_log(&session), "Peripheral found: hub-02");
}

#[test]
fn dropped_link_blocks_further_tests() {
    let session = connected(MockTransport::with_sample_data());
    session.on_link_lost("hub-01");
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(block_on(session.execute_test(TestId::ReadWeightData)), None);
}

// ═══════════════════════════════════════════════════════════════════════════
// Test execution guards
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn execute_test_rejected_when_not_connected() {
    let session = Session::new(MockTransport::with_sample_data());
    session.on_peripheral_found(hub());

    for test in TestId::ALL {
        assert_eq!(block_on(session.execute_test(test)), None);
    }
    let snap = session.snapshot();
    assert!(snap.current_test.is_none());
    assert!(session.transport().calls().is_empty());
}

#[test]
fn second_test_rejected_while_one_is_running() {
    let session = connected(MockTransport::with_sample_data());
    session.transport().clear_calls();
    session.transport().hold(MockOp::RequestMtu);

    let first = session.execute_test(TestId::ReadWeightData);
    let second = async {
        yield_now().await;
        assert_eq!(session.snapshot().current_test, Some(TestId::ReadWeightData));
        let rejected = session.execute_test(TestId::ReadAllCharacteristics).await;
        session.transport().release();
        rejected
    };

    let (first, second) = block_on(join(first, second));
    assert_eq!(first, Some(true));
    assert_eq!(second, None);
    assert!(session.snapshot().current_test.is_none());
    assert_eq!(session.transport().count(MockOp::DiscoverServices), 1);
}

#[test]
fn catalog_identifiers_drive_execution() {
    let session = connected(MockTransport::with_sample_data());
    let test: TestId = "READ_WEIGHT_DATA".parse().unwrap();
    assert_eq!(block_on(session.execute_test(test)), Some(true));
    assert_eq!(session.snapshot().weight, 42.0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Routines
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn full_dump_tolerates_refused_descriptor_write() {
    let session = connected(MockTransport::with_sample_data());
    session.transport().fail_for(
        MockOp::WriteDescriptor,
        USER_DESCRIPTION_DESCRIPTOR,
        TransportError::new(
            TransportErrorKind::DescriptorWriteNotPermitted,
            "Descriptor write not permitted",
        )
        .with_att_code(0x03),
    );

    assert_eq!(
        block_on(session.execute_test(TestId::ReadAllCharacteristics)),
        Some(true)
    );

    let mock = session.transport();
    assert!(mock.writes_to(uuids::CLIENT_CHARACTERISTIC_CONFIG).is_empty());
    assert_eq!(mock.writes_to(USER_DESCRIPTION_DESCRIPTOR), ["AA=="]);
    assert!(mock.calls().contains(&MockCall::ReadDescriptor {
        descriptor: USER_DESCRIPTION_DESCRIPTOR
    }));
    assert!(session
        .snapshot()
        .logs
        .contains("Cannot write to: 00002901-0000-1000-8000-00805f9b34fb"));
}

#[test]
fn weight_data_feeds_safe_distance() {
    let session = connected(MockTransport::with_sample_data());
    assert_eq!(session.snapshot().metrics.safe_distance, None);

    assert_eq!(
        block_on(session.execute_test(TestId::ReadWeightData)),
        Some(true)
    );
    let snap = session.snapshot();
    assert_eq!(snap.weight, 42.0);
    assert_eq!(snap.metrics.speed, 80.0);
    assert_eq!(
        snap.metrics.safe_distance.map(f64::to_bits),
        Some(86.41975308641975_f64.to_bits())
    );

    session.set_speed(120.5);
    session.store().dispatch(corehub::Action::Weight(75.0));
    assert_eq!(
        session.snapshot().metrics.safe_distance,
        Some(130.16975308641975)
    );
}

#[test]
fn sensor_info_failure_zeroes_weight_but_weight_data_failure_does_not() {
    let session = connected(MockTransport::with_sample_data());
    block_on(session.execute_test(TestId::ReadWeightData));
    assert_eq!(session.snapshot().weight, 42.0);

    session.transport().fail_for(
        MockOp::ReadCharacteristic,
        uuids::RESPONSE_CHARACTERISTIC,
        TransportError::new(TransportErrorKind::ReadFailed, "Characteristic read failed"),
    );

    assert_eq!(
        block_on(session.execute_test(TestId::ReadWeightData)),
        Some(false)
    );
    assert_eq!(session.snapshot().weight, 42.0);

    assert_eq!(
        block_on(session.execute_test(TestId::ReadWeightSensorInfo)),
        Some(false)
    );
    assert_eq!(session.snapshot().weight, 0.0);
    assert_eq!(
        latest_log(&session),
        "ERROR: Characteristic read failed, ATT: null, platform: null, reason: null"
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Log
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn clear_logs_restarts_at_index_zero() {
    let session = connected(MockTransport::with_sample_data());
    assert!(session.snapshot().logs.len() > 1);

    session.clear_logs();
    assert!(session.snapshot().logs.is_empty());

    block_on(session.disconnect());
    let logs = session.snapshot().logs;
    assert_eq!(
        logs.get(0),
        Some("Connection state changed: DISCONNECTING -> DISCONNECTED")
    );
    assert_eq!(logs.len(), 2);
}
