//! `READ_ALL_CHARACTERISTICS`: full attribute walk.
//!
//! For every characteristic (except the GAP privacy flag):
//! 1. Read and log each descriptor, then overwrite every non-CCC descriptor
//!    with a one-byte placeholder. A refused descriptor write is logged and
//!    skipped; any other error ends the routine.
//! 2. If readable, read the value and log it as base64.
//! 3. If also writable with response, write the same value back.

use log::{debug, warn};

use crate::ble::transport::{Characteristic, GattTransport};
use crate::ble::uuids;
use crate::ble::PeripheralHandle;
use crate::error::ProbeError;
use crate::probe::codec::DESCRIPTOR_PLACEHOLDER;
use crate::store::Store;

pub async fn read_all_characteristics<T: GattTransport>(
    transport: &T,
    peripheral: &PeripheralHandle,
    store: &Store,
) -> bool {
    match walk(transport, peripheral, store).await {
        Ok(()) => true,
        Err(e) => {
            warn!("full dump aborted: {e}");
            store.log(e.log_line());
            false
        }
    }
}

async fn walk<T: GattTransport>(
    transport: &T,
    peripheral: &PeripheralHandle,
    store: &Store,
) -> Result<(), ProbeError> {
    for service in transport.discover_services(peripheral).await? {
        store.log(format!("Found service: {}", service.uuid));

        for characteristic in transport.discover_characteristics(&service).await? {
            store.log(format!("Found characteristic: {}", characteristic.uuid));

            if characteristic.uuid == uuids::EXCLUDED_GAP_CHARACTERISTIC {
                continue;
            }

            overwrite_descriptors(transport, &characteristic, store).await?;
            echo_value(transport, &characteristic, store).await?;
        }
    }
    Ok(())
}

async fn overwrite_descriptors<T: GattTransport>(
    transport: &T,
    characteristic: &Characteristic,
    store: &Store,
) -> Result<(), ProbeError> {
    for descriptor in transport.discover_descriptors(characteristic).await? {
        store.log(format!("* Found descriptor: {}", descriptor.uuid));
        let value = transport.read_descriptor(&descriptor).await?;
        store.log(format!(
            "Descriptor value: {}",
            value.as_deref().unwrap_or("null")
        ));

        if descriptor.uuid == uuids::CLIENT_CHARACTERISTIC_CONFIG {
            continue;
        }

        match transport
            .write_descriptor(&descriptor, DESCRIPTOR_PLACEHOLDER)
            .await
        {
            Ok(()) => debug!("placeholder written to {}", descriptor.uuid),
            Err(e) if e.is_descriptor_write_not_permitted() => {
                store.log(format!("Cannot write to: {}", descriptor.uuid));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn echo_value<T: GattTransport>(
    transport: &T,
    characteristic: &Characteristic,
    store: &Store,
) -> Result<(), ProbeError> {
    if !characteristic.is_readable {
        return Ok(());
    }

    store.log("Reading value...");
    let value = transport.read_characteristic(characteristic).await?;
    store.log(format!(
        "Got base64 value: {}",
        value.as_deref().unwrap_or("null")
    ));

    if let Some(value) = value.filter(|_| characteristic.is_writable_with_response) {
        transport
            .write_characteristic(characteristic, &value, true)
            .await?;
        store.log("Successfully written value back");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::error::{TransportError, TransportErrorKind};
    use crate::mock::{
        MockCall, MockCharacteristic, MockOp, MockService, MockTransport,
        USER_DESCRIPTION_DESCRIPTOR,
    };

    fn run(mock: &MockTransport, store: &Store) -> bool {
        let hub = PeripheralHandle::new("hub", [0; 6], "CoreHub");
        block_on(read_all_characteristics(mock, &hub, store))
    }

    #[test]
    fn ccc_is_read_but_never_written() {
        let mock = MockTransport::with_sample_data();
        let store = Store::new();
        assert!(run(&mock, &store));

        assert!(mock.writes_to(uuids::CLIENT_CHARACTERISTIC_CONFIG).is_empty());
        assert_eq!(mock.writes_to(USER_DESCRIPTION_DESCRIPTOR), ["AA=="]);
        let ccc_reads = mock
            .calls()
            .iter()
            .filter(|c| **c == MockCall::ReadDescriptor { descriptor: uuids::CLIENT_CHARACTERISTIC_CONFIG })
            .count();
        assert_eq!(ccc_reads, 2);
        assert!(store.read(|s| s.logs.contains("Descriptor value: AAA=")));
    }

    #[test]
    fn privacy_flag_is_listed_but_not_touched() {
        let mock = MockTransport::with_sample_data();
        let store = Store::new();
        assert!(run(&mock, &store));

        let gap = uuids::EXCLUDED_GAP_CHARACTERISTIC;
        assert!(store.read(|s| s.logs.contains(&format!("Found characteristic: {gap}"))));
        assert!(mock.calls().iter().all(|c| c.target() != Some(gap)));
    }

    #[test]
    fn refused_descriptor_write_is_tolerated() {
        let mock = MockTransport::with_sample_data();
        mock.fail_for(
            MockOp::WriteDescriptor,
            USER_DESCRIPTION_DESCRIPTOR,
            TransportError::new(TransportErrorKind::DescriptorWriteNotPermitted, "Descriptor write failed")
                .with_att_code(3),
        );
        let store = Store::new();
        assert!(run(&mock, &store));
        assert!(store.read(|s| s
            .logs
            .contains("Cannot write to: 00002901-0000-1000-8000-00805f9b34fb")));
    }

    #[test]
    fn other_descriptor_write_error_aborts() {
        let mock = MockTransport::with_sample_data();
        mock.fail(
            MockOp::WriteDescriptor,
            TransportError::new(TransportErrorKind::WriteFailed, "Write failed").with_platform_code(133),
        );
        let store = Store::new();
        assert!(!run(&mock, &store));
        assert_eq!(
            store.read(|s| s.logs.latest().map(str::to_owned)),
            Some("ERROR: Write failed, ATT: null, platform: 133, reason: null".to_owned())
        );
    }

    #[test]
    fn readable_writable_value_is_echoed_back() {
        let echo = uuid::Uuid::from_u128(0x12345678_0000_4000_8000_000000000001);
        let silent = uuid::Uuid::from_u128(0x12345678_0000_4000_8000_000000000002);
        let mock = MockTransport::new().with_service(
            MockService::new(uuids::COREHUB_SERVICE)
                .with_characteristic(MockCharacteristic::new(echo).readable().writable().value("AQI="))
                .with_characteristic(MockCharacteristic::new(silent).readable().writable()),
        );
        let store = Store::new();
        assert!(run(&mock, &store));

        assert_eq!(mock.writes_to(echo), ["AQI="]);
        assert!(mock.writes_to(silent).is_empty());
        let logs = store.snapshot().logs;
        assert!(logs.contains("Got base64 value: AQI="));
        assert!(logs.contains("Got base64 value: null"));
        assert_eq!(logs.iter().filter(|l| *l == "Successfully written value back").count(), 1);
    }

    #[test]
    fn discovery_failure_is_reported() {
        let mock = MockTransport::with_sample_data();
        mock.fail(
            MockOp::DiscoverServices,
            TransportError::new(TransportErrorKind::NotConnected, "Device is not connected"),
        );
        let store = Store::new();
        assert!(!run(&mock, &store));
        assert_eq!(store.read(|s| s.logs.len()), 1);
    }
}
