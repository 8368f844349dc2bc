//! Scripted in-memory transport.
//!
//! Serves a fixed attribute table, records every call it receives, and can
//! be told to fail specific operations. Used by the crate's tests and handy
//! for driving the session without hardware.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use uuid::Uuid;

use crate::ble::transport::{Characteristic, Descriptor, EncodedValue, GattTransport, Service};
use crate::ble::{uuids, ConnectionOptions, PeripheralHandle};
use crate::error::{TransportError, TransportErrorKind};
use crate::probe::codec;

/// Generic Access service (0x1800).
pub const GAP_SERVICE: Uuid = Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);
/// Device Name characteristic (0x2A00).
pub const DEVICE_NAME_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb);
/// Characteristic User Description descriptor (0x2901).
pub const USER_DESCRIPTION_DESCRIPTOR: Uuid =
    Uuid::from_u128(0x00002901_0000_1000_8000_00805f9b34fb);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockDescriptor {
    pub uuid: Uuid,
    pub value: Option<EncodedValue>,
}

impl MockDescriptor {
    pub fn new(uuid: Uuid) -> Self {
        Self { uuid, value: None }
    }

    pub fn value(mut self, value: impl Into<EncodedValue>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockCharacteristic {
    pub uuid: Uuid,
    pub value: Option<EncodedValue>,
    pub readable: bool,
    pub writable_with_response: bool,
    pub descriptors: Vec<MockDescriptor>,
}

impl MockCharacteristic {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            value: None,
            readable: false,
            writable_with_response: false,
            descriptors: Vec::new(),
        }
    }

    pub fn readable(mut self) -> Self {
        self.readable = true;
        self
    }

    pub fn writable(mut self) -> Self {
        self.writable_with_response = true;
        self
    }

    pub fn value(mut self, value: impl Into<EncodedValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_descriptor(mut self, descriptor: MockDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockService {
    pub uuid: Uuid,
    pub characteristics: Vec<MockCharacteristic>,
}

impl MockService {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            characteristics: Vec::new(),
        }
    }

    pub fn with_characteristic(mut self, characteristic: MockCharacteristic) -> Self {
        self.characteristics.push(characteristic);
        self
    }
}

/// Kind of transport operation, for failure injection and call counting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockOp {
    Connect,
    Disconnect,
    DiscoverServices,
    DiscoverCharacteristics,
    DiscoverDescriptors,
    ReadCharacteristic,
    WriteCharacteristic,
    ReadDescriptor,
    WriteDescriptor,
    RequestMtu,
}

/// One recorded call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
    Connect { peripheral: String, options: ConnectionOptions },
    Disconnect { peripheral: String },
    DiscoverServices,
    DiscoverCharacteristics { service: Uuid },
    DiscoverDescriptors { characteristic: Uuid },
    ReadCharacteristic { characteristic: Uuid },
    WriteCharacteristic { characteristic: Uuid, value: String, with_response: bool },
    ReadDescriptor { descriptor: Uuid },
    WriteDescriptor { descriptor: Uuid, value: String },
    RequestMtu { mtu: u16 },
}

impl MockCall {
    pub fn op(&self) -> MockOp {
        match self {
            MockCall::Connect { .. } => MockOp::Connect,
            MockCall::Disconnect { .. } => MockOp::Disconnect,
            MockCall::DiscoverServices => MockOp::DiscoverServices,
            MockCall::DiscoverCharacteristics { .. } => MockOp::DiscoverCharacteristics,
            MockCall::DiscoverDescriptors { .. } => MockOp::DiscoverDescriptors,
            MockCall::ReadCharacteristic { .. } => MockOp::ReadCharacteristic,
            MockCall::WriteCharacteristic { .. } => MockOp::WriteCharacteristic,
            MockCall::ReadDescriptor { .. } => MockOp::ReadDescriptor,
            MockCall::WriteDescriptor { .. } => MockOp::WriteDescriptor,
            MockCall::RequestMtu { .. } => MockOp::RequestMtu,
        }
    }

    /// Attribute the call addressed, if any.
    pub fn target(&self) -> Option<Uuid> {
        match self {
            MockCall::DiscoverCharacteristics { service } => Some(*service),
            MockCall::DiscoverDescriptors { characteristic }
            | MockCall::ReadCharacteristic { characteristic }
            | MockCall::WriteCharacteristic { characteristic, .. } => Some(*characteristic),
            MockCall::ReadDescriptor { descriptor } | MockCall::WriteDescriptor { descriptor, .. } => {
                Some(*descriptor)
            }
            _ => None,
        }
    }
}

struct Failure {
    op: MockOp,
    target: Option<Uuid>,
    error: TransportError,
}

/// In-memory [`GattTransport`].
pub struct MockTransport {
    services: RefCell<Vec<MockService>>,
    calls: RefCell<Vec<MockCall>>,
    failures: RefCell<Vec<Failure>>,
    connected: Cell<bool>,
    /// MTU reported back by `request_mtu`; `None` echoes the request.
    mtu: Cell<Option<u16>>,
    held: Cell<Option<MockOp>>,
    gate: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            services: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            failures: RefCell::new(Vec::new()),
            connected: Cell::new(false),
            mtu: Cell::new(None),
            held: Cell::new(None),
            gate: Signal::new(),
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// CoreHub attribute table whose response characteristic holds
    /// `{"weight":42}`.
    pub fn with_sample_data() -> Self {
        Self::corehub(r#"{"weight":42}"#)
    }

    /// CoreHub attribute table whose response characteristic holds
    /// `payload`.
    ///
    /// GAP service first (device name, privacy flag), then the CoreHub
    /// service with the response characteristic ahead of the command
    /// characteristic.
    pub fn corehub(payload: &str) -> Self {
        let gap = MockService::new(GAP_SERVICE)
            .with_characteristic(
                MockCharacteristic::new(DEVICE_NAME_CHARACTERISTIC)
                    .readable()
                    .value(codec::encode_command("CoreHub")),
            )
            .with_characteristic(
                MockCharacteristic::new(uuids::EXCLUDED_GAP_CHARACTERISTIC)
                    .readable()
                    .writable()
                    .value("AA=="),
            );

        let corehub = MockService::new(uuids::COREHUB_SERVICE)
            .with_characteristic(
                MockCharacteristic::new(uuids::RESPONSE_CHARACTERISTIC)
                    .readable()
                    .value(codec::encode_command(payload))
                    .with_descriptor(
                        MockDescriptor::new(uuids::CLIENT_CHARACTERISTIC_CONFIG).value("AAA="),
                    ),
            )
            .with_characteristic(
                MockCharacteristic::new(uuids::COMMAND_CHARACTERISTIC)
                    .writable()
                    .with_descriptor(
                        MockDescriptor::new(uuids::CLIENT_CHARACTERISTIC_CONFIG).value("AAA="),
                    )
                    .with_descriptor(
                        MockDescriptor::new(USER_DESCRIPTION_DESCRIPTOR)
                            .value(codec::encode_command("Command")),
                    ),
            );

        Self::new().with_service(gap).with_service(corehub)
    }

    pub fn with_service(self, service: MockService) -> Self {
        self.services.borrow_mut().push(service);
        self
    }

    /// Make every call of `op` fail with `error`.
    pub fn fail(&self, op: MockOp, error: TransportError) {
        self.failures.borrow_mut().push(Failure {
            op,
            target: None,
            error,
        });
    }

    /// Make calls of `op` addressed to `target` fail with `error`.
    pub fn fail_for(&self, op: MockOp, target: Uuid, error: TransportError) {
        self.failures.borrow_mut().push(Failure {
            op,
            target: Some(target),
            error,
        });
    }

    pub fn clear_failures(&self) {
        self.failures.borrow_mut().clear();
    }

    /// Suspend the next calls of `op` until [`release`](Self::release).
    pub fn hold(&self, op: MockOp) {
        self.gate.reset();
        self.held.set(Some(op));
    }

    pub fn release(&self) {
        self.held.set(None);
        self.gate.signal(());
    }

    pub fn set_negotiated_mtu(&self, mtu: u16) {
        self.mtu.set(Some(mtu));
    }

    /// Replace the stored value of every characteristic with `uuid`.
    pub fn set_characteristic_value(&self, uuid: Uuid, value: Option<EncodedValue>) {
        for service in self.services.borrow_mut().iter_mut() {
            for c in service.characteristics.iter_mut().filter(|c| c.uuid == uuid) {
                c.value = value.clone();
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, op: MockOp) -> usize {
        self.calls.borrow().iter().filter(|c| c.op() == op).count()
    }

    /// Values written to characteristic or descriptor `target`, in order.
    pub fn writes_to(&self, target: Uuid) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                MockCall::WriteCharacteristic {
                    characteristic,
                    value,
                    ..
                } if *characteristic == target => Some(value.clone()),
                MockCall::WriteDescriptor { descriptor, value } if *descriptor == target => {
                    Some(value.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    async fn record(&self, call: MockCall) -> Result<(), TransportError> {
        let op = call.op();
        if self.held.get() == Some(op) {
            self.gate.wait().await;
        }
        let target = call.target();
        self.calls.borrow_mut().push(call);
        let failures = self.failures.borrow();
        match failures
            .iter()
            .find(|f| f.op == op && (f.target.is_none() || f.target == target))
        {
            Some(f) => Err(f.error.clone()),
            None => Ok(()),
        }
    }

    fn find_characteristic(&self, service: Uuid, uuid: Uuid) -> Option<MockCharacteristic> {
        self.services
            .borrow()
            .iter()
            .filter(|s| s.uuid == service)
            .flat_map(|s| s.characteristics.iter())
            .find(|c| c.uuid == uuid)
            .cloned()
    }

    fn missing(kind: TransportErrorKind, what: &str, uuid: Uuid) -> TransportError {
        TransportError::new(kind, format!("{what} {uuid} not found"))
    }
}

impl GattTransport for MockTransport {
    async fn connect(
        &self,
        peripheral: &PeripheralHandle,
        options: &ConnectionOptions,
    ) -> Result<(), TransportError> {
        self.record(MockCall::Connect {
            peripheral: peripheral.id.clone(),
            options: *options,
        })
        .await?;
        self.connected.set(true);
        Ok(())
    }

    async fn disconnect(&self, peripheral: &PeripheralHandle) -> Result<(), TransportError> {
        self.record(MockCall::Disconnect {
            peripheral: peripheral.id.clone(),
        })
        .await?;
        self.connected.set(false);
        Ok(())
    }

    async fn discover_services(
        &self,
        _peripheral: &PeripheralHandle,
    ) -> Result<Vec<Service>, TransportError> {
        self.record(MockCall::DiscoverServices).await?;
        Ok(self
            .services
            .borrow()
            .iter()
            .map(|s| Service { uuid: s.uuid })
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &Service,
    ) -> Result<Vec<Characteristic>, TransportError> {
        self.record(MockCall::DiscoverCharacteristics {
            service: service.uuid,
        })
        .await?;
        let services = self.services.borrow();
        let found = services
            .iter()
            .find(|s| s.uuid == service.uuid)
            .ok_or_else(|| Self::missing(TransportErrorKind::DiscoveryFailed, "service", service.uuid))?;
        Ok(found
            .characteristics
            .iter()
            .map(|c| Characteristic {
                uuid: c.uuid,
                service_uuid: service.uuid,
                value: c.value.clone(),
                is_readable: c.readable,
                is_writable_with_response: c.writable_with_response,
            })
            .collect())
    }

    async fn discover_descriptors(
        &self,
        characteristic: &Characteristic,
    ) -> Result<Vec<Descriptor>, TransportError> {
        self.record(MockCall::DiscoverDescriptors {
            characteristic: characteristic.uuid,
        })
        .await?;
        let found = self
            .find_characteristic(characteristic.service_uuid, characteristic.uuid)
            .ok_or_else(|| {
                Self::missing(
                    TransportErrorKind::DiscoveryFailed,
                    "characteristic",
                    characteristic.uuid,
                )
            })?;
        Ok(found
            .descriptors
            .into_iter()
            .map(|d| Descriptor {
                uuid: d.uuid,
                characteristic_uuid: characteristic.uuid,
                service_uuid: characteristic.service_uuid,
                value: d.value,
            })
            .collect())
    }

    async fn read_characteristic(
        &self,
        characteristic: &Characteristic,
    ) -> Result<Option<EncodedValue>, TransportError> {
        self.record(MockCall::ReadCharacteristic {
            characteristic: characteristic.uuid,
        })
        .await?;
        self.find_characteristic(characteristic.service_uuid, characteristic.uuid)
            .map(|c| c.value)
            .ok_or_else(|| {
                Self::missing(
                    TransportErrorKind::ReadFailed,
                    "characteristic",
                    characteristic.uuid,
                )
            })
    }

    async fn write_characteristic(
        &self,
        characteristic: &Characteristic,
        value: &str,
        with_response: bool,
    ) -> Result<(), TransportError> {
        self.record(MockCall::WriteCharacteristic {
            characteristic: characteristic.uuid,
            value: value.to_string(),
            with_response,
        })
        .await
    }

    async fn read_descriptor(
        &self,
        descriptor: &Descriptor,
    ) -> Result<Option<EncodedValue>, TransportError> {
        self.record(MockCall::ReadDescriptor {
            descriptor: descriptor.uuid,
        })
        .await?;
        let found = self
            .find_characteristic(descriptor.service_uuid, descriptor.characteristic_uuid)
            .and_then(|c| c.descriptors.into_iter().find(|d| d.uuid == descriptor.uuid))
            .ok_or_else(|| {
                Self::missing(TransportErrorKind::ReadFailed, "descriptor", descriptor.uuid)
            })?;
        Ok(found.value)
    }

    async fn write_descriptor(
        &self,
        descriptor: &Descriptor,
        value: &str,
    ) -> Result<(), TransportError> {
        self.record(MockCall::WriteDescriptor {
            descriptor: descriptor.uuid,
            value: value.to_string(),
        })
        .await
    }

    async fn request_mtu(
        &self,
        _peripheral: &PeripheralHandle,
        mtu: u16,
    ) -> Result<u16, TransportError> {
        self.record(MockCall::RequestMtu { mtu }).await?;
        Ok(self.mtu.get().unwrap_or(mtu))
    }
}
