//! Attribute transport seam.
//!
//! The session never talks to a BLE stack directly. Everything it needs
//! (link control, discovery, attribute reads and writes) goes through
//! [`GattTransport`], implemented by the btleplug adapter on the host and by
//! [`crate::mock::MockTransport`] in tests.
//!
//! Attribute values cross this boundary as base64 text, the representation
//! platform BLE bridges report them in. Implementations backed by a raw byte
//! API convert at their edge (see [`crate::probe::codec`]).

use uuid::Uuid;

use crate::ble::{ConnectionOptions, PeripheralHandle};
use crate::error::TransportError;

/// Base64 text of an attribute value.
pub type EncodedValue = String;

/// A service exposed by the connected peripheral.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    pub uuid: Uuid,
}

/// A characteristic as reported by discovery.
///
/// Valid only for the connection session it was discovered in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub service_uuid: Uuid,
    /// Last value the transport knows about, if any.
    pub value: Option<EncodedValue>,
    pub is_readable: bool,
    pub is_writable_with_response: bool,
}

/// A descriptor as reported by discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub service_uuid: Uuid,
    pub value: Option<EncodedValue>,
}

/// Raw attribute operations against one peripheral.
///
/// Calls are awaited one at a time by the session; implementations do not
/// need to support overlapping requests. No call is expected to time out on
/// its own.
pub trait GattTransport {
    /// Establish the link.
    async fn connect(
        &self,
        peripheral: &PeripheralHandle,
        options: &ConnectionOptions,
    ) -> Result<(), TransportError>;

    /// Tear the link down.
    async fn disconnect(&self, peripheral: &PeripheralHandle) -> Result<(), TransportError>;

    /// Resolve and list the peripheral's services, in transport order.
    async fn discover_services(
        &self,
        peripheral: &PeripheralHandle,
    ) -> Result<Vec<Service>, TransportError>;

    async fn discover_characteristics(
        &self,
        service: &Service,
    ) -> Result<Vec<Characteristic>, TransportError>;

    async fn discover_descriptors(
        &self,
        characteristic: &Characteristic,
    ) -> Result<Vec<Descriptor>, TransportError>;

    /// Read a characteristic. `None` when the peripheral returned no value.
    async fn read_characteristic(
        &self,
        characteristic: &Characteristic,
    ) -> Result<Option<EncodedValue>, TransportError>;

    async fn write_characteristic(
        &self,
        characteristic: &Characteristic,
        value: &str,
        with_response: bool,
    ) -> Result<(), TransportError>;

    async fn read_descriptor(
        &self,
        descriptor: &Descriptor,
    ) -> Result<Option<EncodedValue>, TransportError>;

    /// Write a descriptor. A refused write is reported with
    /// [`TransportErrorKind::DescriptorWriteNotPermitted`](crate::error::TransportErrorKind).
    async fn write_descriptor(&self, descriptor: &Descriptor, value: &str)
        -> Result<(), TransportError>;

    /// Ask for a larger ATT MTU. Returns the negotiated size.
    async fn request_mtu(
        &self,
        peripheral: &PeripheralHandle,
        mtu: u16,
    ) -> Result<u16, TransportError>;
}
