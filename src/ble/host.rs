//! btleplug-backed transport for desktop hosts.
//!
//! Wraps one platform adapter and the peripheral the session connected to.
//! btleplug works on raw bytes; values are converted to and from base64 text
//! here so the routines see the same representation on every transport.
//!
//! btleplug keeps services and characteristics in ordered sets, so
//! "transport order" on this adapter is ascending UUID order.

use core::cell::RefCell;

use btleplug::api::{
    Central, CentralState, CharPropFlags, Characteristic as BtCharacteristic,
    Descriptor as BtDescriptor, Peripheral as _, WriteType,
};
use btleplug::platform::{Adapter, Peripheral};
use log::debug;

use crate::ble::transport::{Characteristic, Descriptor, EncodedValue, GattTransport, Service};
use crate::ble::{AdapterState, ConnectionOptions, PeripheralHandle};
use crate::error::{TransportError, TransportErrorKind};
use crate::probe::codec;

/// ATT "Write Not Permitted".
const ATT_WRITE_NOT_PERMITTED: u8 = 0x03;

/// Stable string id for a btleplug peripheral.
pub fn peripheral_id(peripheral: &Peripheral) -> String {
    format!("{:?}", peripheral.id())
}

/// Radio state as reported by btleplug. btleplug only distinguishes on, off
/// and unknown.
pub fn adapter_state(state: CentralState) -> AdapterState {
    match state {
        CentralState::PoweredOn => AdapterState::PoweredOn,
        CentralState::PoweredOff => AdapterState::PoweredOff,
        CentralState::Unknown => AdapterState::Unknown,
    }
}

/// Build a handle for `peripheral` if its advertised name starts with
/// `prefix`.
pub async fn matching_handle(
    peripheral: &Peripheral,
    prefix: &str,
) -> Result<Option<PeripheralHandle>, TransportError> {
    let Some(props) = peripheral
        .properties()
        .await
        .map_err(|e| map_error(TransportErrorKind::Other, e))?
    else {
        return Ok(None);
    };
    let Some(name) = props.local_name.filter(|n| n.starts_with(prefix)) else {
        return Ok(None);
    };

    let mut handle = PeripheralHandle::new(
        peripheral_id(peripheral),
        peripheral.address().into_inner(),
        &name,
    );
    if let Some(rssi) = props.rssi {
        handle = handle.with_rssi(rssi);
    }
    Ok(Some(handle))
}

fn map_error(kind: TransportErrorKind, err: btleplug::Error) -> TransportError {
    let kind = match err {
        btleplug::Error::NotConnected => TransportErrorKind::NotConnected,
        btleplug::Error::NotSupported(_) => TransportErrorKind::Unsupported,
        _ => kind,
    };
    TransportError::new(kind, err.to_string())
}

fn descriptor_write_error(err: btleplug::Error) -> TransportError {
    let refused = matches!(err, btleplug::Error::PermissionDenied)
        || err.to_string().to_ascii_lowercase().contains("not permitted");
    if refused {
        TransportError::new(TransportErrorKind::DescriptorWriteNotPermitted, err.to_string())
            .with_att_code(ATT_WRITE_NOT_PERMITTED)
    } else {
        map_error(TransportErrorKind::WriteFailed, err)
    }
}

fn to_value(bytes: &[u8]) -> Option<EncodedValue> {
    (!bytes.is_empty()).then(|| codec::encode_bytes(bytes))
}

fn to_bytes(value: &str, kind: TransportErrorKind) -> Result<Vec<u8>, TransportError> {
    codec::decode_bytes(value).map_err(|e| TransportError::new(kind, e.to_string()))
}

pub struct BtleplugTransport {
    adapter: Adapter,
    active: RefCell<Option<Peripheral>>,
}

impl BtleplugTransport {
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            active: RefCell::new(None),
        }
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    fn peripheral(&self) -> Result<Peripheral, TransportError> {
        self.active.borrow().clone().ok_or_else(|| {
            TransportError::new(TransportErrorKind::NotConnected, "no active peripheral")
        })
    }

    async fn lookup(&self, handle: &PeripheralHandle) -> Result<Peripheral, TransportError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| map_error(TransportErrorKind::ConnectionFailed, e))?;
        peripherals
            .into_iter()
            .find(|p| peripheral_id(p) == handle.id)
            .ok_or_else(|| {
                TransportError::new(
                    TransportErrorKind::ConnectionFailed,
                    format!("Device {} not found", handle.id),
                )
            })
    }

    fn characteristic(&self, c: &Characteristic) -> Result<BtCharacteristic, TransportError> {
        self.peripheral()?
            .characteristics()
            .into_iter()
            .find(|bt| bt.uuid == c.uuid && bt.service_uuid == c.service_uuid)
            .ok_or_else(|| {
                TransportError::new(
                    TransportErrorKind::DiscoveryFailed,
                    format!("Characteristic {} not found", c.uuid),
                )
            })
    }

    fn descriptor(&self, d: &Descriptor) -> Result<BtDescriptor, TransportError> {
        self.peripheral()?
            .characteristics()
            .into_iter()
            .filter(|c| c.uuid == d.characteristic_uuid && c.service_uuid == d.service_uuid)
            .flat_map(|c| c.descriptors.into_iter())
            .find(|bt| bt.uuid == d.uuid)
            .ok_or_else(|| {
                TransportError::new(
                    TransportErrorKind::DiscoveryFailed,
                    format!("Descriptor {} not found", d.uuid),
                )
            })
    }
}

impl GattTransport for BtleplugTransport {
    async fn connect(
        &self,
        handle: &PeripheralHandle,
        options: &ConnectionOptions,
    ) -> Result<(), TransportError> {
        let peripheral = self.lookup(handle).await?;
        if options.auto_reconnect {
            debug!("auto-reconnect requested; btleplug does not reconnect on its own");
        }
        if !peripheral.is_connected().await.unwrap_or(false) {
            peripheral
                .connect()
                .await
                .map_err(|e| map_error(TransportErrorKind::ConnectionFailed, e))?;
        }
        *self.active.borrow_mut() = Some(peripheral);
        Ok(())
    }

    async fn disconnect(&self, _handle: &PeripheralHandle) -> Result<(), TransportError> {
        let peripheral = self.peripheral()?;
        peripheral
            .disconnect()
            .await
            .map_err(|e| map_error(TransportErrorKind::Other, e))?;
        self.active.borrow_mut().take();
        Ok(())
    }

    async fn discover_services(
        &self,
        _handle: &PeripheralHandle,
    ) -> Result<Vec<Service>, TransportError> {
        let peripheral = self.peripheral()?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| map_error(TransportErrorKind::DiscoveryFailed, e))?;
        Ok(peripheral
            .services()
            .into_iter()
            .map(|s| Service { uuid: s.uuid })
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &Service,
    ) -> Result<Vec<Characteristic>, TransportError> {
        Ok(self
            .peripheral()?
            .characteristics()
            .into_iter()
            .filter(|c| c.service_uuid == service.uuid)
            .map(|c| Characteristic {
                uuid: c.uuid,
                service_uuid: c.service_uuid,
                value: None,
                is_readable: c.properties.contains(CharPropFlags::READ),
                is_writable_with_response: c.properties.contains(CharPropFlags::WRITE),
            })
            .collect())
    }

    async fn discover_descriptors(
        &self,
        characteristic: &Characteristic,
    ) -> Result<Vec<Descriptor>, TransportError> {
        let bt = self.characteristic(characteristic)?;
        Ok(bt
            .descriptors
            .into_iter()
            .map(|d| Descriptor {
                uuid: d.uuid,
                characteristic_uuid: d.characteristic_uuid,
                service_uuid: d.service_uuid,
                value: None,
            })
            .collect())
    }

    async fn read_characteristic(
        &self,
        characteristic: &Characteristic,
    ) -> Result<Option<EncodedValue>, TransportError> {
        let bt = self.characteristic(characteristic)?;
        let bytes = self
            .peripheral()?
            .read(&bt)
            .await
            .map_err(|e| map_error(TransportErrorKind::ReadFailed, e))?;
        Ok(to_value(&bytes))
    }

    async fn write_characteristic(
        &self,
        characteristic: &Characteristic,
        value: &str,
        with_response: bool,
    ) -> Result<(), TransportError> {
        let bt = self.characteristic(characteristic)?;
        let bytes = to_bytes(value, TransportErrorKind::WriteFailed)?;
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral()?
            .write(&bt, &bytes, write_type)
            .await
            .map_err(|e| map_error(TransportErrorKind::WriteFailed, e))
    }

    async fn read_descriptor(
        &self,
        descriptor: &Descriptor,
    ) -> Result<Option<EncodedValue>, TransportError> {
        let bt = self.descriptor(descriptor)?;
        let bytes = self
            .peripheral()?
            .read_descriptor(&bt)
            .await
            .map_err(|e| map_error(TransportErrorKind::ReadFailed, e))?;
        Ok(to_value(&bytes))
    }

    async fn write_descriptor(
        &self,
        descriptor: &Descriptor,
        value: &str,
    ) -> Result<(), TransportError> {
        let bt = self.descriptor(descriptor)?;
        let bytes = to_bytes(value, TransportErrorKind::WriteFailed)?;
        self.peripheral()?
            .write_descriptor(&bt, &bytes)
            .await
            .map_err(descriptor_write_error)
    }

    async fn request_mtu(
        &self,
        _handle: &PeripheralHandle,
        _mtu: u16,
    ) -> Result<u16, TransportError> {
        Err(TransportError::new(
            TransportErrorKind::Unsupported,
            "MTU negotiation is handled by the platform",
        ))
    }
}
