//! Weight sensor command/response routines.
//!
//! `READ_WEIGHT_SENSOR_INFO` and `READ_WEIGHT_DATA` share one walk: write a
//! base64 command to the command characteristic, then read the answer from
//! the response characteristic. The response characteristic precedes the
//! command characteristic in the firmware's table, so by the time the
//! command is written it has already been seen and cached.

use log::{debug, info, warn};

use crate::ble::transport::{Characteristic, GattTransport};
use crate::ble::{uuids, PeripheralHandle};
use crate::config;
use crate::error::ProbeError;
use crate::probe::codec;
use crate::probe::TestId;
use crate::store::{Action, Store};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Query {
    SensorInfo,
    Reading,
}

impl Query {
    const fn command(self) -> &'static str {
        match self {
            Query::SensorInfo => "getWeightSensorInfo",
            Query::Reading => "getWeightReading",
        }
    }

    const fn test(self) -> TestId {
        match self {
            Query::SensorInfo => TestId::ReadWeightSensorInfo,
            Query::Reading => TestId::ReadWeightData,
        }
    }
}

/// `READ_WEIGHT_SENSOR_INFO`. On failure the live weight is reset to zero.
pub async fn read_weight_sensor_info<T: GattTransport>(
    transport: &T,
    peripheral: &PeripheralHandle,
    store: &Store,
) -> bool {
    store.log(Query::SensorInfo.test().title());
    match query(transport, peripheral, store, Query::SensorInfo).await {
        Ok(()) => true,
        Err(e) => {
            warn!("weight sensor info failed: {e}");
            store.log(e.log_line());
            store.dispatch(Action::Weight(0.0));
            false
        }
    }
}

/// `READ_WEIGHT_DATA`. The first field of the response record becomes the
/// live weight. On failure the live weight is left as it was.
pub async fn read_weight_data<T: GattTransport>(
    transport: &T,
    peripheral: &PeripheralHandle,
    store: &Store,
) -> bool {
    store.log(Query::Reading.test().title());
    match query(transport, peripheral, store, Query::Reading).await {
        Ok(()) => true,
        Err(e) => {
            warn!("weight reading failed: {e}");
            store.log(e.log_line());
            false
        }
    }
}

async fn query<T: GattTransport>(
    transport: &T,
    peripheral: &PeripheralHandle,
    store: &Store,
    query: Query,
) -> Result<(), ProbeError> {
    match transport.request_mtu(peripheral, config::PROBE_MTU).await {
        Ok(mtu) => debug!("MTU negotiated: {mtu}"),
        Err(e) => debug!("MTU request ignored: {e}"),
    }

    let mut response: Option<Characteristic> = None;

    for service in transport.discover_services(peripheral).await? {
        for characteristic in transport.discover_characteristics(&service).await? {
            if uuids::is_standard_attribute(&characteristic.uuid) {
                continue;
            }

            if characteristic.uuid == uuids::COMMAND_CHARACTERISTIC {
                send_command(transport, &characteristic, response.as_ref(), store, query).await?;
            }

            if characteristic.uuid == uuids::RESPONSE_CHARACTERISTIC {
                if let Some(value) = transport.read_characteristic(&characteristic).await? {
                    let text = codec::decode_text(&value)?;
                    store.log(format!("Got string value: {text}"));
                }
                response = Some(characteristic.clone());
            }

            for descriptor in transport.discover_descriptors(&characteristic).await? {
                if descriptor.uuid == uuids::CLIENT_CHARACTERISTIC_CONFIG {
                    continue;
                }
                store.log(format!("*** Found descriptor: {}", descriptor.uuid));
                let value = transport.read_descriptor(&descriptor).await?;
                store.log(format!(
                    "Descriptor value: {}",
                    value.as_deref().unwrap_or("null")
                ));
            }
        }
    }
    Ok(())
}

async fn send_command<T: GattTransport>(
    transport: &T,
    command: &Characteristic,
    response: Option<&Characteristic>,
    store: &Store,
    query: Query,
) -> Result<(), ProbeError> {
    store.log(format!("Writing: {}", query.command()));
    transport
        .write_characteristic(command, &codec::encode_command(query.command()), true)
        .await?;

    let Some(response) = response else {
        debug!("no response characteristic seen yet, skipping read-back");
        return Ok(());
    };
    let Some(value) = transport.read_characteristic(response).await? else {
        return Ok(());
    };

    let text = codec::decode_text(&value)?;
    store.log(format!("Got string value: {text}"));

    if query == Query::Reading {
        let weight = codec::first_field_value(&text)?;
        info!("weight reading: {weight}");
        store.dispatch(Action::Weight(weight));
    }
    Ok(())
}
