//! Attribute interrogation routines.
//!
//! Each routine walks services, characteristics and descriptors of the
//! connected peripheral in transport order and performs the reads/writes of
//! one diagnostic. Routines are failure boundaries: whatever goes wrong is
//! logged as one ledger line and reported as `false`.
//!
//! 1. **dump** - `READ_ALL_CHARACTERISTICS`, full read/write-back walk.
//! 2. **weight** - `READ_WEIGHT_SENSOR_INFO` and `READ_WEIGHT_DATA`, the
//!    command/response exchange with the weight sensor.
//! 3. **codec** - base64 and payload decoding shared by both.

pub mod codec;
pub mod dump;
pub mod weight;

use core::fmt;
use core::str::FromStr;

use crate::ble::transport::GattTransport;
use crate::ble::PeripheralHandle;
use crate::error::UnknownTest;
use crate::store::Store;

/// Catalog of interrogation routines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestId {
    ReadAllCharacteristics,
    ReadWeightSensorInfo,
    ReadWeightData,
}

impl TestId {
    /// Catalog in display order.
    pub const ALL: [TestId; 3] = [
        TestId::ReadAllCharacteristics,
        TestId::ReadWeightSensorInfo,
        TestId::ReadWeightData,
    ];

    pub const fn id(self) -> &'static str {
        match self {
            TestId::ReadAllCharacteristics => "READ_ALL_CHARACTERISTICS",
            TestId::ReadWeightSensorInfo => "READ_WEIGHT_SENSOR_INFO",
            TestId::ReadWeightData => "READ_WEIGHT_DATA",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            TestId::ReadAllCharacteristics => "Read all characteristics",
            TestId::ReadWeightSensorInfo => "Read Weight Sensor Info",
            TestId::ReadWeightData => "Read Weight Data",
        }
    }

    /// Run the routine against `peripheral`. Never fails; see module docs.
    pub async fn run<T: GattTransport>(
        self,
        transport: &T,
        peripheral: &PeripheralHandle,
        store: &Store,
    ) -> bool {
        match self {
            TestId::ReadAllCharacteristics => {
                dump::read_all_characteristics(transport, peripheral, store).await
            }
            TestId::ReadWeightSensorInfo => {
                weight::read_weight_sensor_info(transport, peripheral, store).await
            }
            TestId::ReadWeightData => weight::read_weight_data(transport, peripheral, store).await,
        }
    }
}

impl FromStr for TestId {
    type Err = UnknownTest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TestId::ALL
            .into_iter()
            .find(|t| t.id() == s)
            .ok_or_else(|| UnknownTest(s.to_string()))
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
