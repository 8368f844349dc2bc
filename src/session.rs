//! Session orchestration.
//!
//! [`Session`] ties the transport to the state store: operator commands are
//! checked against the connection state, forwarded to the transport, and
//! the outcome is fed back as connection events. Commands that are not
//! valid in the current state are ignored.

use log::{info, warn};

use crate::ble::connection::{ConnectionEvent, ConnectionState};
use crate::ble::transport::GattTransport;
use crate::ble::{AdapterState, ConnectionOptions, PeripheralHandle};
use crate::error::TransportError;
use crate::probe::TestId;
use crate::store::{Action, AppState, Store};

pub struct Session<T: GattTransport> {
    transport: T,
    store: Store,
}

impl<T: GattTransport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            store: Store::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn snapshot(&self) -> AppState {
        self.store.snapshot()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.store.read(|s| s.connection_state)
    }

    // Transport notifications

    pub fn on_adapter_state(&self, state: AdapterState) {
        info!("adapter state: {state}");
        self.store.dispatch(Action::AdapterStateUpdated(state));
    }

    /// A scan result. Kept only if no peripheral is held yet.
    pub fn on_peripheral_found(&self, peripheral: PeripheralHandle) {
        self.store.dispatch(Action::PeripheralFound(peripheral));
    }

    /// The link to `peripheral_id` went down without being asked to.
    pub fn on_link_lost(&self, peripheral_id: &str) {
        let held = self
            .store
            .read(|s| s.peripheral.as_ref().is_some_and(|p| p.id == peripheral_id));
        if held {
            warn!("link lost: {peripheral_id}");
            self.store
                .dispatch(Action::Connection(ConnectionEvent::LinkLost));
        }
    }

    // Operator commands

    pub async fn connect(&self) {
        self.connect_with_options(ConnectionOptions::default()).await;
    }

    pub async fn connect_with_options(&self, options: ConnectionOptions) {
        let Some(peripheral) = self.store.read(|s| {
            (s.connection_state == ConnectionState::Disconnected)
                .then(|| s.peripheral.clone())
                .flatten()
        }) else {
            return;
        };

        self.store
            .dispatch(Action::Connection(ConnectionEvent::ConnectRequested));
        info!("connecting to {peripheral} (mtu {})", options.mtu);

        if let Err(e) = self.establish(&peripheral, &options).await {
            warn!("connect failed: {e}");
            self.store.log(e.log_line());
            self.store
                .dispatch(Action::Connection(ConnectionEvent::LinkLost));
        }
    }

    async fn establish(
        &self,
        peripheral: &PeripheralHandle,
        options: &ConnectionOptions,
    ) -> Result<(), TransportError> {
        self.transport.connect(peripheral, options).await?;
        self.store
            .dispatch(Action::Connection(ConnectionEvent::Connected));
        let services = self.transport.discover_services(peripheral).await?;
        info!("{} services resolved", services.len());
        self.store
            .dispatch(Action::Connection(ConnectionEvent::ServicesResolved));
        Ok(())
    }

    pub async fn disconnect(&self) {
        let Some(peripheral) = self.store.read(|s| {
            s.connection_state
                .is_connected()
                .then(|| s.peripheral.clone())
                .flatten()
        }) else {
            return;
        };

        self.store
            .dispatch(Action::Connection(ConnectionEvent::DisconnectRequested));

        match self.transport.disconnect(&peripheral).await {
            Ok(()) => self
                .store
                .dispatch(Action::Connection(ConnectionEvent::Disconnected)),
            Err(e) => {
                warn!("disconnect failed: {e}");
                self.store.log(e.log_line());
                self.store
                    .dispatch(Action::Connection(ConnectionEvent::LinkLost));
            }
        }
    }

    /// Release the held peripheral. Only while DISCONNECTED or DISCONNECTING.
    pub fn forget(&self) {
        self.store.dispatch(Action::ForgetPeripheral);
    }

    pub fn clear_logs(&self) {
        self.store.dispatch(Action::ClearLogs);
    }

    pub fn set_speed(&self, speed_kmh: f64) {
        self.store.dispatch(Action::SetSpeed(speed_kmh));
    }

    /// Run one routine.
    ///
    /// `None` when rejected (not CONNECTED, or another routine is active);
    /// otherwise the routine's result.
    pub async fn execute_test(&self, test: TestId) -> Option<bool> {
        let peripheral = self.store.read(|s| {
            (s.connection_state.is_connected() && s.current_test.is_none())
                .then(|| s.peripheral.clone())
                .flatten()
        })?;

        self.store.dispatch(Action::ExecuteTest(test));
        let _running = RunningTest(&self.store);
        info!("running {test}");
        let passed = test.run(&self.transport, &peripheral, &self.store).await;
        info!("{test} finished: {}", if passed { "ok" } else { "failed" });
        Some(passed)
    }

    /// One monitoring pass: flag monitoring, refresh the derived distance,
    /// then take a weight reading.
    pub async fn monitor_tick(&self) -> Option<bool> {
        self.store.dispatch(Action::StartMonitoring);
        self.store.dispatch(Action::RefreshSafeDistance);
        self.execute_test(TestId::ReadWeightData).await
    }

    pub fn stop_monitoring(&self) {
        self.store.dispatch(Action::StopMonitoring);
    }
}

/// Clears `current_test` when a routine ends, including when its future is
/// dropped mid-walk.
struct RunningTest<'a>(&'a Store);

impl Drop for RunningTest<'_> {
    fn drop(&mut self) {
        self.0.dispatch(Action::TestFinished);
    }
}
