//! Shared session state.
//!
//! All observable state lives in one [`AppState`] value. Changes are
//! expressed as [`Action`]s and applied by [`AppState::reduce`], which
//! returns the whole next state. [`Store`] is the single writer; readers
//! get snapshots.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use log::info;

use crate::ble::connection::{ConnectionEvent, ConnectionState};
use crate::ble::{AdapterState, PeripheralHandle};
use crate::ledger::EventLog;
use crate::probe::TestId;
use crate::safety::{self, DerivedMetrics};

/// Everything the operator can observe.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppState {
    pub logs: EventLog,
    pub adapter_state: AdapterState,
    pub peripheral: Option<PeripheralHandle>,
    pub connection_state: ConnectionState,
    pub current_test: Option<TestId>,
    pub is_monitoring: bool,
    /// Last weight decoded from the sensor.
    pub weight: f64,
    pub metrics: DerivedMetrics,
}

/// State changes.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Log(String),
    ClearLogs,
    Connection(ConnectionEvent),
    AdapterStateUpdated(AdapterState),
    PeripheralFound(PeripheralHandle),
    ForgetPeripheral,
    StartMonitoring,
    StopMonitoring,
    Weight(f64),
    SetSpeed(f64),
    RefreshSafeDistance,
    ExecuteTest(TestId),
    TestFinished,
}

impl AppState {
    /// Apply `action`. Actions that are not valid in the current state
    /// return it unchanged.
    pub fn reduce(mut self, action: Action) -> Self {
        match action {
            Action::Log(line) => self.logs.push(line),
            Action::ClearLogs => self.logs.clear(),
            Action::Connection(event) => {
                if let Some(next) = self.connection_state.on_event(event) {
                    let prev = self.connection_state;
                    self.connection_state = next;
                    self.logs
                        .push(format!("Connection state changed: {prev} -> {next}"));
                }
            }
            Action::AdapterStateUpdated(state) => {
                self.adapter_state = state;
                self.logs.push(format!("BLE state changed: {state}"));
            }
            Action::PeripheralFound(handle) => {
                if self.peripheral.is_none() {
                    self.logs.push(format!("Peripheral found: {}", handle.id));
                    self.peripheral = Some(handle);
                }
            }
            Action::ForgetPeripheral => {
                if self.connection_state.can_forget() {
                    self.peripheral = None;
                }
            }
            Action::StartMonitoring => self.is_monitoring = true,
            Action::StopMonitoring => self.is_monitoring = false,
            Action::Weight(weight) => {
                self.weight = weight;
                self.metrics = DerivedMetrics::compute(self.metrics.speed, weight);
            }
            Action::SetSpeed(speed) => {
                let speed = safety::clamp_speed(speed);
                self.metrics = DerivedMetrics::compute(speed, self.weight);
            }
            Action::RefreshSafeDistance => {
                self.metrics = DerivedMetrics::compute(self.metrics.speed, self.weight);
            }
            Action::ExecuteTest(test) => {
                if self.connection_state.is_connected() && self.current_test.is_none() {
                    self.current_test = Some(test);
                }
            }
            Action::TestFinished => self.current_test = None,
        }
        self
    }
}

/// Single-writer container for [`AppState`].
pub struct Store {
    state: Mutex<CriticalSectionRawMutex, RefCell<AppState>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::with_state(AppState::default())
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: AppState) -> Self {
        Self {
            state: Mutex::new(RefCell::new(state)),
        }
    }

    /// Replace the state with `state.reduce(action)`.
    pub fn dispatch(&self, action: Action) {
        self.state.lock(|cell| {
            cell.replace_with(|state| core::mem::take(state).reduce(action));
        });
    }

    /// Append a ledger line and mirror it to the diagnostic log.
    pub fn log(&self, line: impl Into<String>) {
        let line = line.into();
        info!("{line}");
        self.dispatch(Action::Log(line));
    }

    pub fn snapshot(&self) -> AppState {
        self.state.lock(|cell| cell.borrow().clone())
    }

    /// Borrow the current state for a short read.
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        self.state.lock(|cell| f(&cell.borrow()))
    }
}
