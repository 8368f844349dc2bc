//! Periodic weight monitoring.
//!
//! Once started, the loop takes a weight reading, then waits
//! `MONITOR_INTERVAL_MS` before the next one. Starting again while a wait
//! is pending drops that wait and reads immediately. Starting again while a
//! reading is in flight only restarts the wait that follows it, so there is
//! one reading per interval and readings never overlap. Stopping drops the
//! pending wait and idles the loop until the next start.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info};

use crate::ble::transport::GattTransport;
use crate::config;
use crate::session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonitorCommand {
    Start,
    Stop,
}

/// Handle to a monitoring loop. Commands are latest-wins.
pub struct Monitor {
    commands: Signal<CriticalSectionRawMutex, MonitorCommand>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    pub const fn new() -> Self {
        Self {
            commands: Signal::new(),
        }
    }

    /// Start monitoring, or restart the schedule if already running.
    pub fn start(&self) {
        self.commands.signal(MonitorCommand::Start);
    }

    pub fn stop(&self) {
        self.commands.signal(MonitorCommand::Stop);
    }

    /// Drive the loop. Never returns; run it alongside the command source.
    pub async fn run<T: GattTransport, D: DelayNs>(&self, session: &Session<T>, mut delay: D) {
        loop {
            if self.commands.wait().await == MonitorCommand::Stop {
                continue;
            }
            info!("monitoring started");

            loop {
                match session.monitor_tick().await {
                    Some(ok) => debug!("monitor reading done: {ok}"),
                    None => debug!("monitor reading skipped"),
                }

                // A start issued during the reading only restarts the wait.
                if self.commands.try_take() == Some(MonitorCommand::Stop) {
                    session.stop_monitoring();
                    info!("monitoring stopped");
                    break;
                }

                match select(
                    delay.delay_ms(config::MONITOR_INTERVAL_MS),
                    self.commands.wait(),
                )
                .await
                {
                    Either::First(()) => {}
                    Either::Second(MonitorCommand::Start) => debug!("monitor rescheduled"),
                    Either::Second(MonitorCommand::Stop) => {
                        session.stop_monitoring();
                        info!("monitoring stopped");
                        break;
                    }
                }
            }
        }
    }
}
