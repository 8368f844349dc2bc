//! `corehub` - operator console for a CoreHub weight sensor.
//!
//! Scans with the first Bluetooth adapter, hands the first peripheral whose
//! name starts with the prefix (`CoreHub`, or the first argument) to the
//! session and reads commands from stdin. `help` lists them.

use anyhow::{Context, Result};
use btleplug::api::{Central, CentralEvent, Manager as _, ScanFilter};
use btleplug::platform::{Manager, PeripheralId};
use embassy_futures::select::{select, Either};
use futures::stream::{Stream, StreamExt};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use corehub::ble::host::{self, BtleplugTransport};
use corehub::ble::AdapterState;
use corehub::config;
use corehub::monitor::Monitor;
use corehub::probe::TestId;
use corehub::session::Session;

type HostSession = Session<BtleplugTransport>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let prefix = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::PERIPHERAL_NAME_PREFIX.to_string());

    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .context("No Bluetooth adapter found")?;

    let radio = match adapter.adapter_state().await {
        Ok(state) => host::adapter_state(state),
        Err(e) => {
            warn!("could not read adapter state: {e}");
            AdapterState::Unknown
        }
    };

    let mut events = adapter.events().await?;
    adapter
        .start_scan(ScanFilter::default())
        .await
        .context("Failed to start scan")?;
    info!("scanning for peripherals named {prefix}*");

    let session = Session::new(BtleplugTransport::new(adapter));
    session.on_adapter_state(radio);
    let monitor = Monitor::new();

    print_help();

    let commands = console(&session, &monitor, &mut events, &prefix);
    match select(monitor.run(&session, embassy_time::Delay), commands).await {
        Either::First(()) => Ok(()),
        Either::Second(result) => result,
    }
}

async fn console(
    session: &HostSession,
    monitor: &Monitor,
    events: &mut (impl Stream<Item = CentralEvent> + Unpin),
    prefix: &str,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0usize;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { return Ok(()) };
                if !run_command(session, monitor, line.trim()).await {
                    return Ok(());
                }
                printed = print_new_entries(session, printed);
            }
            Some(event) = events.next() => {
                on_central_event(session, prefix, event).await;
                printed = print_new_entries(session, printed);
            }
        }
    }
}

async fn on_central_event(session: &HostSession, prefix: &str, event: CentralEvent) {
    match event {
        // The local name may only show up in a later advertisement.
        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
            adopt_if_matching(session, prefix, &id).await
        }
        CentralEvent::DeviceDisconnected(id) => session.on_link_lost(&format!("{id:?}")),
        CentralEvent::StateUpdate(state) => session.on_adapter_state(host::adapter_state(state)),
        _ => {}
    }
}

async fn adopt_if_matching(session: &HostSession, prefix: &str, id: &PeripheralId) {
    if session.store().read(|s| s.peripheral.is_some()) {
        return;
    }
    let Ok(peripheral) = session.transport().adapter().peripheral(id).await else {
        return;
    };
    match host::matching_handle(&peripheral, prefix).await {
        Ok(Some(handle)) => session.on_peripheral_found(handle),
        Ok(None) => {}
        Err(e) => warn!("could not read peripheral properties: {e}"),
    }
}

/// Returns `false` when the operator asked to quit.
async fn run_command(session: &HostSession, monitor: &Monitor, line: &str) -> bool {
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (None, _) => {}
        (Some("connect"), _) => session.connect().await,
        (Some("disconnect"), _) => session.disconnect().await,
        (Some("forget"), _) => session.forget(),
        (Some("test"), Some(id)) => match id.parse::<TestId>() {
            Ok(test) => match session.execute_test(test).await {
                Some(true) => println!("{}: passed", test.title()),
                Some(false) => println!("{}: failed", test.title()),
                None => println!("{}: not run (not connected or busy)", test.title()),
            },
            Err(e) => println!("{e}"),
        },
        (Some("tests"), _) => {
            for test in TestId::ALL {
                println!("  {:<26} {}", test.id(), test.title());
            }
        }
        (Some("monitor"), _) => monitor.start(),
        (Some("stop"), _) => monitor.stop(),
        (Some("speed"), Some(value)) => match value.parse::<f64>() {
            Ok(speed) => {
                session.set_speed(speed);
                print_metrics(session);
            }
            Err(_) => println!("invalid speed: {value}"),
        },
        (Some("status"), _) => print_status(session),
        (Some("logs"), _) => {
            for line in session.store().read(|s| s.logs.to_vec()) {
                println!("  {line}");
            }
        }
        (Some("clear"), _) => session.clear_logs(),
        (Some("quit" | "exit"), _) => return false,
        (Some("help"), _) => print_help(),
        (Some(other), _) => println!("unknown command: {other} (try `help`)"),
    }
    true
}

/// Print ledger lines added since the last call, oldest first.
fn print_new_entries(session: &HostSession, printed: usize) -> usize {
    let (total, fresh) = session
        .store()
        .read(|s| (s.logs.len(), s.logs.added_since(printed)));
    for line in fresh {
        println!("> {line}");
    }
    total
}

fn print_status(session: &HostSession) {
    let s = session.snapshot();
    println!("adapter:     {}", s.adapter_state);
    println!("connection:  {}", s.connection_state);
    match &s.peripheral {
        Some(p) => println!("peripheral:  {} [{}]", p, p.name),
        None => println!("peripheral:  none"),
    }
    match s.current_test {
        Some(t) => println!("running:     {}", t.title()),
        None => println!("running:     -"),
    }
    println!("monitoring:  {}", s.is_monitoring);
    println!("weight:      {}", s.weight);
    print_metrics(session);
}

fn print_metrics(session: &HostSession) {
    let m = session.snapshot().metrics;
    match m.safe_distance {
        Some(d) => println!("speed:       {:.1} km/h, safe distance {d:.2} m", m.speed),
        None => println!("speed:       {:.1} km/h, safe distance -", m.speed),
    }
}

fn print_help() {
    println!("commands:");
    println!("  connect | disconnect | forget");
    println!("  tests            list routines");
    println!("  test <ID>        run a routine");
    println!("  monitor | stop   periodic weight reading");
    println!("  speed <km/h>     set speed (0-450)");
    println!("  status | logs | clear | quit");
}
