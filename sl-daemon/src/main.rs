//! SensorLink Daemon (sensorlinkd)
//!
//! Streams a selected subset of the host's hardware sensors over a serial
//! link to a small downstream device (e.g. a microcontroller driving a
//! display).
//!
//! Two independently scheduled activities drive the daemon:
//! - a refresh activity re-reads the hardware feed on a short interval and
//!   publishes the latest snapshot,
//! - a transmit activity, on a longer interval, copies the snapshot and
//!   runs the collect → encode → send pipeline onto the serial port.
//!
//! Neither blocks the other: the snapshot swap is the only shared lock and
//! it is never held across feed enumeration or a serial write.

mod hwmon_feed;
mod monitor;
mod session;
mod transport;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use sl_core::config::{load_config, AppConfig};
use sl_core::constants::registry::DEFAULT_MAX_AGE_DAYS;
use sl_core::{SensorCollector, SensorFeed, SensorRegistry};
use sl_protocol::ProtocolMode;

use hwmon_feed::HwmonFeed;
use monitor::SensorMonitor;
use session::TelemetrySession;
use transport::{available_ports, SerialPortLink};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often the run loop logs delivery statistics
const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Transmit ticks between reconnect attempts after a lost link
const RECONNECT_EVERY_TICKS: u32 = 10;

// ============================================================================
// CLI
// ============================================================================

enum Command {
    Run,
    ListPorts,
    ListSensors,
    Export { path: String },
    Cleanup { days: u64 },
    ResetRegistry,
}

struct CliArgs {
    command: Command,
    port: Option<String>,
    baud: Option<u32>,
    mode: Option<ProtocolMode>,
    interval_ms: Option<u64>,
}

fn print_help() {
    eprintln!("sensorlinkd {} - hardware telemetry over serial", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    sensorlinkd [OPTIONS] [COMMAND]");
    eprintln!();
    eprintln!("COMMANDS:");
    eprintln!("    run               Stream telemetry (default)");
    eprintln!("    list-ports        List serial ports on this machine");
    eprintln!("    list-sensors      List feed sensors and their compact ids");
    eprintln!("    export PATH       Write the firmware id header to PATH");
    eprintln!("    cleanup [DAYS]    Drop sensors unseen for DAYS days (default {})", DEFAULT_MAX_AGE_DAYS);
    eprintln!("    reset-registry    Clear the sensor id map");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -p, --port PORT       Serial port (overrides config)");
    eprintln!("    -b, --baud RATE       Baud rate (overrides config)");
    eprintln!("    -m, --mode MODE       Wire format: binary, text or json");
    eprintln!("    -i, --interval MS     Transmit interval in milliseconds");
    eprintln!("    -v, --version         Print version");
    eprintln!("    -h, --help            Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    SENSORLINK_LOG    Log level (trace, debug, info, warn, error)");
}

fn parse_mode(s: &str) -> Option<ProtocolMode> {
    match s.to_ascii_lowercase().as_str() {
        "binary" => Some(ProtocolMode::Binary),
        "text" => Some(ProtocolMode::Text),
        "json" => Some(ProtocolMode::Json),
        _ => None,
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        command: Command::Run,
        port: None,
        baud: None,
        mode: None,
        interval_ms: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                println!("sensorlinkd {}", VERSION);
                std::process::exit(0);
            }
            "-p" | "--port" => {
                i += 1;
                cli.port = Some(expect_value(&args, i, "--port"));
            }
            "-b" | "--baud" => {
                i += 1;
                let raw = expect_value(&args, i, "--baud");
                cli.baud = Some(raw.parse().unwrap_or_else(|_| {
                    eprintln!("Error: invalid baud rate {:?}", raw);
                    std::process::exit(1);
                }));
            }
            "-m" | "--mode" => {
                i += 1;
                let raw = expect_value(&args, i, "--mode");
                cli.mode = Some(parse_mode(&raw).unwrap_or_else(|| {
                    eprintln!("Error: unknown mode {:?} (binary, text or json)", raw);
                    std::process::exit(1);
                }));
            }
            "-i" | "--interval" => {
                i += 1;
                let raw = expect_value(&args, i, "--interval");
                cli.interval_ms = Some(raw.parse().unwrap_or_else(|_| {
                    eprintln!("Error: invalid interval {:?}", raw);
                    std::process::exit(1);
                }));
            }
            "run" => cli.command = Command::Run,
            "list-ports" => cli.command = Command::ListPorts,
            "list-sensors" => cli.command = Command::ListSensors,
            "export" => {
                i += 1;
                cli.command = Command::Export {
                    path: expect_value(&args, i, "export"),
                };
            }
            "cleanup" => {
                let days = args.get(i + 1).and_then(|s| s.parse().ok());
                if days.is_some() {
                    i += 1;
                }
                cli.command = Command::Cleanup {
                    days: days.unwrap_or(DEFAULT_MAX_AGE_DAYS),
                };
            }
            "reset-registry" => cli.command = Command::ResetRegistry,
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }
    cli
}

fn expect_value(args: &[String], i: usize, flag: &str) -> String {
    args.get(i).cloned().unwrap_or_else(|| {
        eprintln!("Error: {} requires a value", flag);
        std::process::exit(1);
    })
}

// ============================================================================
// Commands
// ============================================================================

fn list_ports() {
    let ports = available_ports();
    if ports.is_empty() {
        println!("No serial ports found");
        return;
    }
    for port in ports {
        println!("{}", port);
    }
}

fn list_sensors(registry: &SensorRegistry) {
    let mut feed = HwmonFeed::new();
    let readings = feed.readings();
    if readings.is_empty() {
        println!("No sensors reported by the hardware feed");
    } else {
        println!("{:<8}{:<34}{:<12}{}", "ID", "NATIVE ID", "VALUE", "NAME");
        for reading in &readings {
            let id = registry
                .lookup(&reading.native_id)
                .map(|id| format!("0x{:04X}", id))
                .unwrap_or_else(|| "------".to_string());
            let value = reading
                .value
                .map(|v| format!("{:.1} {}", v, reading.unit))
                .unwrap_or_else(|| "n/a".to_string());
            println!("{:<8}{:<34}{:<12}{}", id, reading.native_id, value, reading.name);
        }
    }
    println!();
    println!("{}", registry.preview(None));
}

fn export_header(registry: &SensorRegistry, config: &AppConfig, path: &str) -> anyhow::Result<()> {
    let filter: Option<HashSet<String>> = if config.selected_sensors.is_empty() {
        None
    } else {
        Some(config.selected_sensors.iter().cloned().collect())
    };
    let count = registry.export(std::path::Path::new(path), filter.as_ref())?;
    println!("Exported {} sensors to {}", count, path);
    Ok(())
}

// ============================================================================
// Run Loop
// ============================================================================

fn run_stream(config: AppConfig, registry: Arc<SensorRegistry>) -> anyhow::Result<()> {
    if config.port.is_empty() {
        anyhow::bail!("no serial port configured (set --port or {:?})", sl_core::config::config_path());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Shutdown requested");
            shutdown.store(true, Ordering::SeqCst);
        })?;
    }

    let monitor = Arc::new(SensorMonitor::new(Box::new(HwmonFeed::new())));
    monitor.refresh();

    // refresh activity: short interval, owns the feed, touches nothing else
    let refresh_handle = {
        let monitor = monitor.clone();
        let shutdown = shutdown.clone();
        let interval = Duration::from_millis(config.clamped_refresh_interval_ms());
        std::thread::spawn(move || {
            while !shutdown.load(Ordering::SeqCst) {
                monitor.refresh();
                std::thread::sleep(interval);
            }
        })
    };

    let collector = SensorCollector::new(registry.clone());
    let mut session = TelemetrySession::new(SerialPortLink::new(), config.protocol_mode);
    session.connect(&config.port, config.baud_rate)?;

    if config.selected_sensors.is_empty() {
        info!("No sensor selection configured, streaming every valid sensor");
    }

    // transmit activity: longer interval, owns the serial link
    let interval = Duration::from_millis(config.send_interval_ms);
    let mut last_report = Instant::now();
    let mut ticks_disconnected = 0u32;

    while !shutdown.load(Ordering::SeqCst) {
        if session.is_connected() {
            let snapshot = monitor.snapshot();
            let selected: Vec<String> = if config.selected_sensors.is_empty() {
                snapshot.iter().map(|r| r.native_id.clone()).collect()
            } else {
                config.selected_sensors.clone()
            };
            let frame = collector.collect(&snapshot, &selected);
            session.send(&frame);
            ticks_disconnected = 0;
        } else {
            // a fatal write error dropped the link; retry on a slow cadence
            ticks_disconnected += 1;
            if ticks_disconnected >= RECONNECT_EVERY_TICKS {
                ticks_disconnected = 0;
                info!("Attempting to reconnect to {}", config.port);
                if let Err(e) = session.connect(&config.port, config.baud_rate) {
                    warn!("Reconnect failed: {}", e);
                }
            }
        }

        if last_report.elapsed() >= STATS_INTERVAL {
            let stats = session.stats();
            info!(
                "Delivery: {} sent, {} failed, {:.1}% success",
                stats.packets_sent,
                stats.packets_failed,
                session.success_rate()
            );
            last_report = Instant::now();
        }

        std::thread::sleep(interval);
    }

    session.disconnect();
    let _ = refresh_handle.join();
    if let Err(e) = registry.flush() {
        warn!("Could not flush sensor map on shutdown: {}", e);
    }
    info!("Stopped");
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> anyhow::Result<()> {
    let cli = parse_args();

    let log_level = std::env::var("SENSORLINK_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(log_level)
        .init();

    let mut config = load_config();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    if let Some(mode) = cli.mode {
        config.protocol_mode = mode;
    }
    if let Some(interval) = cli.interval_ms {
        config.send_interval_ms = interval;
    }

    let registry = Arc::new(SensorRegistry::open_default());

    let result = match cli.command {
        Command::ListPorts => {
            list_ports();
            Ok(())
        }
        Command::ListSensors => {
            list_sensors(&registry);
            Ok(())
        }
        Command::Export { path } => export_header(&registry, &config, &path),
        Command::Cleanup { days } => {
            let removed = registry.cleanup(days);
            println!("Removed {} sensors unseen for more than {} days", removed, days);
            Ok(())
        }
        Command::ResetRegistry => {
            registry.reset();
            println!("Sensor id map cleared");
            Ok(())
        }
        Command::Run => run_stream(config, registry),
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}
