//! PiRacer dashboard
//!
//! Composition root: parses the command line, loads configuration and
//! calibration, starts the acquisition source and the telemetry bridge, and
//! runs the event loop on a single-threaded runtime until Ctrl-C.

mod source;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use piracer_dash_core::acquisition::MotionSource;
use piracer_dash_core::calibration::CalibrationParameters;
use piracer_dash_core::config::{DashboardConfig, SearchPaths, SourceKind};
use piracer_dash_core::controller::DashboardController;
use piracer_dash_core::display::TerminalDisplay;
use piracer_dash_core::drive_mode::BridgeDirectionPolicy;
use piracer_dash_core::event_loop::{run_event_loop_with_controls, Control, LoopTiming};
use piracer_dash_core::telemetry::TelemetryBridge;

use source::AnySource;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Can,
    Serial,
    Demo,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Can => SourceKind::Can,
            SourceArg::Serial => SourceKind::Serial,
            SourceArg::Demo => SourceKind::Demo,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    Ignore,
    Accept,
}

impl From<DirectionArg> for BridgeDirectionPolicy {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Ignore => BridgeDirectionPolicy::Ignore,
            DirectionArg::Accept => BridgeDirectionPolicy::Accept,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "piracer-dash")]
#[command(about = "PiRacer instrument cluster: speed, RPM, battery, and drive mode", long_about = None)]
#[command(version)]
struct Args {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Acquisition source
    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// SocketCAN interface
    #[arg(long, value_name = "IFACE")]
    can_interface: Option<String>,

    /// Serial port to open instead of auto-discovery
    #[arg(long, value_name = "PORT")]
    serial_port: Option<String>,

    /// Whether the bridge's direction field may drive the gear display
    #[arg(long, value_enum)]
    bridge_direction: Option<DirectionArg>,

    /// Do not start the telemetry bridge
    #[arg(long, default_value_t = false)]
    no_telemetry: bool,

    /// Log filter (overrides RUST_LOG), e.g. "debug" or "piracer_dash_core=trace"
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the effective calibration to a file and exit
    WriteCalibration {
        /// Destination path
        path: PathBuf,
    },
}

impl Args {
    /// Apply command line overrides on top of the loaded configuration
    fn apply(&self, config: &mut DashboardConfig) {
        if let Some(source) = self.source {
            config.acquisition.source = source.into();
        }
        if let Some(iface) = &self.can_interface {
            config.acquisition.can_interface = iface.clone();
        }
        if let Some(port) = &self.serial_port {
            config.acquisition.serial_port = Some(port.clone());
        }
        if let Some(policy) = self.bridge_direction {
            config.drive_mode.bridge_direction = policy.into();
        }
        if self.no_telemetry {
            config.telemetry.enabled = false;
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let mut config = match &args.config {
        Some(path) => DashboardConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    args.apply(&mut config);

    let search = SearchPaths::from_env();
    let calibration = CalibrationParameters::load_or_default(&search.calibration_candidates());

    if let Some(Command::WriteCalibration { path }) = &args.command {
        calibration
            .save(path)
            .with_context(|| format!("Failed to write calibration {}", path.display()))?;
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    let result = runtime.block_on(run(config, search, calibration));
    // The stdin reader may be parked in a blocking read
    runtime.shutdown_background();
    result
}

async fn run(
    config: DashboardConfig,
    search: SearchPaths,
    calibration: CalibrationParameters,
) -> Result<()> {
    info!(version = piracer_dash_core::VERSION, "PiRacer dashboard starting");

    let mut source = AnySource::from_config(&config);

    let mut bridge = if config.telemetry.enabled {
        match TelemetryBridge::start(&config.telemetry, &search).await {
            Ok(bridge) => Some(bridge),
            Err(e) => {
                warn!("{e}; running without battery data");
                None
            }
        }
    } else {
        info!("Telemetry bridge disabled");
        None
    };

    let display = TerminalDisplay::stdout(Instant::now());
    let mut controller = DashboardController::new(&config, calibration, display);

    let controls = if std::io::stdin().is_terminal() {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(read_controls(tx));
        info!("Type 'r' + Enter to reset the session");
        Some(rx)
    } else {
        None
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    run_event_loop_with_controls(
        &mut controller,
        &mut source,
        bridge.as_mut(),
        controls,
        shutdown,
        LoopTiming::from_config(&config),
    )
    .await;

    if let Some(bridge) = bridge.as_mut() {
        bridge.shutdown(config.telemetry.shutdown_grace()).await;
    }
    source.close();
    // Leave the status line intact
    println!();
    info!("PiRacer dashboard stopped");
    Ok(())
}

/// Forward operator commands typed on stdin
async fn read_controls(tx: mpsc::Sender<Control>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let command = line.trim().to_ascii_lowercase();
        if command.is_empty() {
            continue;
        }
        let control = match command.as_str() {
            "r" | "reset" => Control::Reset,
            other => {
                warn!(command = other, "Unknown command");
                continue;
            }
        };
        if tx.send(control).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "piracer-dash",
            "--source",
            "serial",
            "--serial-port",
            "/dev/ttyACM0",
            "--bridge-direction",
            "accept",
            "--no-telemetry",
        ]);
        let mut config = DashboardConfig::default();
        args.apply(&mut config);
        assert_eq!(config.acquisition.source, SourceKind::Serial);
        assert_eq!(config.acquisition.serial_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.drive_mode.bridge_direction, BridgeDirectionPolicy::Accept);
        assert!(!config.telemetry.enabled);
        assert_eq!(config.acquisition.can_interface, "can0");
    }

    #[test]
    fn test_write_calibration_subcommand() {
        let args = Args::parse_from(["piracer-dash", "write-calibration", "/tmp/calibration.json"]);
        assert!(matches!(
            args.command,
            Some(Command::WriteCalibration { ref path }) if path == &PathBuf::from("/tmp/calibration.json")
        ));
    }
}
