//! Dashboard configuration
//!
//! All tunables of the pipeline live in one [`DashboardConfig`] value built by
//! the composition root and handed to each component's constructor. There is
//! no process-wide state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::drive_mode::BridgeDirectionPolicy;

/// Calibration file name searched for under `config/`
pub const CALIBRATION_FILE_NAME: &str = "calibration.json";

/// Default bridge script searched for under `python/`
pub const BRIDGE_SCRIPT_NAME: &str = "piracer_bridge.py";

/// Errors raised while loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON
    #[error("Invalid config file {path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying JSON failure
        #[source]
        source: serde_json::Error,
    },
}

/// Which acquisition source feeds the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// SocketCAN frames carrying km/h
    #[default]
    Can,
    /// Arduino pulse counter over a serial line
    Serial,
    /// Built-in vehicle simulator
    Demo,
}

/// Acquisition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Source started at launch
    pub source: SourceKind,
    /// SocketCAN interface name
    pub can_interface: String,
    /// Arbitration ID of the speed frame
    pub can_speed_id: u32,
    /// Delay between CAN reconnect attempts
    pub can_retry_ms: u64,
    /// Arduino line speed
    pub serial_baud: u32,
    /// Device basename prefixes considered Arduino-like
    pub serial_port_prefixes: Vec<String>,
    /// Skip discovery and always open this port
    pub serial_port: Option<String>,
    /// Delay between serial reconnect attempts
    pub serial_retry_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Can,
            can_interface: "can0".to_string(),
            can_speed_id: 0x123,
            can_retry_ms: 2000,
            serial_baud: 9600,
            serial_port_prefixes: vec![
                "ttyUSB".to_string(),
                "ttyACM".to_string(),
                "cu.usbserial".to_string(),
                "cu.usbmodem".to_string(),
            ],
            serial_port: None,
            serial_retry_ms: 5000,
        }
    }
}

impl AcquisitionConfig {
    /// CAN reconnect interval
    pub fn can_retry(&self) -> Duration {
        Duration::from_millis(self.can_retry_ms)
    }

    /// Serial reconnect interval
    pub fn serial_retry(&self) -> Duration {
        Duration::from_millis(self.serial_retry_ms)
    }
}

/// Drive mode resolution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveModeConfig {
    /// JSON file written by the drive controller
    pub snapshot_path: PathBuf,
    /// Snapshots older than this are ignored
    pub freshness_ms: u64,
    /// At or below this speed the mode is forced to Parking
    pub parking_speed_kmh: f64,
    /// How a direction reported by the bridge is used
    pub bridge_direction: BridgeDirectionPolicy,
}

impl Default for DriveModeConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("/tmp/piracer_drive_mode.json"),
            freshness_ms: 2000,
            parking_speed_kmh: 0.15,
            bridge_direction: BridgeDirectionPolicy::Ignore,
        }
    }
}

impl DriveModeConfig {
    /// Maximum snapshot age
    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }
}

/// Telemetry bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Launch the bridge at startup
    pub enabled: bool,
    /// Program that runs the script, e.g. `python3`
    pub interpreter: String,
    /// Script file name searched for under `python/`
    pub script_name: String,
    /// Arguments passed after the script path
    pub extra_args: Vec<String>,
    /// How long to wait for the first line
    pub startup_timeout_ms: u64,
    /// How long SIGTERM is given before a kill
    pub shutdown_grace_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interpreter: "python3".to_string(),
            script_name: BRIDGE_SCRIPT_NAME.to_string(),
            extra_args: Vec::new(),
            startup_timeout_ms: 3000,
            shutdown_grace_ms: 3000,
        }
    }
}

impl TelemetryConfig {
    /// Startup wait as a duration
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Shutdown grace as a duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Session clock settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Elapsed-time refresh period
    pub tick_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { tick_ms: 1000 }
    }
}

/// Presentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Animation frame period
    pub frame_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { frame_ms: 50 }
    }
}

/// Complete dashboard configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Speed source
    pub acquisition: AcquisitionConfig,
    /// Gear resolution
    pub drive_mode: DriveModeConfig,
    /// Battery bridge
    pub telemetry: TelemetryConfig,
    /// Session clock
    pub session: SessionConfig,
    /// Presentation
    pub display: DisplayConfig,
}

impl DashboardConfig {
    /// Load configuration from a JSON file
    ///
    /// Missing sections and fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Base directories used to resolve relative resource paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPaths {
    /// Directory holding the running executable
    pub install_dir: Option<PathBuf>,
    /// Process working directory
    pub working_dir: PathBuf,
}

impl SearchPaths {
    /// Explicit base directories
    pub fn new(install_dir: Option<PathBuf>, working_dir: PathBuf) -> Self {
        Self {
            install_dir,
            working_dir,
        }
    }

    /// Resolve from the current executable and working directory
    pub fn from_env() -> Self {
        let install_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(install_dir, working_dir)
    }

    /// Ordered candidates for the calibration file
    pub fn calibration_candidates(&self) -> Vec<PathBuf> {
        let relative = Path::new("config").join(CALIBRATION_FILE_NAME);
        let mut candidates = vec![self.working_dir.join(&relative)];
        if let Some(install) = &self.install_dir {
            candidates.push(install.join(&relative));
            candidates.push(install.join("..").join(&relative));
            candidates.push(install.join("..").join("..").join(&relative));
        }
        candidates
    }

    /// Ordered candidates for the telemetry bridge script
    pub fn bridge_script_candidates(&self, script_name: &str) -> Vec<PathBuf> {
        let relative = Path::new("python").join(script_name);
        let mut candidates = Vec::new();
        if let Some(install) = &self.install_dir {
            candidates.push(install.join(&relative));
            candidates.push(install.join("..").join(&relative));
            candidates.push(install.join("..").join("..").join(&relative));
        }
        candidates.push(self.working_dir.join(&relative));
        candidates
    }
}

/// First candidate that exists on disk
pub fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.exists()).cloned()
}
