//! Drive-Mode Resolver
//!
//! The gear state comes from two inputs:
//! - a snapshot file `{"direction": "F"}` written by the driving process,
//!   honored only while its mtime is within the freshness window;
//! - optionally, the `direction` field of telemetry bridge lines.
//!
//! Whichever accepted input is newer wins. At or below the parking speed the
//! resolved mode is Parking regardless of either input. The accepted inputs
//! are kept, so the reported gear comes back once the car moves again.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, trace};

use crate::config::DriveModeConfig;

/// Current gear state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum DriveMode {
    /// Driving forward
    Forward,
    /// Reversing
    Reverse,
    /// Stopped
    #[default]
    Parking,
}

impl DriveMode {
    /// Case-insensitive prefix match: `R…` Reverse, `F…` Forward, anything
    /// else Parking. Blank input is not a direction.
    pub fn parse(direction: &str) -> Option<Self> {
        let direction = direction.trim();
        let first = direction.chars().next()?;
        Some(match first.to_ascii_uppercase() {
            'R' => DriveMode::Reverse,
            'F' => DriveMode::Forward,
            _ => DriveMode::Parking,
        })
    }

    /// Single-letter label shown on the dashboard
    pub fn letter(&self) -> char {
        match self {
            DriveMode::Forward => 'F',
            DriveMode::Reverse => 'R',
            DriveMode::Parking => 'P',
        }
    }

    /// Value written to the `direction` field of a snapshot
    pub fn snapshot_code(&self) -> &'static str {
        match self {
            DriveMode::Forward => "F",
            DriveMode::Reverse => "R",
            DriveMode::Parking => "N",
        }
    }
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriveMode::Forward => "Forward",
            DriveMode::Reverse => "Reverse",
            DriveMode::Parking => "Parking",
        };
        f.write_str(name)
    }
}

/// What to do with the `direction` field of telemetry lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeDirectionPolicy {
    /// Only the snapshot file drives the gear (avoids parking flicker)
    #[default]
    Ignore,
    /// Bridge-reported direction competes with the snapshot on recency
    Accept,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    direction: String,
}

/// Write a drive-mode snapshot
pub fn write_snapshot<P: AsRef<Path>>(path: P, mode: DriveMode) -> io::Result<()> {
    let body = serde_json::to_string(&Snapshot {
        direction: mode.snapshot_code().to_string(),
    })?;
    fs::write(path, body)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Accepted {
    mode: DriveMode,
    at: SystemTime,
}

/// Resolves the displayed gear from snapshot, bridge, and speed
#[derive(Debug, Clone)]
pub struct DriveModeResolver {
    snapshot_path: PathBuf,
    freshness: Duration,
    parking_speed_kmh: f64,
    policy: BridgeDirectionPolicy,
    from_snapshot: Option<Accepted>,
    from_bridge: Option<Accepted>,
    resolved: DriveMode,
}

impl DriveModeResolver {
    /// Resolver starting in Parking
    pub fn new(config: &DriveModeConfig) -> Self {
        Self {
            snapshot_path: config.snapshot_path.clone(),
            freshness: config.freshness(),
            parking_speed_kmh: config.parking_speed_kmh,
            policy: config.bridge_direction,
            from_snapshot: None,
            from_bridge: None,
            resolved: DriveMode::Parking,
        }
    }

    /// Snapshot file being polled
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Bridge direction policy in force
    pub fn policy(&self) -> BridgeDirectionPolicy {
        self.policy
    }

    /// Mode from the last resolve
    pub fn current(&self) -> DriveMode {
        self.resolved
    }

    /// Poll the snapshot file
    ///
    /// Returns `true` when a fresh, well-formed snapshot was accepted. A stale,
    /// missing, or malformed file leaves the state untouched.
    pub fn read_snapshot(&mut self, now: SystemTime) -> bool {
        let modified = match fs::metadata(&self.snapshot_path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                trace!(path = %self.snapshot_path.display(), "No drive-mode snapshot: {e}");
                return false;
            }
        };

        // A future mtime (clock skew) counts as age zero
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age > self.freshness {
            trace!(age_ms = age.as_millis() as u64, "Drive-mode snapshot is stale");
            return false;
        }

        let content = match fs::read_to_string(&self.snapshot_path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %self.snapshot_path.display(), "Failed to read drive-mode snapshot: {e}");
                return false;
            }
        };

        let Some(mode) = serde_json::from_str::<Snapshot>(&content)
            .ok()
            .and_then(|s| DriveMode::parse(&s.direction))
        else {
            debug!(path = %self.snapshot_path.display(), "Malformed drive-mode snapshot");
            return false;
        };

        self.from_snapshot = Some(Accepted { mode, at: modified });
        true
    }

    /// Feed the `direction` field of a telemetry line
    ///
    /// Ignored unless the policy is [`BridgeDirectionPolicy::Accept`].
    pub fn report_bridge_direction(&mut self, direction: &str, now: SystemTime) -> bool {
        if self.policy == BridgeDirectionPolicy::Ignore {
            return false;
        }
        match DriveMode::parse(direction) {
            Some(mode) => {
                self.from_bridge = Some(Accepted { mode, at: now });
                true
            }
            None => false,
        }
    }

    /// Newest accepted input, before the speed override
    pub fn reported(&self) -> DriveMode {
        match (self.from_snapshot, self.from_bridge) {
            (Some(s), Some(b)) => {
                if b.at > s.at {
                    b.mode
                } else {
                    s.mode
                }
            }
            (Some(s), None) => s.mode,
            (None, Some(b)) => b.mode,
            (None, None) => DriveMode::Parking,
        }
    }

    /// Apply the parking override to the reported mode without touching disk
    pub fn apply_speed(&mut self, speed_kmh: f64) -> DriveMode {
        self.resolved = if speed_kmh <= self.parking_speed_kmh {
            DriveMode::Parking
        } else {
            self.reported()
        };
        self.resolved
    }

    /// Poll the snapshot, then resolve against `speed_kmh`
    pub fn resolve(&mut self, speed_kmh: f64, now: SystemTime) -> DriveMode {
        self.read_snapshot(now);
        self.apply_speed(speed_kmh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixes() {
        assert_eq!(DriveMode::parse("R"), Some(DriveMode::Reverse));
        assert_eq!(DriveMode::parse(" reverse "), Some(DriveMode::Reverse));
        assert_eq!(DriveMode::parse("forward"), Some(DriveMode::Forward));
        assert_eq!(DriveMode::parse("N"), Some(DriveMode::Parking));
        assert_eq!(DriveMode::parse("park"), Some(DriveMode::Parking));
        assert_eq!(DriveMode::parse("x"), Some(DriveMode::Parking));
        assert_eq!(DriveMode::parse("   "), None);
    }

    #[test]
    fn test_bridge_ignored_by_default() {
        let mut resolver = DriveModeResolver::new(&DriveModeConfig {
            snapshot_path: PathBuf::from("/nonexistent/drive_mode.json"),
            ..DriveModeConfig::default()
        });
        assert!(!resolver.report_bridge_direction("R", SystemTime::now()));
        assert_eq!(resolver.apply_speed(10.0), DriveMode::Parking);
    }

    #[test]
    fn test_bridge_accepted_when_enabled() {
        let mut resolver = DriveModeResolver::new(&DriveModeConfig {
            snapshot_path: PathBuf::from("/nonexistent/drive_mode.json"),
            bridge_direction: BridgeDirectionPolicy::Accept,
            ..DriveModeConfig::default()
        });
        assert!(resolver.report_bridge_direction("R", SystemTime::now()));
        assert_eq!(resolver.apply_speed(10.0), DriveMode::Reverse);
        assert_eq!(resolver.apply_speed(0.0), DriveMode::Parking);
        assert_eq!(resolver.reported(), DriveMode::Reverse);
    }

    #[test]
    fn test_snapshot_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mode.json");
        write_snapshot(&path, DriveMode::Parking).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"direction":"N"}"#);
    }
}
