//! Calibration Store
//!
//! Loads the speed, RPM, and battery calibration from `calibration.json`.
//!
//! File format:
//! ```json
//! {
//!   "speed":   { "pulses_per_second_to_kmh": 0.72 },
//!   "rpm":     { "pulses_per_revolution": 20 },
//!   "battery": { "v_min": 6.4, "v_max": 8.4, "cells": 2, "type": "LiPo 2S" },
//!   "version": "1.0"
//! }
//! ```
//!
//! Every field is optional and falls back to its default on its own. An
//! unreadable file or malformed JSON fails the whole load; the caller then
//! runs on [`CalibrationParameters::default`].

use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::first_existing;

/// km/h per pulse/s when no calibration is loaded
pub const DEFAULT_SPEED_SCALE_FACTOR: f64 = 0.72;
/// Encoder pulses per wheel revolution
pub const DEFAULT_PULSES_PER_REVOLUTION: u32 = 20;
/// Empty 2S LiPo pack voltage
pub const DEFAULT_BATTERY_V_MIN: f64 = 6.4;
/// Full 2S LiPo pack voltage
pub const DEFAULT_BATTERY_V_MAX: f64 = 8.4;

const FILE_VERSION: &str = "1.0";

/// Errors raised by the calibration store
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// None of the candidate paths exist
    #[error("No calibration file found (searched {} locations)", .0.len())]
    NotFound(Vec<PathBuf>),

    /// The file exists but could not be read or written
    #[error("Failed to read calibration file {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The file is not a JSON object
    #[error("Invalid JSON in calibration file {path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying JSON failure
        #[source]
        source: serde_json::Error,
    },
}

/// Runtime calibration, immutable for the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationParameters {
    /// km/h per pulse/s
    pub speed_scale_factor: f64,
    /// Sensor pulses per wheel revolution
    pub pulses_per_revolution: u32,
    /// Pack voltage reported as 0 %
    pub battery_v_min: f64,
    /// Pack voltage reported as 100 %
    pub battery_v_max: f64,
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        Self {
            speed_scale_factor: DEFAULT_SPEED_SCALE_FACTOR,
            pulses_per_revolution: DEFAULT_PULSES_PER_REVOLUTION,
            battery_v_min: DEFAULT_BATTERY_V_MIN,
            battery_v_max: DEFAULT_BATTERY_V_MAX,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeedSection {
    pulses_per_second_to_kmh: f64,
    comment: &'static str,
}

#[derive(Debug, Serialize)]
struct RpmSection {
    pulses_per_revolution: u32,
    comment: &'static str,
}

#[derive(Debug, Serialize)]
struct BatterySection {
    v_min: f64,
    v_max: f64,
    cells: u32,
    #[serde(rename = "type")]
    chemistry: &'static str,
}

/// On-disk document, as written by [`CalibrationParameters::save`]
#[derive(Debug, Serialize)]
struct CalibrationFile {
    speed: SpeedSection,
    rpm: RpmSection,
    battery: BatterySection,
    version: &'static str,
}

type Section = Map<String, Value>;

/// `root[section]` if it is an object
fn section<'a>(root: &'a Section, name: &str) -> Option<&'a Section> {
    root.get(name).and_then(Value::as_object)
}

/// Numeric field, or `default` when missing or not a number
fn number(section: Option<&Section>, key: &str, default: f64) -> f64 {
    match section.and_then(|s| s.get(key)) {
        Some(value) => value.as_f64().unwrap_or_else(|| {
            debug!(key, %value, "Calibration field is not a number; using default");
            default
        }),
        None => default,
    }
}

/// Non-negative integer field; integral floats such as `20.0` are accepted
fn count(section: Option<&Section>, key: &str, default: u32) -> u32 {
    let Some(value) = section.and_then(|s| s.get(key)) else {
        return default;
    };
    let parsed = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    });
    match parsed.and_then(|n| u32::try_from(n).ok()) {
        Some(n) => n,
        None => {
            debug!(key, %value, "Calibration field is not a count; using default");
            default
        }
    }
}

impl CalibrationParameters {
    /// Parse calibration from a JSON string
    ///
    /// The root must be an object. Each field is read on its own: a missing,
    /// `null`, or wrongly typed section or value takes its default while the
    /// rest of the document still applies.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let root: Value = serde_json::from_str(content)?;
        let Value::Object(root) = root else {
            return Err(serde::de::Error::custom(
                "calibration root must be a JSON object",
            ));
        };

        let speed = section(&root, "speed");
        let rpm = section(&root, "rpm");
        let battery = section(&root, "battery");

        let params = Self {
            speed_scale_factor: number(
                speed,
                "pulses_per_second_to_kmh",
                DEFAULT_SPEED_SCALE_FACTOR,
            ),
            pulses_per_revolution: count(
                rpm,
                "pulses_per_revolution",
                DEFAULT_PULSES_PER_REVOLUTION,
            ),
            battery_v_min: number(battery, "v_min", DEFAULT_BATTERY_V_MIN),
            battery_v_max: number(battery, "v_max", DEFAULT_BATTERY_V_MAX),
        };
        Ok(params.sanitized())
    }

    /// Load calibration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let params = Self::from_json(&content).map_err(|source| CalibrationError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), ?params, "Calibration loaded");
        Ok(params)
    }

    /// Load from the first existing candidate path
    pub fn load_first(candidates: &[PathBuf]) -> Result<(Self, PathBuf), CalibrationError> {
        let path = first_existing(candidates)
            .ok_or_else(|| CalibrationError::NotFound(candidates.to_vec()))?;
        let params = Self::load(&path)?;
        Ok((params, path))
    }

    /// Load from the first existing candidate, or fall back to defaults
    pub fn load_or_default(candidates: &[PathBuf]) -> Self {
        match Self::load_first(candidates) {
            Ok((params, path)) => {
                info!(
                    file = %path.display(),
                    speed_factor = params.speed_scale_factor,
                    pulses_per_rev = params.pulses_per_revolution,
                    "Loaded calibration"
                );
                params
            }
            Err(e) => {
                warn!("{e}; using default calibration values");
                Self::default()
            }
        }
    }

    /// Serialize the full parameter set back to the calibration schema
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let file = CalibrationFile {
            speed: SpeedSection {
                pulses_per_second_to_kmh: self.speed_scale_factor,
                comment: "Measured value",
            },
            rpm: RpmSection {
                pulses_per_revolution: self.pulses_per_revolution,
                comment: "Pulses per 1 wheel rotation",
            },
            battery: BatterySection {
                v_min: self.battery_v_min,
                v_max: self.battery_v_max,
                cells: 2,
                chemistry: "LiPo 2S",
            },
            version: FILE_VERSION,
        };
        serde_json::to_string_pretty(&file)
    }

    /// Save calibration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        let path = path.as_ref();
        let content = self.to_json().map_err(|source| CalibrationError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Calibration saved");
        Ok(())
    }

    /// Replace a non-finite or non-positive scale factor with the default
    fn sanitized(mut self) -> Self {
        if !self.speed_scale_factor.is_finite() || self.speed_scale_factor <= 0.0 {
            warn!(
                value = self.speed_scale_factor,
                "Speed scale factor must be positive; using default"
            );
            self.speed_scale_factor = DEFAULT_SPEED_SCALE_FACTOR;
        }
        self
    }
}
