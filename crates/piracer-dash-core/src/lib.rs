//! # PiRacer Dashboard Core Library
//!
//! Core data pipeline for the PiRacer instrument cluster.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Motion acquisition from a CAN bus, an Arduino pulse counter, or a simulator
//! - Calibration file loading and saving
//! - Pulse to km/h and RPM conversion
//! - Drive mode resolution from a freshness-gated snapshot file
//! - Battery telemetry from an external bridge process
//! - Session state (max speed, elapsed time) and presentation models
//!
//! ## Example
//!
//! ```rust,ignore
//! use piracer_dash_core::prelude::*;
//!
//! let config = DashboardConfig::default();
//! let search = SearchPaths::from_env();
//! let calibration = CalibrationParameters::load_or_default(&search.calibration_candidates());
//!
//! let mut controller = DashboardController::new(&config, calibration, RecordingDisplay::default());
//! controller.on_motion_sample(MotionSample::kmh(12.0));
//! ```

pub mod acquisition;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod display;
pub mod drive_mode;
pub mod event_loop;
pub mod line_codec;
pub mod session;
pub mod telemetry;
pub mod unit_conversion;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::acquisition::{
        AcquisitionError, CanSource, DemoSource, MotionSample, MotionSource, MotionUnit,
        ScriptedSource, SerialSource,
    };
    pub use crate::calibration::{CalibrationError, CalibrationParameters};
    pub use crate::config::{DashboardConfig, SearchPaths, SourceKind};
    pub use crate::controller::DashboardController;
    pub use crate::display::{DisplaySink, DisplayUpdate, RecordingDisplay, TerminalDisplay};
    pub use crate::drive_mode::{BridgeDirectionPolicy, DriveMode, DriveModeResolver};
    pub use crate::event_loop::{run_event_loop, run_event_loop_with_controls, Control, LoopTiming};
    pub use crate::session::SessionState;
    pub use crate::telemetry::{
        BatteryReading, ChannelTelemetry, TelemetryBridge, TelemetryEvent, TelemetryReader,
        TelemetrySource,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
