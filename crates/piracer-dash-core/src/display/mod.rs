//! Presentation
//!
//! The controller pushes [`DisplayUpdate`]s into a [`DisplaySink`]; the sink
//! owns whatever animation state it needs and is advanced by
//! [`DisplaySink::frame`] on the event loop's frame timer.

mod terminal;
pub mod widgets;

pub use terminal::TerminalDisplay;

use std::time::Duration;
use tokio::time::Instant;

use crate::drive_mode::DriveMode;

/// A single changed field of the session
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    /// Current speed in km/h
    Speed(f64),
    /// Wheel RPM
    Rpm(f64),
    /// Session maximum
    MaxSpeed {
        /// Maximum in km/h
        value: f64,
        /// The maximum was just raised
        new_record: bool,
    },
    /// Resolved gear
    DriveMode(DriveMode),
    /// Battery reading
    Battery {
        /// Charge in percent
        percent: f64,
        /// Pack voltage
        voltage: f64,
    },
    /// Session clock
    Elapsed(Duration),
    /// Acquisition device connected / disconnected
    Link(bool),
}

/// Receiver of display updates
pub trait DisplaySink {
    /// Take one changed field
    fn apply(&mut self, update: DisplayUpdate, now: Instant);

    /// Advance animations; called on every frame tick
    fn frame(&mut self, _now: Instant) {}
}

/// Sink that remembers every update, for tests and headless runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingDisplay {
    /// Updates in arrival order
    pub updates: Vec<DisplayUpdate>,
    /// Frame ticks seen
    pub frames: usize,
}

impl RecordingDisplay {
    /// Drain recorded updates
    pub fn take(&mut self) -> Vec<DisplayUpdate> {
        std::mem::take(&mut self.updates)
    }

    /// Most recent battery update, if any
    pub fn last_battery(&self) -> Option<(f64, f64)> {
        self.updates.iter().rev().find_map(|u| match u {
            DisplayUpdate::Battery { percent, voltage } => Some((*percent, *voltage)),
            _ => None,
        })
    }

    /// Every battery percent published, in order
    pub fn battery_percents(&self) -> Vec<f64> {
        self.updates
            .iter()
            .filter_map(|u| match u {
                DisplayUpdate::Battery { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    /// Most recent drive mode update, if any
    pub fn last_drive_mode(&self) -> Option<DriveMode> {
        self.updates.iter().rev().find_map(|u| match u {
            DisplayUpdate::DriveMode(mode) => Some(*mode),
            _ => None,
        })
    }
}

impl DisplaySink for RecordingDisplay {
    fn apply(&mut self, update: DisplayUpdate, _now: Instant) {
        self.updates.push(update);
    }

    fn frame(&mut self, _now: Instant) {
        self.frames += 1;
    }
}
