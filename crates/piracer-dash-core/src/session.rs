//! Session state owned by the dashboard controller

use std::time::Duration;

use crate::drive_mode::DriveMode;

/// Everything the dashboard currently shows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    /// Latest speed
    pub current_speed_kmh: f64,
    /// Latest wheel RPM
    pub current_rpm: f64,
    /// Highest speed since start or the last reset
    pub max_speed_kmh: f64,
    /// Time since start or the last reset
    pub elapsed_millis: u64,
    /// Resolved gear
    pub drive_mode: DriveMode,
    /// Last reported charge
    pub battery_percent: f64,
    /// Last reported pack voltage
    pub battery_voltage: f64,
}

impl SessionState {
    /// Store the current speed and ratchet the maximum
    ///
    /// Returns `true` when a new maximum was recorded.
    pub fn record_speed(&mut self, speed_kmh: f64, rpm: f64) -> bool {
        self.current_speed_kmh = speed_kmh;
        self.current_rpm = rpm;
        if speed_kmh > self.max_speed_kmh {
            self.max_speed_kmh = speed_kmh;
            true
        } else {
            false
        }
    }

    /// Zero the maximum and the clock; gear and battery stay
    pub fn reset(&mut self) {
        self.max_speed_kmh = 0.0;
        self.elapsed_millis = 0;
    }

    /// Session clock as a duration
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_millis)
    }
}

/// `HH:MM:SS`; hours keep counting past 99
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
