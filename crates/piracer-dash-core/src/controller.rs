//! Dashboard Controller
//!
//! Owns the [`SessionState`] and turns motion samples, telemetry events, and
//! clock ticks into [`DisplayUpdate`]s. Only fields that actually changed are
//! pushed, except battery readings, which are pushed on every accepted line.

use std::time::SystemTime;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::acquisition::{MotionSample, MotionUnit};
use crate::calibration::CalibrationParameters;
use crate::config::DashboardConfig;
use crate::display::{DisplaySink, DisplayUpdate};
use crate::drive_mode::{DriveMode, DriveModeResolver};
use crate::session::SessionState;
use crate::telemetry::TelemetryEvent;
use crate::unit_conversion::{battery_percent, kmh_to_rpm, pulses_to_kmh, pulses_to_rpm};

/// Negative or non-finite readings are treated as standstill
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Central state holder of the dashboard
pub struct DashboardController<D: DisplaySink> {
    calibration: CalibrationParameters,
    resolver: DriveModeResolver,
    state: SessionState,
    display: D,
    session_start: Instant,
    link: Option<bool>,
}

impl<D: DisplaySink> DashboardController<D> {
    /// Controller with a fresh session starting now
    pub fn new(config: &DashboardConfig, calibration: CalibrationParameters, display: D) -> Self {
        Self {
            calibration,
            resolver: DriveModeResolver::new(&config.drive_mode),
            state: SessionState::default(),
            display,
            session_start: Instant::now(),
            link: None,
        }
    }

    /// Current session values
    pub fn session(&self) -> &SessionState {
        &self.state
    }

    /// Calibration in use
    pub fn calibration(&self) -> &CalibrationParameters {
        &self.calibration
    }

    /// Drive mode resolver
    pub fn resolver(&self) -> &DriveModeResolver {
        &self.resolver
    }

    /// Display sink
    pub fn display(&self) -> &D {
        &self.display
    }

    /// Display sink, mutably
    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Consume the controller, keeping the sink
    pub fn into_display(self) -> D {
        self.display
    }

    fn publish(&mut self, update: DisplayUpdate) {
        self.display.apply(update, Instant::now());
    }

    /// Push the whole state, e.g. right after startup
    pub fn publish_all(&mut self) {
        let state = self.state.clone();
        self.publish(DisplayUpdate::Speed(state.current_speed_kmh));
        self.publish(DisplayUpdate::Rpm(state.current_rpm));
        self.publish(DisplayUpdate::MaxSpeed {
            value: state.max_speed_kmh,
            new_record: false,
        });
        self.publish(DisplayUpdate::DriveMode(state.drive_mode));
        self.publish(DisplayUpdate::Elapsed(state.elapsed()));
        if let Some(up) = self.link {
            self.publish(DisplayUpdate::Link(up));
        }
    }

    /// Handle one raw motion sample
    pub fn on_motion_sample(&mut self, sample: MotionSample) {
        let raw = sanitize(sample.value);
        let cal = self.calibration;
        let (speed, rpm) = match sample.unit {
            MotionUnit::KilometresPerHour => (
                raw,
                kmh_to_rpm(raw, cal.speed_scale_factor, cal.pulses_per_revolution),
            ),
            MotionUnit::PulsesPerSecond => (
                pulses_to_kmh(raw, cal.speed_scale_factor),
                pulses_to_rpm(raw, cal.pulses_per_revolution),
            ),
        };

        let previous = self.state.clone();
        let new_record = self.state.record_speed(speed, rpm);

        if speed != previous.current_speed_kmh {
            self.publish(DisplayUpdate::Speed(speed));
        }
        if rpm != previous.current_rpm {
            self.publish(DisplayUpdate::Rpm(rpm));
        }
        if new_record {
            debug!(max_speed = speed, "New max speed");
            self.publish(DisplayUpdate::MaxSpeed {
                value: speed,
                new_record: true,
            });
        }

        let mode = self.resolver.resolve(speed, SystemTime::now());
        self.set_drive_mode(mode);
    }

    /// Handle one accepted telemetry line
    pub fn on_telemetry(&mut self, event: TelemetryEvent) {
        let now = SystemTime::now();
        if let Some(direction) = &event.direction {
            self.resolver.report_bridge_direction(direction, now);
        }

        let reading = event.battery;
        let voltage = reading.voltage.unwrap_or(self.state.battery_voltage);
        let percent = match (reading.percent, reading.voltage) {
            (Some(percent), _) => percent.clamp(0.0, 100.0),
            (None, Some(voltage)) => battery_percent(
                voltage,
                self.calibration.battery_v_min,
                self.calibration.battery_v_max,
            ),
            (None, None) => self.state.battery_percent,
        };
        self.state.battery_percent = percent;
        self.state.battery_voltage = voltage;
        self.publish(DisplayUpdate::Battery { percent, voltage });

        let mode = self.resolver.resolve(self.state.current_speed_kmh, now);
        self.set_drive_mode(mode);
    }

    fn set_drive_mode(&mut self, mode: DriveMode) {
        if mode != self.state.drive_mode {
            debug!(from = %self.state.drive_mode, to = %mode, "Drive mode changed");
            self.state.drive_mode = mode;
            self.publish(DisplayUpdate::DriveMode(mode));
        }
    }

    /// Recompute the session clock
    pub fn on_tick(&mut self) {
        let elapsed = Instant::now().saturating_duration_since(self.session_start);
        self.state.elapsed_millis = elapsed.as_millis() as u64;
        self.publish(DisplayUpdate::Elapsed(self.state.elapsed()));
    }

    /// Restart the clock and clear the max-speed record
    pub fn reset(&mut self) {
        self.session_start = Instant::now();
        self.state.reset();
        info!("Session reset (time + max speed)");
        self.publish(DisplayUpdate::MaxSpeed {
            value: 0.0,
            new_record: false,
        });
        self.publish(DisplayUpdate::Elapsed(self.state.elapsed()));
    }

    /// Acquisition device came up or went away
    pub fn on_link_status(&mut self, connected: bool) {
        if self.link == Some(connected) {
            return;
        }
        self.link = Some(connected);
        info!(connected, "Acquisition link status changed");
        self.publish(DisplayUpdate::Link(connected));
    }

    /// Advance display animations
    pub fn on_frame(&mut self) {
        self.display.frame(Instant::now());
    }
}
