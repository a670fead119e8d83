//! Gauge and indicator models
//!
//! These own only interpolation state. Time is passed in explicitly so the
//! models can be driven by a frame timer and tested with a paused clock.

use std::time::Duration;
use tokio::time::Instant;

use crate::drive_mode::DriveMode;

/// Easing curves used by the needles and the gear indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    /// Fast start, slow finish
    OutCubic,
    /// Slow at both ends
    InOutCubic,
}

impl Easing {
    /// Map progress `t` in [0,1] to eased progress
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::OutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// Progress of a transition started at `start`
fn progress(start: Instant, duration: Duration, now: Instant) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    let elapsed = now.saturating_duration_since(start);
    (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
}

/// A value animated between two angles
#[derive(Debug, Clone)]
pub struct NeedleAnimation {
    from: f64,
    to: f64,
    start: Instant,
    duration: Duration,
    easing: Easing,
}

impl NeedleAnimation {
    /// At rest on `angle`
    pub fn resting(angle: f64, now: Instant) -> Self {
        Self {
            from: angle,
            to: angle,
            start: now,
            duration: Duration::ZERO,
            easing: Easing::OutCubic,
        }
    }

    /// Start moving from wherever the needle is now towards `to`
    pub fn retarget(&mut self, to: f64, now: Instant, duration: Duration, easing: Easing) {
        self.from = self.value(now);
        self.to = to;
        self.start = now;
        self.duration = duration;
        self.easing = easing;
    }

    /// Needle position at `now`
    pub fn value(&self, now: Instant) -> f64 {
        let eased = self.easing.apply(progress(self.start, self.duration, now));
        self.from + (self.to - self.from) * eased
    }
}

/// Speedometer needle: 0–30 km/h over 270°
#[derive(Debug, Clone)]
pub struct Speedometer {
    speed_kmh: f64,
    needle: NeedleAnimation,
    last_target: Option<f64>,
    startup_done: bool,
}

impl Speedometer {
    /// Full-scale speed
    pub const MAX_SPEED_KMH: f64 = 30.0;
    /// Speeds at or above this are marked
    pub const RED_ZONE_KMH: f64 = 25.0;
    /// Needle travel from 0 to full scale
    pub const SPAN_DEG: f64 = 270.0;
    /// Parked below zero so the first update sweeps up like an ignition test
    pub const REST_ANGLE_DEG: f64 = -45.0;

    const STARTUP_SWEEP: Duration = Duration::from_millis(1150);
    const FOLLOW: Duration = Duration::from_millis(220);
    const MIN_RETARGET_DEG: f64 = 0.05;

    /// Needle at rest
    pub fn new(now: Instant) -> Self {
        Self {
            speed_kmh: 0.0,
            needle: NeedleAnimation::resting(Self::REST_ANGLE_DEG, now),
            last_target: None,
            startup_done: false,
        }
    }

    /// Returns `true` if the needle was sent to a new target
    pub fn set_speed(&mut self, speed_kmh: f64, now: Instant) -> bool {
        self.speed_kmh = speed_kmh.clamp(0.0, Self::MAX_SPEED_KMH);
        let target = self.speed_kmh / Self::MAX_SPEED_KMH * Self::SPAN_DEG;

        if let Some(last) = self.last_target {
            if (target - last).abs() < Self::MIN_RETARGET_DEG {
                return false;
            }
        }
        self.last_target = Some(target);

        if self.startup_done {
            self.needle.retarget(target, now, Self::FOLLOW, Easing::OutCubic);
        } else {
            self.needle
                .retarget(target, now, Self::STARTUP_SWEEP, Easing::InOutCubic);
            self.startup_done = true;
        }
        true
    }

    /// Clamped speed in km/h
    pub fn speed(&self) -> f64 {
        self.speed_kmh
    }

    /// Needle angle in degrees at `now`
    pub fn needle_angle(&self, now: Instant) -> f64 {
        self.needle.value(now)
    }

    /// True at or above [`Self::RED_ZONE_KMH`]
    pub fn in_red_zone(&self) -> bool {
        self.speed_kmh >= Self::RED_ZONE_KMH
    }
}

/// RPM needle sweeping 200° down to −20° with 15 % headroom
#[derive(Debug, Clone)]
pub struct RpmGauge {
    rpm: f64,
    needle: NeedleAnimation,
}

impl RpmGauge {
    /// Full-scale RPM
    pub const MAX_RPM: f64 = 500.0;
    /// Angle at 0 RPM
    pub const START_DEG: f64 = 200.0;
    /// Angle at the end of the headroom
    pub const END_DEG: f64 = -20.0;
    const HEADROOM: f64 = 1.15;
    const FOLLOW: Duration = Duration::from_millis(180);

    /// Needle at 0 RPM
    pub fn new(now: Instant) -> Self {
        Self {
            rpm: 0.0,
            needle: NeedleAnimation::resting(Self::START_DEG, now),
        }
    }

    /// Move the needle towards `rpm`
    pub fn set_rpm(&mut self, rpm: f64, now: Instant) {
        self.rpm = rpm.clamp(0.0, Self::MAX_RPM);
        let normalized = (self.rpm / (Self::MAX_RPM * Self::HEADROOM)).clamp(0.0, 1.0);
        let target = Self::START_DEG + (Self::END_DEG - Self::START_DEG) * normalized;
        self.needle.retarget(target, now, Self::FOLLOW, Easing::OutCubic);
    }

    /// Clamped RPM
    pub fn rpm(&self) -> f64 {
        self.rpm
    }

    /// Needle angle in degrees, kept within the dial
    pub fn needle_angle(&self, now: Instant) -> f64 {
        self.needle
            .value(now)
            .clamp(Self::END_DEG, Self::START_DEG)
    }

    /// Needle turns red in the top fifth
    pub fn is_high(&self) -> bool {
        self.rpm > Self::MAX_RPM * 0.8
    }
}

/// Battery level with low-charge blink
#[derive(Debug, Clone)]
pub struct BatteryIndicator {
    percent: f64,
    voltage: f64,
    visible: bool,
    next_blink: Option<Instant>,
}

impl Default for BatteryIndicator {
    fn default() -> Self {
        Self {
            percent: 0.0,
            voltage: 0.0,
            visible: true,
            next_blink: None,
        }
    }
}

impl BatteryIndicator {
    /// Below this the readout blinks
    pub const LOW_PERCENT: f64 = 20.0;
    const BLINK_PERIOD: Duration = Duration::from_secs(1);

    /// Store a reading; percent is clamped to 0..=100
    pub fn set(&mut self, percent: f64, voltage: f64, now: Instant) {
        self.percent = percent.clamp(0.0, 100.0);
        self.voltage = voltage;
        if self.is_low() {
            if self.next_blink.is_none() {
                self.next_blink = Some(now + Self::BLINK_PERIOD);
            }
        } else {
            self.next_blink = None;
            self.visible = true;
        }
    }

    /// Advance the blink; returns `true` when visibility flipped
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_blink else {
            return false;
        };
        if now < due {
            return false;
        }
        self.visible = !self.visible;
        self.next_blink = Some(due + Self::BLINK_PERIOD);
        true
    }

    /// Charge in percent
    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Pack voltage
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    /// True below [`Self::LOW_PERCENT`]
    pub fn is_low(&self) -> bool {
        self.percent < Self::LOW_PERCENT
    }

    /// False during the off half of a blink
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Fill color for the current charge band
    pub fn color(&self) -> &'static str {
        if self.percent >= 80.0 {
            "#00FF88"
        } else if self.percent >= 50.0 {
            "#FFD700"
        } else if self.percent >= Self::LOW_PERCENT {
            "#FF8800"
        } else {
            "#FF3B3B"
        }
    }
}

/// Gear indicator: large center mode flanked by the two other modes
#[derive(Debug, Clone, Default)]
pub struct DriveModeIndicator {
    current: Option<DriveMode>,
    slide_start: Option<(Instant, f64)>,
}

impl DriveModeIndicator {
    /// Distance the center label slides in from
    pub const SLIDE_PX: f64 = 16.0;
    const TRANSITION: Duration = Duration::from_millis(180);

    /// Returns `true` when the displayed mode changed
    pub fn set(&mut self, mode: DriveMode, now: Instant) -> bool {
        match self.current {
            None => {
                self.current = Some(mode);
                true
            }
            Some(current) if current == mode => false,
            Some(_) => {
                self.current = Some(mode);
                let side = match mode {
                    DriveMode::Forward => -1.0,
                    DriveMode::Reverse => 1.0,
                    DriveMode::Parking => 0.0,
                };
                self.slide_start = Some((now, side * Self::SLIDE_PX));
                true
            }
        }
    }

    /// Displayed mode; Parking until the first update
    pub fn mode(&self) -> DriveMode {
        self.current.unwrap_or(DriveMode::Parking)
    }

    /// (left, right) hint letters
    pub fn hints(&self) -> (char, char) {
        match self.mode() {
            DriveMode::Forward => ('P', 'R'),
            DriveMode::Reverse => ('F', 'P'),
            DriveMode::Parking => ('F', 'R'),
        }
    }

    /// Accent color of the current mode
    pub fn accent_color(&self) -> &'static str {
        match self.mode() {
            DriveMode::Forward => "#00FF88",
            DriveMode::Reverse => "#FF5B6E",
            DriveMode::Parking => "#FFD34D",
        }
    }

    fn eased(&self, now: Instant) -> Option<(f64, f64)> {
        let (start, offset) = self.slide_start?;
        let t = Easing::OutCubic.apply(progress(start, Self::TRANSITION, now));
        Some((offset, t))
    }

    /// Horizontal offset of the center label in pixels
    pub fn offset_px(&self, now: Instant) -> f64 {
        self.eased(now)
            .map(|(offset, t)| offset * (1.0 - t))
            .unwrap_or(0.0)
    }

    /// Fade-in of the center label, 0 to 1
    pub fn opacity(&self, now: Instant) -> f64 {
        self.eased(now).map(|(_, t)| t).unwrap_or(1.0)
    }
}

/// Max-speed readout with a short highlight on a new record
#[derive(Debug, Clone, Default)]
pub struct MaxSpeedLabel {
    value: f64,
    highlight_until: Option<Instant>,
}

impl MaxSpeedLabel {
    const PULSE: Duration = Duration::from_millis(180);

    /// Store the maximum; a new record starts the highlight
    pub fn set(&mut self, value: f64, new_record: bool, now: Instant) {
        self.value = value;
        self.highlight_until = if new_record {
            Some(now + Self::PULSE)
        } else {
            None
        };
    }

    /// True while the new-record highlight lasts
    pub fn is_highlighted(&self, now: Instant) -> bool {
        self.highlight_until.is_some_and(|until| now < until)
    }

    /// One decimal, as shown on the dashboard
    pub fn text(&self) -> String {
        format!("{:.1}", self.value)
    }
}
