//! Single-line terminal dashboard
//!
//! With color enabled the battery readout takes its charge-band color and
//! the gear letter takes the accent of the current mode, as ANSI truecolor.

use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::widgets::{BatteryIndicator, DriveModeIndicator, MaxSpeedLabel, RpmGauge, Speedometer};
use super::{DisplaySink, DisplayUpdate};
use crate::session::format_elapsed;

/// Renders the widget models as one status line, redrawn in place
pub struct TerminalDisplay<W: Write = io::Stdout> {
    out: W,
    speedometer: Speedometer,
    rpm: RpmGauge,
    battery: BatteryIndicator,
    has_battery: bool,
    drive_mode: DriveModeIndicator,
    max_speed: MaxSpeedLabel,
    elapsed: Duration,
    link: bool,
    color: bool,
    last_line: String,
}

/// Wrap `text` in an ANSI truecolor escape for `hex` (`#RRGGBB`)
fn paint(text: &str, hex: &str, dim: bool) -> String {
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
    };
    let (Some(r), Some(g), Some(b)) = (channel(1), channel(3), channel(5)) else {
        return text.to_string();
    };
    let dim = if dim { "2;" } else { "" };
    format!("\x1b[{dim}38;2;{r};{g};{b}m{text}\x1b[0m")
}

impl TerminalDisplay<io::Stdout> {
    /// Draw on stdout, in color when it is a terminal
    pub fn stdout(now: Instant) -> Self {
        let color = io::stdout().is_terminal();
        Self::new(io::stdout(), now).with_color(color)
    }
}

impl<W: Write> TerminalDisplay<W> {
    /// Plain-text display writing to `out`
    pub fn new(out: W, now: Instant) -> Self {
        Self {
            out,
            speedometer: Speedometer::new(now),
            rpm: RpmGauge::new(now),
            battery: BatteryIndicator::default(),
            has_battery: false,
            drive_mode: DriveModeIndicator::default(),
            max_speed: MaxSpeedLabel::default(),
            elapsed: Duration::ZERO,
            link: false,
            color: false,
            last_line: String::new(),
        }
    }

    /// Enable or disable ANSI colors
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Center gear letter in a three-column slot, shifted while sliding in
    fn gear(&self, now: Instant) -> String {
        let shift = (self.drive_mode.offset_px(now) / DriveModeIndicator::SLIDE_PX)
            .round()
            .clamp(-1.0, 1.0) as i32;
        let letter = self.drive_mode.mode().letter().to_string();
        let letter = if self.color {
            let fading = self.drive_mode.opacity(now) < 0.5;
            paint(&letter, self.drive_mode.accent_color(), fading)
        } else {
            letter
        };
        match shift {
            -1 => format!("{letter}  "),
            1 => format!("  {letter}"),
            _ => format!(" {letter} "),
        }
    }

    /// Status line as it would be drawn at `now`
    pub fn render(&self, now: Instant) -> String {
        let (left, right) = self.drive_mode.hints();
        let max_marker = if self.max_speed.is_highlighted(now) { "*" } else { " " };
        let speed_marker = if self.speedometer.in_red_zone() { "!" } else { " " };
        let rpm_marker = if self.rpm.is_high() { "!" } else { " " };

        let battery = if !self.has_battery {
            "BAT   --".to_string()
        } else if self.battery.is_visible() {
            format!(
                "BAT {:>3.0}% {:.2}V",
                self.battery.percent(),
                self.battery.voltage()
            )
        } else {
            format!("BAT      {:.2}V", self.battery.voltage())
        };
        let battery = if self.color && self.has_battery {
            paint(&battery, self.battery.color(), false)
        } else {
            battery
        };

        format!(
            "SPD {:>5.1} km/h{} {:>6.1}° | RPM {:>3.0}{} {:>6.1}° | MAX {:>5}{} | {} [{}] {} | {} | {} | {}",
            self.speedometer.speed(),
            speed_marker,
            self.speedometer.needle_angle(now),
            self.rpm.rpm(),
            rpm_marker,
            self.rpm.needle_angle(now),
            self.max_speed.text(),
            max_marker,
            left,
            self.gear(now),
            right,
            battery,
            format_elapsed(self.elapsed),
            if self.link { "LINK" } else { "----" },
        )
    }

    /// Underlying writer
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn draw(&mut self, now: Instant) -> io::Result<()> {
        let line = self.render(now);
        if line == self.last_line {
            return Ok(());
        }
        write!(self.out, "\r{line}\x1b[K")?;
        self.out.flush()?;
        self.last_line = line;
        Ok(())
    }
}

impl<W: Write> DisplaySink for TerminalDisplay<W> {
    fn apply(&mut self, update: DisplayUpdate, now: Instant) {
        match update {
            DisplayUpdate::Speed(speed) => {
                self.speedometer.set_speed(speed, now);
            }
            DisplayUpdate::Rpm(rpm) => self.rpm.set_rpm(rpm, now),
            DisplayUpdate::MaxSpeed { value, new_record } => {
                self.max_speed.set(value, new_record, now)
            }
            DisplayUpdate::DriveMode(mode) => {
                self.drive_mode.set(mode, now);
            }
            DisplayUpdate::Battery { percent, voltage } => {
                self.battery.set(percent, voltage, now);
                self.has_battery = true;
            }
            DisplayUpdate::Elapsed(elapsed) => self.elapsed = elapsed,
            DisplayUpdate::Link(up) => self.link = up,
        }
    }

    fn frame(&mut self, now: Instant) {
        self.battery.tick(now);
        if let Err(e) = self.draw(now) {
            debug!("Terminal redraw failed: {e}");
        }
    }
}
