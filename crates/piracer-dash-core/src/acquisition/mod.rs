//! Motion Acquisition
//!
//! Produces a best-effort stream of raw motion samples from one of:
//! - a SocketCAN bus (speed frame carrying km/h),
//! - an Arduino pulse counter over a serial line (pulses/s),
//! - a built-in simulator.
//!
//! A missing device is never fatal. Sources reconnect on a fixed interval and
//! keep the reconnect deadline in their own state, so polling them from a
//! `select!` loop is cancel-safe.

pub mod can;
mod demo;
mod error;
pub mod serial;

pub use can::{decode_speed_frame, CanFrame, CanSource};
pub use demo::DemoSource;
pub use error::AcquisitionError;
pub use serial::{parse_speed_line, SerialSource};

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant};

/// Unit of a raw motion value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionUnit {
    /// Vehicle speed, already in km/h (CAN, demo)
    KilometresPerHour,
    /// Wheel sensor pulse rate (serial)
    PulsesPerSecond,
}

/// One raw motion reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Reading in `unit`
    pub value: f64,
    /// What `value` measures
    pub unit: MotionUnit,
}

impl MotionSample {
    /// Sample already in km/h
    pub fn kmh(value: f64) -> Self {
        Self {
            value,
            unit: MotionUnit::KilometresPerHour,
        }
    }

    /// Sample in wheel pulses per second
    pub fn pulses_per_sec(value: f64) -> Self {
        Self {
            value,
            unit: MotionUnit::PulsesPerSecond,
        }
    }
}

/// A producer of motion samples
pub trait MotionSource {
    /// Wait for the next sample
    ///
    /// Reconnects internally while the device is unavailable. Returns `None`
    /// only when the source has ended for good.
    fn next_sample(&mut self) -> impl Future<Output = Option<MotionSample>>;

    /// Whether the underlying device is currently open
    fn is_connected(&self) -> bool;

    /// Release the device handle. Idempotent.
    fn close(&mut self);

    /// Human-readable device description for logs
    fn describe(&self) -> String;
}

/// Fixed-interval reconnect schedule
#[derive(Debug, Clone)]
pub struct Reconnector {
    interval: Duration,
    next_attempt: Instant,
}

impl Reconnector {
    /// First attempt is due immediately
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_attempt: Instant::now(),
        }
    }

    /// Delay between attempts
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until the next attempt is due
    pub async fn wait(&self) {
        time::sleep_until(self.next_attempt).await;
    }

    /// Record a failed attempt and push the deadline out by one interval
    pub fn failed(&mut self) {
        self.next_attempt = Instant::now() + self.interval;
    }

    /// Allow the next attempt immediately (after a disconnect)
    pub fn reset(&mut self) {
        self.next_attempt = Instant::now();
    }
}

/// In-process source replaying a fixed sequence
///
/// Yields each sample in order, optionally spaced by `interval`, then ends.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    samples: VecDeque<MotionSample>,
    interval: Option<Duration>,
    next_due: Option<Instant>,
    closed: bool,
}

impl ScriptedSource {
    /// Replay `samples` back to back
    pub fn new(samples: impl IntoIterator<Item = MotionSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            interval: None,
            next_due: None,
            closed: false,
        }
    }

    /// Space samples by `interval`
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Samples not yet yielded
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl MotionSource for ScriptedSource {
    async fn next_sample(&mut self) -> Option<MotionSample> {
        if self.closed || self.samples.is_empty() {
            return None;
        }
        if let Some(interval) = self.interval {
            let due = *self.next_due.get_or_insert_with(|| Instant::now() + interval);
            time::sleep_until(due).await;
            self.next_due = None;
        }
        self.samples.pop_front()
    }

    fn is_connected(&self) -> bool {
        !self.closed
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
