//! Battery Telemetry
//!
//! An external bridge process prints one JSON object per line on stdout:
//!
//! ```json
//! {"battery": {"voltage": 7.9, "percent": 61.5, "current": 160.0}, "direction": "F"}
//! ```
//!
//! Lines that are not JSON objects, or that lack a usable `battery` object,
//! are dropped one at a time; the stream keeps going. Extra fields are
//! ignored.

mod bridge;

pub use bridge::TelemetryBridge;

use bytes::BytesMut;
use futures_util::StreamExt;
use serde::Deserialize;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, FramedRead};
use tracing::debug;

use crate::line_codec::LossyLinesCodec;

/// Errors raised by the telemetry client
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The line is not a JSON object of the expected shape
    #[error("Malformed telemetry line: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The line has a battery object with no usable value
    #[error("Telemetry line has neither battery voltage nor percent")]
    EmptyReading,

    /// No candidate script path exists
    #[error("Bridge script not found (searched {} locations)", .0.len())]
    ScriptNotFound(Vec<PathBuf>),

    /// The interpreter could not be started
    #[error("Failed to launch {interpreter}: {source}")]
    Spawn {
        /// Program that failed to start
        interpreter: String,
        /// Underlying spawn failure
        #[source]
        source: io::Error,
    },

    /// The bridge ended before its first line
    #[error("Bridge exited during startup")]
    ExitedEarly,

    /// The child has no piped stdout
    #[error("Bridge stdout was not captured")]
    NoStdout,

    /// Any other I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One battery measurement
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryReading {
    /// Pack voltage in volts
    pub voltage: Option<f64>,
    /// Charge in percent, as computed by the bridge
    pub percent: Option<f64>,
}

/// One accepted telemetry line
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    /// Battery values carried by the line
    pub battery: BatteryReading,
    /// Direction as reported by the bridge, if any
    pub direction: Option<String>,
}

impl TelemetryEvent {
    /// Event carrying only a battery reading
    pub fn battery(voltage: f64, percent: f64) -> Self {
        Self {
            battery: BatteryReading {
                voltage: Some(voltage),
                percent: Some(percent),
            },
            direction: None,
        }
    }

    /// Attach a reported direction
    pub fn with_direction(mut self, direction: impl Into<String>) -> Self {
        self.direction = Some(direction.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct RawBattery {
    #[serde(default)]
    voltage: Option<f64>,
    #[serde(default)]
    percent: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawLine {
    battery: RawBattery,
    #[serde(default)]
    direction: Option<String>,
}

/// Parse one telemetry line
pub fn parse_telemetry_line(line: &str) -> Result<TelemetryEvent, TelemetryError> {
    let raw: RawLine = serde_json::from_str(line)?;
    if raw.battery.voltage.is_none() && raw.battery.percent.is_none() {
        return Err(TelemetryError::EmptyReading);
    }
    Ok(TelemetryEvent {
        battery: BatteryReading {
            voltage: raw.battery.voltage,
            percent: raw.battery.percent,
        },
        direction: raw.direction,
    })
}

/// Newline-delimited JSON decoder that skips bad lines
#[derive(Debug, Clone, Default)]
pub struct TelemetryCodec {
    lines: LossyLinesCodec,
}

impl TelemetryCodec {
    fn accept(line: String) -> Option<TelemetryEvent> {
        match parse_telemetry_line(&line) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!(line = %line, "Dropping telemetry line: {e}");
                None
            }
        }
    }
}

impl Decoder for TelemetryCodec {
    type Item = TelemetryEvent;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<TelemetryEvent>, io::Error> {
        while let Some(line) = self.lines.decode(buf)? {
            if let Some(event) = Self::accept(line) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<TelemetryEvent>, io::Error> {
        while let Some(line) = self.lines.decode_eof(buf)? {
            if let Some(event) = Self::accept(line) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}

/// Anything that yields telemetry events
pub trait TelemetrySource {
    /// Wait for the next event; `None` once the source has ended
    fn next_event(&mut self) -> impl Future<Output = Option<TelemetryEvent>>;
}

/// Telemetry decoded from any byte stream
pub struct TelemetryReader<R> {
    frames: FramedRead<R, TelemetryCodec>,
}

impl<R: AsyncRead + Unpin> TelemetryReader<R> {
    /// Decode newline-delimited JSON from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            frames: FramedRead::new(reader, TelemetryCodec::default()),
        }
    }
}

impl<R: AsyncRead + Unpin> TelemetrySource for TelemetryReader<R> {
    async fn next_event(&mut self) -> Option<TelemetryEvent> {
        match self.frames.next().await? {
            Ok(event) => Some(event),
            Err(e) => {
                debug!("Telemetry stream failed: {e}");
                None
            }
        }
    }
}

/// In-process telemetry fed through a channel
#[derive(Debug)]
pub struct ChannelTelemetry {
    rx: mpsc::Receiver<TelemetryEvent>,
}

impl ChannelTelemetry {
    /// Create a source and the sender that feeds it
    pub fn channel(buffer: usize) -> (mpsc::Sender<TelemetryEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

impl TelemetrySource for ChannelTelemetry {
    async fn next_event(&mut self) -> Option<TelemetryEvent> {
        self.rx.recv().await
    }
}
