//! Arduino pulse counter over a serial line
//!
//! The sketch prints one status line per measurement window, e.g.
//! `Pulses: 42 | Speed: 84.00 pulse/s | Time: 12.34 s`. Only the
//! `Speed: <float> pulse/s` token is used.

use futures_util::StreamExt;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use super::{AcquisitionError, MotionSample, MotionSource, Reconnector};
use crate::line_codec::LossyLinesCodec;

fn speed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Speed:\s+([\d.]+)\s+pulse/s").expect("valid regex"))
}

/// Extract pulses/s from one status line
pub fn parse_speed_line(line: &str) -> Option<f64> {
    let captures = speed_pattern().captures(line)?;
    captures.get(1)?.as_str().parse::<f64>().ok()
}

fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Sort ports so that:
///  - ttyACM* come first (numeric suffix ascending)
///  - then ttyUSB*
///  - then everything else by name
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let base = basename(name);
    if let Some(rest) = base.strip_prefix("ttyACM") {
        return (0, rest.parse().unwrap_or(usize::MAX), base.to_string());
    }
    if let Some(rest) = base.strip_prefix("ttyUSB") {
        return (1, rest.parse().unwrap_or(usize::MAX), base.to_string());
    }
    (2, 0, base.to_string())
}

/// Keep the Arduino-like ports and order them deterministically
pub fn order_candidate_ports<I, S>(names: I, prefixes: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut ports: Vec<String> = names
        .into_iter()
        .map(Into::into)
        .filter(|name| {
            let base = basename(name);
            prefixes.iter().any(|prefix| base.starts_with(prefix.as_str()))
        })
        .collect();
    ports.sort_by_key(|name| port_sort_key(name));
    ports.dedup();
    ports
}

/// Enumerate system serial ports matching `prefixes`, best candidate first
pub fn discover_ports(prefixes: &[String]) -> Vec<String> {
    let names = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| info.port_name);
    order_candidate_ports(names, prefixes)
}

type LineReader = FramedRead<SerialStream, LossyLinesCodec>;

/// Speed source reading an Arduino pulse counter
pub struct SerialSource {
    fixed_port: Option<String>,
    prefixes: Vec<String>,
    baud: u32,
    reader: Option<LineReader>,
    port_name: Option<String>,
    reconnector: Reconnector,
    warned: bool,
}

impl SerialSource {
    /// Source that discovers a port matching `prefixes` on each connect
    pub fn new(prefixes: Vec<String>, baud: u32, retry: Duration) -> Self {
        Self {
            fixed_port: None,
            prefixes,
            baud,
            reader: None,
            port_name: None,
            reconnector: Reconnector::new(retry),
            warned: false,
        }
    }

    /// Always open `port` instead of discovering one
    pub fn with_fixed_port(mut self, port: impl Into<String>) -> Self {
        self.fixed_port = Some(port.into());
        self
    }

    /// Port currently open, if any
    pub fn current_port(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Find and open a port once. Safe to call repeatedly.
    pub fn connect(&mut self) -> Result<(), AcquisitionError> {
        self.close();

        let port = match &self.fixed_port {
            Some(port) => port.clone(),
            None => {
                let found = discover_ports(&self.prefixes);
                for name in &found {
                    debug!(port = %name, "Found potential Arduino port");
                }
                found
                    .into_iter()
                    .next()
                    .ok_or_else(|| AcquisitionError::NoDevice(self.prefixes.clone()))?
            }
        };

        let stream = tokio_serial::new(&port, self.baud)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()?;

        info!(port = %port, baud = self.baud, "Connected to Arduino");
        self.reader = Some(FramedRead::new(stream, LossyLinesCodec::default()));
        self.port_name = Some(port);
        self.warned = false;
        Ok(())
    }

    fn attempt_connect(&mut self) {
        debug!("Attempting to connect to Arduino");
        if let Err(e) = self.connect() {
            if self.warned {
                debug!("Reconnect failed: {e}");
            } else {
                warn!(
                    retry_ms = self.reconnector.interval().as_millis() as u64,
                    "Arduino not available ({e}); will keep retrying"
                );
                self.warned = true;
            }
            self.reconnector.failed();
        }
    }

    fn drop_link(&mut self, reason: &str) {
        warn!(port = ?self.port_name, "Serial link lost: {reason}");
        self.close();
        self.reconnector.failed();
    }
}

impl MotionSource for SerialSource {
    async fn next_sample(&mut self) -> Option<MotionSample> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                self.reconnector.wait().await;
                self.attempt_connect();
                continue;
            };

            match reader.next().await {
                Some(Ok(line)) => {
                    if let Some(pps) = parse_speed_line(&line) {
                        return Some(MotionSample::pulses_per_sec(pps));
                    }
                }
                Some(Err(e)) => self.drop_link(&e.to_string()),
                None => self.drop_link("device closed"),
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!(port = ?self.port_name, "Serial port closed");
        }
        self.port_name = None;
    }

    fn describe(&self) -> String {
        match (&self.port_name, &self.fixed_port) {
            (Some(port), _) => format!("serial {port} @ {}", self.baud),
            (None, Some(port)) => format!("serial {port} @ {} (closed)", self.baud),
            (None, None) => format!("serial auto @ {}", self.baud),
        }
    }
}
