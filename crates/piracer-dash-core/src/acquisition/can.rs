//! SocketCAN speed source
//!
//! Binds a raw CAN socket to a fixed interface and decodes the speed frame:
//! standard arbitration ID `0x123`, payload byte 0 = speed in km/h (0 to 255).
//! Every other frame is ignored.

use std::io;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AcquisitionError, MotionSample, MotionSource, Reconnector};

/// Maximum classic CAN payload
pub const CAN_MAX_DLEN: usize = 8;

/// Default arbitration ID of the speed frame
pub const SPEED_FRAME_ID: u32 = 0x123;

/// A received classic CAN frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: u32,
    extended: bool,
    remote: bool,
    len: u8,
    data: [u8; CAN_MAX_DLEN],
}

impl CanFrame {
    /// Build a standard (11-bit) data frame; payload beyond 8 bytes is truncated
    pub fn new(id: u32, payload: &[u8]) -> Self {
        let len = payload.len().min(CAN_MAX_DLEN);
        let mut data = [0u8; CAN_MAX_DLEN];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id,
            extended: false,
            remote: false,
            len: len as u8,
            data,
        }
    }

    /// Build an extended (29-bit) data frame
    pub fn new_extended(id: u32, payload: &[u8]) -> Self {
        Self {
            extended: true,
            ..Self::new(id, payload)
        }
    }

    /// Build a remote transmission request, which carries no payload
    pub fn new_remote(id: u32, extended: bool) -> Self {
        Self {
            extended,
            remote: true,
            ..Self::new(id, &[])
        }
    }

    /// Arbitration ID without the format flags
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// True for a 29-bit identifier
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// True for a remote transmission request
    pub fn is_remote(&self) -> bool {
        self.remote
    }
}

/// Decode the speed frame
///
/// Only a standard data frame with the speed ID matches. Remote requests,
/// extended IDs that share the numeric value, and empty payloads return
/// `None`.
pub fn decode_speed_frame(frame: &CanFrame, speed_id: u32) -> Option<MotionSample> {
    if frame.is_remote() || frame.is_extended() || frame.id() != speed_id {
        return None;
    }
    let speed = *frame.data().first()?;
    Some(MotionSample::kmh(f64::from(speed)))
}

#[cfg(target_os = "linux")]
mod socket {
    use super::CanFrame;
    use crate::acquisition::AcquisitionError;
    use socketcan::{EmbeddedFrame, Id};
    use std::io;

    /// Raw CAN socket registered with the tokio reactor
    pub struct CanSocket(socketcan::tokio::CanSocket);

    impl CanSocket {
        pub fn open(interface: &str) -> Result<Self, AcquisitionError> {
            socketcan::tokio::CanSocket::open(interface)
                .map(Self)
                .map_err(|e| AcquisitionError::Open {
                    interface: interface.to_string(),
                    reason: e.to_string(),
                })
        }

        /// Wait for and read one data or remote frame; error frames are skipped
        pub async fn read_frame(&self) -> io::Result<CanFrame> {
            loop {
                let frame = self.0.read_frame().await?;
                if let Some(frame) = convert(&frame) {
                    return Ok(frame);
                }
            }
        }
    }

    fn convert(frame: &socketcan::CanFrame) -> Option<CanFrame> {
        if matches!(frame, socketcan::CanFrame::Error(_)) {
            return None;
        }
        let (id, extended) = match EmbeddedFrame::id(frame) {
            Id::Standard(id) => (u32::from(id.as_raw()), false),
            Id::Extended(id) => (id.as_raw(), true),
        };
        Some(if EmbeddedFrame::is_remote_frame(frame) {
            CanFrame::new_remote(id, extended)
        } else if extended {
            CanFrame::new_extended(id, EmbeddedFrame::data(frame))
        } else {
            CanFrame::new(id, EmbeddedFrame::data(frame))
        })
    }
}

#[cfg(not(target_os = "linux"))]
mod socket {
    use super::CanFrame;
    use crate::acquisition::AcquisitionError;
    use std::io;

    pub struct CanSocket;

    impl CanSocket {
        pub fn open(_interface: &str) -> Result<Self, AcquisitionError> {
            Err(AcquisitionError::Unsupported)
        }

        pub async fn read_frame(&self) -> io::Result<CanFrame> {
            std::future::pending().await
        }
    }
}

use socket::CanSocket;

/// Speed source reading a SocketCAN interface
pub struct CanSource {
    interface: String,
    speed_id: u32,
    socket: Option<CanSocket>,
    reconnector: Reconnector,
    /// First failure is a warning; repeats are debug noise
    warned: bool,
}

impl CanSource {
    /// Source for `interface`; nothing is opened until the first read
    pub fn new(interface: impl Into<String>, speed_id: u32, retry: Duration) -> Self {
        Self {
            interface: interface.into(),
            speed_id,
            socket: None,
            reconnector: Reconnector::new(retry),
            warned: false,
        }
    }

    /// Try to open the interface once. Safe to call repeatedly.
    pub fn connect(&mut self) -> Result<(), AcquisitionError> {
        self.close();
        let socket = CanSocket::open(&self.interface)?;
        self.socket = Some(socket);
        self.warned = false;
        info!(interface = %self.interface, "Connected to CAN bus");
        Ok(())
    }

    fn attempt_connect(&mut self) {
        match self.connect() {
            Ok(()) => {}
            Err(e) => {
                if self.warned {
                    debug!(interface = %self.interface, "Reconnect failed: {e}");
                } else {
                    warn!(
                        interface = %self.interface,
                        retry_ms = self.reconnector.interval().as_millis() as u64,
                        "{e}; will keep retrying"
                    );
                    self.warned = true;
                }
                self.reconnector.failed();
            }
        }
    }

    fn on_read_error(&mut self, e: io::Error) {
        warn!(interface = %self.interface, "CAN read failed: {e}; reconnecting");
        self.close();
        self.reconnector.failed();
    }
}

impl MotionSource for CanSource {
    async fn next_sample(&mut self) -> Option<MotionSample> {
        loop {
            let Some(socket) = self.socket.as_ref() else {
                self.reconnector.wait().await;
                self.attempt_connect();
                continue;
            };

            match socket.read_frame().await {
                Ok(frame) => {
                    if let Some(sample) = decode_speed_frame(&frame, self.speed_id) {
                        return Some(sample);
                    }
                }
                Err(e) => self.on_read_error(e),
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!(interface = %self.interface, "CAN socket closed");
        }
    }

    fn describe(&self) -> String {
        format!("CAN {} id={:#05x}", self.interface, self.speed_id)
    }
}
