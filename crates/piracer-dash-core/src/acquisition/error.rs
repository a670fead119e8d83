//! Acquisition errors

use thiserror::Error;

/// Errors that can occur while opening or reading a motion device
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// The CAN interface could not be opened or bound
    #[error("Cannot open CAN interface {interface}: {reason}")]
    Open {
        /// Interface name, e.g. `can0`
        interface: String,
        /// Error reported by the socket layer
        reason: String,
    },

    /// SocketCAN is Linux only
    #[error("CAN is not supported on this platform")]
    Unsupported,

    /// No port matched the configured candidates
    #[error("No serial device matching {0:?}")]
    NoDevice(Vec<String>),

    /// The serial port rejected open or configuration
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// The device reported end of stream
    #[error("Device closed")]
    Closed,

    /// Any other I/O failure
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serialport::Error> for AcquisitionError {
    fn from(e: serialport::Error) -> Self {
        AcquisitionError::SerialError(e.to_string())
    }
}
