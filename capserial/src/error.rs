//! Error types for capserial.

use std::{fmt, io};
use thiserror::Error;

/// Result type for capserial operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for capserial operations.
///
/// None of these are fatal to a [`SerialTransport`](crate::SerialTransport):
/// every failure leaves the transport in a well-defined state and the caller
/// may keep polling.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error outside of an open link (device directory scans, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The device could not be opened.
    #[error("Unable to open {device}: {reason}")]
    DeviceUnavailable {
        /// Device that was requested.
        device: String,
        /// Why the open failed.
        reason: OpenFailure,
    },

    /// The device opened but the line discipline could not be applied.
    #[error("Unable to set serial port parameters for {device}: {source}")]
    Configuration {
        /// Device that was opened.
        device: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The far end is gone: the device node vanished or the link reported a
    /// non-transient error.
    #[error("Serial link to {device} lost")]
    LinkLost {
        /// Device the link was open on.
        device: String,
        /// Underlying OS error, absent when loss was inferred from a probe.
        #[source]
        source: Option<io::Error>,
    },

    /// A write aborted before every byte was accepted.
    #[error("Write to {device} failed: {source}")]
    WriteFailed {
        /// Device the link was open on.
        device: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Operation requires an open connection.
    #[error("Serial port is not connected")]
    NotConnected,
}

impl Error {
    /// Whether this error means the caller should disconnect and rediscover.
    pub fn is_link_lost(&self) -> bool {
        matches!(self, Self::LinkLost { .. })
    }
}

/// Reason a device could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenFailure {
    /// The device node does not exist.
    NotFound,
    /// Any other failure (permissions, device busy, ...).
    Other(String),
}

impl From<&io::Error> for OpenFailure {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Other(err.to_string()),
        }
    }
}

impl fmt::Display for OpenFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("No such file or directory"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}
