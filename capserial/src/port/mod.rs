//! Port abstraction for cross-platform serial communication.
//!
//! [`SerialTransport`](crate::SerialTransport) is generic over two seams:
//!
//! - [`Backend`]: the OS layer that opens devices, probes whether a device
//!   node still exists and enumerates candidate devices.
//! - [`Link`]: one open OS resource (file descriptor or COM handle), read and
//!   written without blocking.
//!
//! ```text
//! +----------------------------+
//! |       SerialTransport      |   connect / read / write / disconnect
//! +-------------+--------------+
//!               |
//!        Backend + Link traits
//!               |
//!     +---------+----------+
//!     |                    |
//! +---+-----------+  +-----+--------+
//! | NativeBackend |  | FakeBackend  |
//! |  (serialport) |  |  (in-memory) |
//! +---------------+  +--------------+
//!  termios / COM       tests
//! ```
//!
//! ## Link read contract
//!
//! `Link::read` reports what the OS reported, without interpretation:
//!
//! - `Ok(0)`: a zero-length read. The transport disambiguates this by probing
//!   the device node.
//! - `Err` with kind `WouldBlock`, `TimedOut` or `Interrupted`: nothing
//!   available right now.
//! - any other `Err`: the link is broken.

#[cfg(feature = "native")]
pub mod native;

pub mod fake;

use std::io::{self, Read, Write};

/// Line discipline applied to a link after it is opened.
///
/// Defaults to 115200 baud, 8 data bits, no parity, 1 stop bit, no flow
/// control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LineConfig {
    /// Baud rate.
    pub baud_rate: u32,
    /// Data bits (typically 8).
    pub data_bits: DataBits,
    /// Parity (typically None).
    pub parity: Parity,
    /// Stop bits (typically One).
    pub stop_bits: StopBits,
    /// Flow control (typically None).
    pub flow_control: FlowControl,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            baud_rate: Self::DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl LineConfig {
    /// Baud rate the sensor firmware talks at.
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;

    /// Set the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Number of data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub enum DataBits {
    /// 5 data bits.
    Five,
    /// 6 data bits.
    Six,
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(format!("unsupported data bits: {other} (expected 5-8)")),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("unsupported stop bits: {other} (expected 1 or 2)")),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// Hardware flow control (RTS/CTS).
    Hardware,
    /// Software flow control (XON/XOFF).
    Software,
}

/// An open, non-blocking serial link.
///
/// Dropping the link releases the OS resource.
pub trait Link: Read + Write + Send {
    /// Apply the line discipline.
    fn configure(&mut self, config: &LineConfig) -> io::Result<()>;
}

/// Why [`Backend::open`] failed.
#[derive(Debug)]
pub enum OpenError {
    /// The device node could not be opened. A missing node is reported with
    /// [`io::ErrorKind::NotFound`].
    Unavailable(io::Error),
    /// The node opened, but the OS rejected the initial line setup (for
    /// example a node that is not a terminal).
    Configuration(io::Error),
}

impl From<io::Error> for OpenError {
    fn from(err: io::Error) -> Self {
        Self::Unavailable(err)
    }
}

/// OS layer behind a [`SerialTransport`](crate::SerialTransport).
pub trait Backend {
    /// Link type produced by [`Backend::open`].
    type Link: Link;

    /// Open `device` for exclusive, non-blocking access.
    fn open(&self, device: &str) -> Result<Self::Link, OpenError>;

    /// Whether the device node is still reachable.
    fn is_present(&self, device: &str) -> bool;

    /// Candidate devices in OS enumeration order. Never fails: an empty list
    /// means nothing was found.
    fn list_devices(&self) -> Vec<String>;
}

/// Whether an I/O error only means "try again later".
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
