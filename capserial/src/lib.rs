//! # capserial
//!
//! A non-blocking serial transport for capacitive sensor boards.
//!
//! This crate turns a USB serial device into a byte stream that can be polled
//! once per rendered frame:
//!
//! - Device discovery (`/dev/ttyACM*`, `/dev/ttyUSB*`, Windows COM ports)
//! - Connect / reconnect with a fixed line discipline (115200 8-N-1 by default)
//! - Non-blocking reads that tell "nothing yet" apart from "device unplugged"
//! - Writes that complete across partial sends
//! - Newline framing and piano key edge detection for the demo boards
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//! - **Fake**: in-memory backend with fault injection, see [`port::fake`]
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for line discipline types
//!
//! ## Example
//!
//! ```rust,no_run
//! use capserial::{LineEvent, LineReader, NativeTransport};
//!
//! let mut transport = NativeTransport::new("");
//! let mut reader = LineReader::new();
//!
//! loop {
//!     if !transport.is_connected() {
//!         if let Some(device) = NativeTransport::list_available_devices().first() {
//!             let _ = transport.connect(Some(device));
//!         }
//!     }
//!
//!     if transport.is_connected() {
//!         match reader.poll(&mut transport) {
//!             Ok(LineEvent::Line(line)) => println!("{line}"),
//!             Ok(LineEvent::LinkLost) => transport.disconnect(),
//!             Ok(LineEvent::Pending) | Err(_) => {},
//!         }
//!     }
//!
//!     std::thread::sleep(std::time::Duration::from_millis(40));
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod detect;
pub mod error;
pub mod line;
pub mod piano;
pub mod port;
pub mod transport;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::native::{NativeBackend, NativeLink};
pub use {
    error::{Error, OpenFailure, Result},
    line::{LineEvent, LineReader},
    piano::{Indicator, KeyboardState, NOTES},
    port::{Backend, DataBits, FlowControl, LineConfig, Link, OpenError, Parity, StopBits},
    transport::SerialTransport,
};

/// [`SerialTransport`] over the native OS serial layer.
#[cfg(feature = "native")]
pub type NativeTransport = SerialTransport<NativeBackend>;
