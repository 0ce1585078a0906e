//! Native serial port backend using the `serialport` crate.
//!
//! The crate hides most of the difference between termios file descriptors
//! and Windows COM handles. What it does not hide is handled here per
//! platform:
//!
//! - **POSIX**: the node is opened once on its own (`O_NOCTTY | O_NONBLOCK`)
//!   before `serialport` takes over, so a node that cannot be opened is told
//!   apart from one that opens but rejects the terminal setup. Reads go
//!   straight to the descriptor with a zero timeout. A zero-length read is
//!   passed up so the transport can `stat` the device node, and candidates
//!   come from scanning `/dev`.
//! - **Windows**: reads first check the driver's input queue (as
//!   `ClearCommError` does) and report an empty queue as `WouldBlock`, so a
//!   read never returns zero bytes and the presence probe is effectively
//!   unused. Unplug shows up as `bytes_to_read()` failing, which the
//!   transport reports as link loss. Every open failure is reported as
//!   unavailable.

use {
    crate::port::{
        Backend, DataBits, FlowControl, LineConfig, Link, OpenError, Parity, StopBits,
    },
    log::trace,
    std::{
        io::{self, Read, Write},
        time::Duration,
    },
};

/// Native serial backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl Backend for NativeBackend {
    type Link = NativeLink;

    fn open(&self, device: &str) -> Result<NativeLink, OpenError> {
        check_openable(device)?;

        // `serialport` opens with O_NOCTTY | O_NONBLOCK and TIOCEXCL on POSIX
        // and without sharing on Windows, then puts the line in raw mode.
        let port = serialport::new(device, LineConfig::DEFAULT_BAUD_RATE)
            .timeout(Duration::ZERO)
            .open()
            .map_err(setup_failure)?;

        trace!("Opened {device}");
        Ok(NativeLink { port })
    }

    fn is_present(&self, device: &str) -> bool {
        device_present(device)
    }

    fn list_devices(&self) -> Vec<String> {
        list_devices()
    }
}

/// An open native serial port.
pub struct NativeLink {
    port: Box<dyn serialport::SerialPort>,
}

impl Link for NativeLink {
    fn configure(&mut self, config: &LineConfig) -> io::Result<()> {
        self.port
            .set_baud_rate(config.baud_rate)?;
        self.port
            .set_data_bits(config.data_bits.into())?;
        self.port
            .set_parity(config.parity.into())?;
        self.port
            .set_stop_bits(config.stop_bits.into())?;
        self.port
            .set_flow_control(config.flow_control.into())?;
        self.port
            .set_timeout(Duration::ZERO)?;
        Ok(())
    }
}

impl Read for NativeLink {
    #[cfg(windows)]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let queued = self
            .port
            .bytes_to_read()?;
        if queued == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }

        let len = buf
            .len()
            .min(usize::try_from(queued).unwrap_or(usize::MAX));
        self.port
            .read(&mut buf[..len])
    }

    #[cfg(not(windows))]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port
            .read(buf)
    }
}

impl Write for NativeLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port
            .flush()
    }
}

#[cfg(unix)]
fn check_openable(device: &str) -> io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(device)
        .map(drop)
}

/// The node already opened once, so this is the terminal setup failing.
#[cfg(unix)]
fn setup_failure(err: serialport::Error) -> OpenError {
    OpenError::Configuration(err.into())
}

#[cfg(not(unix))]
fn check_openable(_device: &str) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn setup_failure(err: serialport::Error) -> OpenError {
    OpenError::Unavailable(err.into())
}

#[cfg(unix)]
fn device_present(device: &str) -> bool {
    std::fs::metadata(device).is_ok()
}

#[cfg(unix)]
fn list_devices() -> Vec<String> {
    crate::detect::scan_device_dir()
}

#[cfg(windows)]
fn device_present(device: &str) -> bool {
    serialport::available_ports().is_ok_and(|ports| {
        ports
            .iter()
            .any(|p| {
                p.port_name
                    .eq_ignore_ascii_case(device)
            })
    })
}

#[cfg(windows)]
fn list_devices() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|p| p.port_name)
            .collect(),
        Err(e) => {
            log::debug!("Failed to enumerate COM ports: {e}");
            Vec::new()
        },
    }
}

#[cfg(not(any(unix, windows)))]
fn device_present(device: &str) -> bool {
    std::fs::metadata(device).is_ok()
}

#[cfg(not(any(unix, windows)))]
fn list_devices() -> Vec<String> {
    Vec::new()
}

// Type conversions from our types to serialport types

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => Self::Five,
            DataBits::Six => Self::Six,
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => Self::One,
            StopBits::Two => Self::Two,
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => Self::None,
            FlowControl::Hardware => Self::Hardware,
            FlowControl::Software => Self::Software,
        }
    }
}
