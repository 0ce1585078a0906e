//! Serial connection lifecycle.
//!
//! [`SerialTransport`] owns at most one open [`Link`] and turns the raw OS
//! read/write results into three outcomes a polling caller cares about:
//! data, nothing yet, or the device is gone.
//!
//! ```text
//!                connect() ok
//!   +--------------+ -----------> +-----------+
//!   | Disconnected |              | Connected |
//!   +--------------+ <----------- +-----------+
//!     ^  |  connect() err    disconnect() / drop
//!     +--+
//! ```
//!
//! A [`Error::LinkLost`] from [`SerialTransport::read`] does not change state.
//! The caller is expected to call [`SerialTransport::disconnect`] and go back
//! to discovery.

use {
    crate::{
        error::{Error, OpenFailure, Result},
        port::{Backend, LineConfig, Link, OpenError, is_transient},
    },
    log::{debug, info, trace},
    std::io::{self, Read, Write},
};

#[cfg(feature = "native")]
use crate::port::native::NativeBackend;

/// A single serial connection over a pluggable OS backend.
pub struct SerialTransport<B: Backend> {
    backend: B,
    /// Last device name that was set or successfully opened. Empty means unset.
    device_name: String,
    config: LineConfig,
    link: Option<B::Link>,
}

#[cfg(feature = "native")]
impl SerialTransport<NativeBackend> {
    /// Create a disconnected transport over the native OS serial layer.
    ///
    /// `device_name` may be empty.
    pub fn new(device_name: impl Into<String>) -> Self {
        Self::with_backend(NativeBackend, device_name)
    }

    /// Candidate serial devices visible to the OS right now.
    ///
    /// On POSIX these are `/dev/ttyACM*` and `/dev/ttyUSB*`; on Windows the
    /// enumerated COM ports. Order is whatever the OS reports.
    pub fn list_available_devices() -> Vec<String> {
        NativeBackend.list_devices()
    }
}

impl<B: Backend> SerialTransport<B> {
    /// Create a disconnected transport over `backend`.
    pub fn with_backend(backend: B, device_name: impl Into<String>) -> Self {
        Self {
            backend,
            device_name: device_name.into(),
            config: LineConfig::default(),
            link: None,
        }
    }

    /// Connect to `device`, or to the stored device name when `device` is
    /// `None` or empty.
    ///
    /// Any open link is closed first, even when reconnecting to the same
    /// device. With no name to use this is a silent no-op. Failures are
    /// logged and returned; the transport stays disconnected and keeps the
    /// previously stored name.
    pub fn connect(&mut self, device: Option<&str>) -> Result<()> {
        if self.is_connected() {
            self.disconnect();
        }

        let device = match device {
            Some(name) if !name.is_empty() => name.to_string(),
            _ if !self
                .device_name
                .is_empty() =>
            {
                self.device_name
                    .clone()
            },
            _ => {
                trace!("No serial device to connect to");
                return Ok(());
            },
        };

        let mut link = match self
            .backend
            .open(&device)
        {
            Ok(link) => link,
            Err(OpenError::Unavailable(e)) => {
                let reason = OpenFailure::from(&e);
                info!("Unable to open {device}: {reason}");
                return Err(Error::DeviceUnavailable { device, reason });
            },
            Err(OpenError::Configuration(source)) => {
                return Err(configuration_failed(device, source));
            },
        };

        if let Err(source) = link.configure(&self.config) {
            // Dropping the link closes it.
            return Err(configuration_failed(device, source));
        }

        debug!(
            "Connected to {device} at {} baud",
            self.config
                .baud_rate
        );
        self.device_name = device;
        self.link = Some(link);
        Ok(())
    }

    /// Close the connection. Does nothing when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(link) = self
            .link
            .take()
        {
            drop(link);
            debug!("Disconnected from {}", self.device_name);
        }
    }

    /// Read whatever is available, up to `buf.len()` bytes, without blocking.
    ///
    /// Returns `Ok(0)` when nothing is available yet. A zero-length read from
    /// the OS is checked against the device node: if the node is gone the
    /// result is [`Error::LinkLost`]. Any non-transient I/O error is reported
    /// as [`Error::LinkLost`] too.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(link) = self
            .link
            .as_mut()
        else {
            return Err(Error::NotConnected);
        };
        if buf.is_empty() {
            return Ok(0);
        }

        match link.read(buf) {
            Ok(0) => {
                if self
                    .backend
                    .is_present(&self.device_name)
                {
                    Ok(0)
                } else {
                    debug!("{} disappeared", self.device_name);
                    Err(Error::LinkLost {
                        device: self
                            .device_name
                            .clone(),
                        source: None,
                    })
                }
            },
            Ok(n) => {
                trace!("Read {n} bytes from {}", self.device_name);
                Ok(n)
            },
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => {
                debug!("Read from {} failed: {e}", self.device_name);
                Err(Error::LinkLost {
                    device: self
                        .device_name
                        .clone(),
                    source: Some(e),
                })
            },
        }
    }

    /// Write all of `buf`.
    ///
    /// Partial writes continue from where the previous one stopped and
    /// transient "would block" conditions are retried. Returns once every byte
    /// was accepted by the OS, or with [`Error::WriteFailed`] on the first
    /// non-transient error.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        let Some(link) = self
            .link
            .as_mut()
        else {
            return Err(Error::NotConnected);
        };

        let mut pos = 0;
        while pos < buf.len() {
            match link.write(&buf[pos..]) {
                Ok(0) => std::thread::yield_now(),
                Ok(n) => pos += n,
                Err(e) if is_transient(&e) => std::thread::yield_now(),
                Err(source) => {
                    debug!(
                        "Write to {} failed after {pos} of {} bytes: {source}",
                        self.device_name,
                        buf.len()
                    );
                    return Err(Error::WriteFailed {
                        device: self
                            .device_name
                            .clone(),
                        source,
                    });
                },
            }
        }

        trace!("Wrote {pos} bytes to {}", self.device_name);
        Ok(())
    }

    /// Whether a link is currently open.
    pub fn is_connected(&self) -> bool {
        self.link
            .is_some()
    }

    /// Candidate devices as seen by this transport's backend.
    pub fn available_devices(&self) -> Vec<String> {
        self.backend
            .list_devices()
    }

    /// Stored device name (empty when unset).
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Line discipline used on connect.
    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    /// Change the line discipline. Takes effect on the next connect.
    pub fn set_config(&mut self, config: LineConfig) {
        self.config = config;
    }
}

fn configuration_failed(device: String, source: io::Error) -> Error {
    info!("Unable to set serial port parameters for {device}: {source}");
    Error::Configuration { device, source }
}

impl<B: Backend> Drop for SerialTransport<B> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::port::fake::{FakeBackend, WriteStep},
        std::io,
    };

    fn transport(backend: &FakeBackend) -> SerialTransport<FakeBackend> {
        SerialTransport::with_backend(backend.clone(), "")
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        let mut t = transport(&backend);

        t.disconnect();
        assert!(!t.is_connected());

        t.connect(Some("ttyACM0"))
            .unwrap();
        t.disconnect();
        t.disconnect();
        assert!(!t.is_connected());
        assert_eq!(backend.open_links(), 0);
    }

    #[test]
    fn test_reconnect_releases_previous_link() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        backend.plug("ttyUSB1");
        let mut t = transport(&backend);

        t.connect(Some("ttyACM0"))
            .unwrap();
        t.connect(Some("ttyACM0"))
            .unwrap();
        t.connect(Some("ttyUSB1"))
            .unwrap();

        assert!(t.is_connected());
        assert_eq!(t.device_name(), "ttyUSB1");
        assert_eq!(backend.opens(), 3);
        assert_eq!(backend.open_links(), 1);
        assert_eq!(backend.peak_open_links(), 1);
    }

    #[test]
    fn test_failed_reconnect_still_releases_previous_link() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        let mut t = transport(&backend);

        t.connect(Some("ttyACM0"))
            .unwrap();
        assert!(
            t.connect(Some("ttyACM7"))
                .is_err()
        );
        assert!(!t.is_connected());
        assert_eq!(backend.open_links(), 0);
        assert_eq!(t.device_name(), "ttyACM0");
    }

    #[test]
    fn test_name_sticks_across_disconnect() {
        let backend = FakeBackend::new();
        backend.plug("A");
        let mut t = transport(&backend);

        t.connect(Some("A"))
            .unwrap();
        t.disconnect();
        t.connect(None)
            .unwrap();

        assert!(t.is_connected());
        assert_eq!(t.device_name(), "A");
        assert_eq!(backend.opens(), 2);
    }

    #[test]
    fn test_empty_name_reuses_stored_name() {
        let backend = FakeBackend::new();
        backend.plug("ttyUSB0");
        let mut t = SerialTransport::with_backend(backend.clone(), "ttyUSB0");

        t.connect(Some(""))
            .unwrap();
        assert!(t.is_connected());
    }

    #[test]
    fn test_connect_without_any_name_is_noop() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        let mut t = transport(&backend);

        assert!(
            t.connect(None)
                .is_ok()
        );
        assert!(!t.is_connected());
        assert_eq!(backend.opens(), 0);
        assert_eq!(backend.open_links(), 0);
    }

    #[test]
    fn test_read_without_data_returns_zero() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        let mut t = transport(&backend);
        t.connect(Some("ttyACM0"))
            .unwrap();

        for len in [1, 2, 64] {
            let mut buf = vec![0u8; len];
            assert_eq!(
                t.read(&mut buf)
                    .unwrap(),
                0
            );
        }
    }

    #[test]
    fn test_read_transient_error_returns_zero() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        let mut t = transport(&backend);
        t.connect(Some("ttyACM0"))
            .unwrap();

        backend.inject_read_error("ttyACM0", io::ErrorKind::WouldBlock);
        backend.inject_read_error("ttyACM0", io::ErrorKind::TimedOut);
        let mut buf = [0u8; 8];
        assert_eq!(
            t.read(&mut buf)
                .unwrap(),
            0
        );
        assert_eq!(
            t.read(&mut buf)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_read_returns_available_bytes() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        backend.push_input("ttyACM0", b"101\n");
        let mut t = transport(&backend);
        t.connect(Some("ttyACM0"))
            .unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(
            t.read(&mut buf)
                .unwrap(),
            2
        );
        assert_eq!(&buf, b"10");
        assert_eq!(
            t.read(&mut buf)
                .unwrap(),
            2
        );
        assert_eq!(&buf, b"1\n");
    }

    #[test]
    fn test_zero_read_with_missing_node_is_link_lost() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        let mut t = transport(&backend);
        t.connect(Some("ttyACM0"))
            .unwrap();

        backend.unplug("ttyACM0");
        let mut buf = [0u8; 1];
        let err = t
            .read(&mut buf)
            .unwrap_err();
        assert!(err.is_link_lost());

        // Loss is only a signal; the caller disconnects.
        assert!(t.is_connected());
    }

    #[test]
    fn test_hard_read_error_is_link_lost() {
        let backend = FakeBackend::new();
        backend.plug("ttyUSB0");
        let mut t = transport(&backend);
        t.connect(Some("ttyUSB0"))
            .unwrap();

        backend.inject_read_error("ttyUSB0", io::ErrorKind::BrokenPipe);
        let mut buf = [0u8; 1];
        assert!(matches!(
            t.read(&mut buf),
            Err(Error::LinkLost {
                source: Some(_),
                ..
            })
        ));
    }

    #[test]
    fn test_read_when_disconnected_is_not_connected() {
        let backend = FakeBackend::new();
        let mut t = transport(&backend);
        let mut buf = [0u8; 4];
        assert!(matches!(t.read(&mut buf), Err(Error::NotConnected)));
        assert!(matches!(t.write(b"x"), Err(Error::NotConnected)));
    }

    #[test]
    fn test_partial_writes_complete() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        let mut t = transport(&backend);
        t.connect(Some("ttyACM0"))
            .unwrap();

        backend.script_writes([
            WriteStep::Accept(3),
            WriteStep::WouldBlock,
            WriteStep::Accept(0),
            WriteStep::Accept(2),
            WriteStep::WouldBlock,
            WriteStep::WouldBlock,
            WriteStep::Accept(4),
        ]);

        let payload = b"calibrate:42\n";
        t.write(payload)
            .unwrap();
        assert_eq!(backend.written("ttyACM0"), payload.to_vec());
    }

    #[test]
    fn test_write_error_aborts() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        let mut t = transport(&backend);
        t.connect(Some("ttyACM0"))
            .unwrap();

        backend.script_writes([
            WriteStep::Accept(2),
            WriteStep::Fail(io::ErrorKind::BrokenPipe),
        ]);

        let err = t
            .write(b"hello")
            .unwrap_err();
        assert!(matches!(err, Error::WriteFailed { .. }));
        assert_eq!(backend.written("ttyACM0"), b"he".to_vec());
    }

    #[test]
    fn test_configuration_failure_releases_link() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        backend.fail_configure("ttyACM0");
        let mut t = transport(&backend);

        let err = t
            .connect(Some("ttyACM0"))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(!t.is_connected());
        assert_eq!(backend.opens(), 1);
        assert_eq!(backend.open_links(), 0);
    }

    #[test]
    fn test_terminal_setup_failure_is_configuration_error() {
        let backend = FakeBackend::new();
        backend.plug("ttyS9");
        backend.not_a_terminal("ttyS9");
        let mut t = transport(&backend);

        let err = t
            .connect(Some("ttyS9"))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { ref device, .. } if device == "ttyS9"));
        assert!(!t.is_connected());
        assert!(t.device_name().is_empty());
        assert_eq!(backend.open_links(), 0);
    }

    #[test]
    fn test_open_failure_reasons() {
        let backend = FakeBackend::new();
        backend.plug("busy");
        backend.fail_open("busy");
        let mut t = transport(&backend);

        let missing = t
            .connect(Some("missing"))
            .unwrap_err();
        assert!(matches!(
            missing,
            Error::DeviceUnavailable {
                reason: OpenFailure::NotFound,
                ..
            }
        ));

        let busy = t
            .connect(Some("busy"))
            .unwrap_err();
        assert!(matches!(
            busy,
            Error::DeviceUnavailable {
                reason: OpenFailure::Other(_),
                ..
            }
        ));
        assert!(!t.is_connected());
    }

    #[test]
    fn test_config_is_applied_on_connect() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        let mut t = transport(&backend);
        t.set_config(LineConfig::default().with_baud_rate(9600));
        t.connect(Some("ttyACM0"))
            .unwrap();

        let applied = backend
            .applied_config("ttyACM0")
            .unwrap();
        assert_eq!(applied.baud_rate, 9600);
        assert_eq!(t.config().baud_rate, 9600);
    }

    #[test]
    fn test_drop_releases_link() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        {
            let mut t = transport(&backend);
            t.connect(Some("ttyACM0"))
                .unwrap();
            assert_eq!(backend.open_links(), 1);
        }
        assert_eq!(backend.open_links(), 0);
    }

    #[test]
    fn test_unplug_and_recover_scenario() {
        let _ = env_logger::builder()
            .is_test(true)
            .try_init();

        let backend = FakeBackend::new();
        backend.plug("devX");
        backend.fail_open("devX");
        backend.plug("devY");
        let mut t = transport(&backend);

        assert!(!t.is_connected());
        t.connect(None)
            .unwrap();
        assert!(!t.is_connected());

        assert!(
            t.connect(Some("devX"))
                .is_err()
        );
        assert!(!t.is_connected());

        t.connect(Some("devY"))
            .unwrap();
        assert!(t.is_connected());

        backend.unplug("devY");
        let mut byte = [0u8; 1];
        assert!(
            t.read(&mut byte)
                .unwrap_err()
                .is_link_lost()
        );

        t.disconnect();
        assert!(!t.is_connected());
        assert_eq!(backend.open_links(), 0);
    }

    #[test]
    fn test_available_devices_uses_backend() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        backend.plug("ttyUSB1");
        let t = transport(&backend);
        assert_eq!(t.available_devices(), vec!["ttyACM0", "ttyUSB1"]);
    }
}
