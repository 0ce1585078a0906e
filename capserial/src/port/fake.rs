//! In-memory backend with fault injection.
//!
//! [`FakeBackend`] simulates a device directory: devices can be plugged in,
//! unplugged, made to fail on open, on terminal setup or on configuration,
//! fed with inbound bytes and given a scripted write sink. Every clone shares
//! the same state, so a test keeps one handle while the transport owns
//! another.
//!
//! ```rust
//! use capserial::{SerialTransport, port::fake::FakeBackend};
//!
//! let backend = FakeBackend::new();
//! backend.plug("ttyACM0");
//! backend.push_input("ttyACM0", b"0101\n");
//!
//! let mut transport = SerialTransport::with_backend(backend.clone(), "");
//! transport.connect(Some("ttyACM0")).unwrap();
//!
//! let mut buf = [0u8; 16];
//! assert_eq!(transport.read(&mut buf).unwrap(), 5);
//! ```

use {
    crate::port::{Backend, LineConfig, Link, OpenError},
    std::{
        collections::{HashMap, HashSet, VecDeque},
        io::{self, Read, Write},
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    },
};

/// One scripted response of the simulated write sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    /// Accept at most this many bytes.
    Accept(usize),
    /// Report that the output buffer is full.
    WouldBlock,
    /// Fail with the given error kind.
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
struct State {
    /// Device directory, in enumeration order.
    devices: Vec<String>,
    fail_open: HashSet<String>,
    fail_configure: HashSet<String>,
    not_a_terminal: HashSet<String>,
    input: HashMap<String, VecDeque<u8>>,
    read_faults: HashMap<String, VecDeque<io::ErrorKind>>,
    write_script: VecDeque<WriteStep>,
    written: HashMap<String, Vec<u8>>,
    applied: HashMap<String, LineConfig>,
    open_links: usize,
    peak_open_links: usize,
    opens: usize,
}

/// Simulated OS layer. Cloning shares state.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

impl FakeBackend {
    /// Create an empty simulated device directory.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Add a device node at the end of the directory.
    pub fn plug(&self, device: &str) {
        let mut state = self.state();
        if !state
            .devices
            .iter()
            .any(|d| d == device)
        {
            state
                .devices
                .push(device.to_string());
        }
    }

    /// Remove a device node. Open links stay open but reads see end-of-file.
    pub fn unplug(&self, device: &str) {
        self.state()
            .devices
            .retain(|d| d != device);
    }

    /// Make every open of `device` fail with a generic error.
    pub fn fail_open(&self, device: &str) {
        self.state()
            .fail_open
            .insert(device.to_string());
    }

    /// Make applying the line discipline on `device` fail.
    pub fn fail_configure(&self, device: &str) {
        self.state()
            .fail_configure
            .insert(device.to_string());
    }

    /// Make `device` open but reject the initial terminal setup, like a node
    /// that is not a tty.
    pub fn not_a_terminal(&self, device: &str) {
        self.state()
            .not_a_terminal
            .insert(device.to_string());
    }

    /// Queue inbound bytes on `device`.
    pub fn push_input(&self, device: &str, bytes: &[u8]) {
        self.state()
            .input
            .entry(device.to_string())
            .or_default()
            .extend(bytes);
    }

    /// Make the next read on `device` fail with `kind`.
    pub fn inject_read_error(&self, device: &str, kind: io::ErrorKind) {
        self.state()
            .read_faults
            .entry(device.to_string())
            .or_default()
            .push_back(kind);
    }

    /// Script the write sink. Once the script runs out every write is
    /// accepted in full.
    pub fn script_writes(&self, steps: impl IntoIterator<Item = WriteStep>) {
        self.state()
            .write_script
            .extend(steps);
    }

    /// Bytes accepted by the write sink of `device`.
    pub fn written(&self, device: &str) -> Vec<u8> {
        self.state()
            .written
            .get(device)
            .cloned()
            .unwrap_or_default()
    }

    /// Line discipline last applied to `device`.
    pub fn applied_config(&self, device: &str) -> Option<LineConfig> {
        self.state()
            .applied
            .get(device)
            .copied()
    }

    /// Number of links currently open.
    pub fn open_links(&self) -> usize {
        self.state().open_links
    }

    /// Highest number of links that were open at the same time.
    pub fn peak_open_links(&self) -> usize {
        self.state().peak_open_links
    }

    /// Number of successful opens so far.
    pub fn opens(&self) -> usize {
        self.state().opens
    }
}

impl Backend for FakeBackend {
    type Link = FakeLink;

    fn open(&self, device: &str) -> Result<FakeLink, OpenError> {
        let mut state = self.state();
        if !state
            .devices
            .iter()
            .any(|d| d == device)
        {
            return Err(io::Error::from(io::ErrorKind::NotFound).into());
        }
        if state
            .fail_open
            .contains(device)
        {
            return Err(io::Error::other("device busy").into());
        }
        if state
            .not_a_terminal
            .contains(device)
        {
            return Err(OpenError::Configuration(io::Error::other(
                "Not a typewriter",
            )));
        }

        state.opens += 1;
        state.open_links += 1;
        state.peak_open_links = state
            .peak_open_links
            .max(state.open_links);

        Ok(FakeLink {
            device: device.to_string(),
            state: Arc::clone(&self.state),
        })
    }

    fn is_present(&self, device: &str) -> bool {
        self.state()
            .devices
            .iter()
            .any(|d| d == device)
    }

    fn list_devices(&self) -> Vec<String> {
        self.state()
            .devices
            .clone()
    }
}

/// Link opened by [`FakeBackend`].
#[derive(Debug)]
pub struct FakeLink {
    device: String,
    state: Arc<Mutex<State>>,
}

impl Link for FakeLink {
    fn configure(&mut self, config: &LineConfig) -> io::Result<()> {
        let mut state = lock(&self.state);
        if state
            .fail_configure
            .contains(&self.device)
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported line discipline",
            ));
        }
        state
            .applied
            .insert(self.device.clone(), *config);
        Ok(())
    }
}

impl Read for FakeLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = lock(&self.state);
        if let Some(kind) = state
            .read_faults
            .get_mut(&self.device)
            .and_then(VecDeque::pop_front)
        {
            return Err(kind.into());
        }

        // Like a non-blocking tty, an empty queue reads as zero bytes.
        let Some(queue) = state
            .input
            .get_mut(&self.device)
        else {
            return Ok(0);
        };
        let n = buf
            .len()
            .min(queue.len());
        for (slot, byte) in buf
            .iter_mut()
            .zip(queue.drain(..n))
        {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for FakeLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = lock(&self.state);
        let n = match state
            .write_script
            .pop_front()
        {
            Some(WriteStep::Accept(limit)) => buf
                .len()
                .min(limit),
            Some(WriteStep::WouldBlock) => return Err(io::ErrorKind::WouldBlock.into()),
            Some(WriteStep::Fail(kind)) => return Err(kind.into()),
            None => buf.len(),
        };
        state
            .written
            .entry(self.device.clone())
            .or_default()
            .extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FakeLink {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.open_links = state
            .open_links
            .saturating_sub(1);
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}
