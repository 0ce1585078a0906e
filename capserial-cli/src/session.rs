//! Poll loop shared by the `monitor` and `piano` commands.
//!
//! Each tick either tries to (re)connect, or drains complete lines from the
//! open link. Connection attempts are throttled so a missing device does not
//! flood the log at frame rate.

use capserial::{Backend, LineEvent, LineReader, SerialTransport};
use log::debug;
use std::time::{Duration, Instant};

/// Something the caller may want to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionEvent {
    /// Connected to the named device.
    Connected(String),
    /// The named device went away.
    Disconnected(String),
    /// One complete line.
    Line(String),
    /// Nothing happened this poll.
    Idle,
}

/// Connection state carried through the poll loop.
pub(crate) struct Session<B: Backend> {
    transport: SerialTransport<B>,
    reader: LineReader,
    /// Explicit device; when unset the first discovered device is used.
    pinned: Option<String>,
    period: Duration,
    reconnect_interval: Duration,
    last_attempt: Option<Instant>,
}

impl<B: Backend> Session<B> {
    pub(crate) fn new(
        transport: SerialTransport<B>,
        pinned: Option<String>,
        period: Duration,
        reconnect_interval: Duration,
    ) -> Self {
        Self {
            transport,
            reader: LineReader::new(),
            pinned,
            period,
            reconnect_interval,
            last_attempt: None,
        }
    }

    /// Device the session is pinned to, if any.
    pub(crate) fn pinned(&self) -> Option<&str> {
        self.pinned
            .as_deref()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.transport
            .is_connected()
    }

    /// Advance by one step.
    pub(crate) fn poll(&mut self) -> SessionEvent {
        if !self
            .transport
            .is_connected()
        {
            return self.try_connect();
        }

        match self
            .reader
            .poll(&mut self.transport)
        {
            Ok(LineEvent::Line(line)) => SessionEvent::Line(line),
            Ok(LineEvent::Pending) => SessionEvent::Idle,
            Ok(LineEvent::LinkLost) => {
                let device = self
                    .transport
                    .device_name()
                    .to_string();
                self.transport
                    .disconnect();
                // Let discovery run again right away.
                self.last_attempt = None;
                SessionEvent::Disconnected(device)
            },
            Err(e) => {
                debug!("Poll failed: {e}");
                SessionEvent::Idle
            },
        }
    }

    fn try_connect(&mut self) -> SessionEvent {
        let now = Instant::now();
        if self
            .last_attempt
            .is_some_and(|at| now.duration_since(at) < self.reconnect_interval)
        {
            return SessionEvent::Idle;
        }
        self.last_attempt = Some(now);

        let target = match &self.pinned {
            Some(device) => Some(device.clone()),
            None => self
                .transport
                .available_devices()
                .into_iter()
                .next(),
        };
        let Some(device) = target else {
            return SessionEvent::Idle;
        };

        // Failures were already logged by the transport.
        if self
            .transport
            .connect(Some(&device))
            .is_err()
        {
            return SessionEvent::Idle;
        }

        self.reader
            .clear();
        SessionEvent::Connected(device)
    }

    /// Poll until `handle` breaks, `stop` returns true or `deadline` passes.
    ///
    /// All complete lines available in a frame are handed over before
    /// sleeping.
    pub(crate) fn run<F, S>(&mut self, deadline: Option<Instant>, stop: S, mut handle: F)
    where
        F: FnMut(SessionEvent, &Self) -> std::ops::ControlFlow<()>,
        S: Fn() -> bool,
    {
        loop {
            if stop() || deadline.is_some_and(|d| Instant::now() >= d) {
                return;
            }

            loop {
                let event = self.poll();
                let more = matches!(event, SessionEvent::Line(_));
                if handle(event, &*self).is_break() {
                    return;
                }
                if !more {
                    break;
                }
            }

            std::thread::sleep(self.period);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capserial::port::fake::FakeBackend;
    use std::ops::ControlFlow;

    fn session(backend: &FakeBackend, pinned: Option<&str>) -> Session<FakeBackend> {
        Session::new(
            SerialTransport::with_backend(backend.clone(), ""),
            pinned.map(str::to_string),
            Duration::from_millis(1),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_connects_to_first_discovered_device() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        backend.plug("ttyUSB1");
        let mut s = session(&backend, None);

        assert_eq!(s.poll(), SessionEvent::Connected("ttyACM0".to_string()));
        assert!(s.is_connected());
    }

    #[test]
    fn test_pinned_device_wins() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        backend.plug("ttyUSB1");
        let mut s = session(&backend, Some("ttyUSB1"));

        assert_eq!(s.poll(), SessionEvent::Connected("ttyUSB1".to_string()));
    }

    #[test]
    fn test_reconnect_attempts_are_throttled() {
        let backend = FakeBackend::new();
        let mut s = session(&backend, Some("ttyACM0"));

        assert_eq!(s.poll(), SessionEvent::Idle);
        backend.plug("ttyACM0");
        // Within the reconnect interval, no new attempt is made.
        assert_eq!(s.poll(), SessionEvent::Idle);
        assert_eq!(backend.opens(), 0);
    }

    #[test]
    fn test_unplug_disconnects_and_rediscovers() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        let mut s = session(&backend, None);
        assert!(matches!(s.poll(), SessionEvent::Connected(_)));

        backend.push_input("ttyACM0", b"111111111111\n");
        assert_eq!(s.poll(), SessionEvent::Line("111111111111".to_string()));

        backend.unplug("ttyACM0");
        assert_eq!(s.poll(), SessionEvent::Disconnected("ttyACM0".to_string()));
        assert!(!s.is_connected());
        assert_eq!(backend.open_links(), 0);

        backend.plug("ttyACM1");
        assert_eq!(s.poll(), SessionEvent::Connected("ttyACM1".to_string()));
    }

    #[test]
    fn test_run_drains_lines_and_stops_on_break() {
        let backend = FakeBackend::new();
        backend.plug("ttyACM0");
        backend.push_input("ttyACM0", b"a\nb\nc\n");
        let mut s = session(&backend, None);

        let mut lines = Vec::new();
        s.run(None, || false, |event, _| {
            if let SessionEvent::Line(line) = event {
                lines.push(line);
                if lines.len() == 3 {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        });

        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_run_honors_deadline() {
        let backend = FakeBackend::new();
        let mut s = session(&backend, None);
        let mut polls = 0;
        s.run(Some(Instant::now()), || false, |_, _| {
            polls += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(polls, 0);
    }
}
