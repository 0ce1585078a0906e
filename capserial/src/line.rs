//! Newline-framed reading on top of a [`SerialTransport`].
//!
//! Sensor boards print one reading per line. [`LineReader`] pulls one byte at
//! a time until a `\n` arrives or the transport has nothing more, so it can be
//! polled once per frame without blocking. Partial lines are kept across
//! polls.

use {
    crate::{
        error::{Error, Result},
        port::Backend,
        transport::SerialTransport,
    },
    log::warn,
};

/// Outcome of one [`LineReader::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete, non-empty line without its terminator.
    Line(String),
    /// No complete line yet.
    Pending,
    /// The device went away. Buffered partial data was discarded.
    LinkLost,
}

/// Reassembles `\n`-terminated lines from a byte stream.
#[derive(Debug, Clone)]
pub struct LineReader {
    buffer: Vec<u8>,
    max_len: usize,
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LineReader {
    /// Longest line kept before the buffer is dropped as garbage.
    pub const DEFAULT_MAX_LEN: usize = 4096;

    /// Create a reader with [`Self::DEFAULT_MAX_LEN`].
    pub fn new() -> Self {
        Self::with_max_len(Self::DEFAULT_MAX_LEN)
    }

    /// Create a reader that discards lines longer than `max_len` bytes.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_len,
        }
    }

    /// Bytes of the current incomplete line.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop any partial line.
    pub fn clear(&mut self) {
        self.buffer
            .clear();
    }

    /// Read until a line completes or no data is available.
    ///
    /// A NUL byte ends the poll without being stored. Empty lines are skipped
    /// and a trailing `\r` is stripped. Errors other than link loss (for
    /// example [`Error::NotConnected`]) are returned as-is.
    pub fn poll<B: Backend>(&mut self, transport: &mut SerialTransport<B>) -> Result<LineEvent> {
        let mut byte = [0u8; 1];

        loop {
            match transport.read(&mut byte) {
                Ok(0) => return Ok(LineEvent::Pending),
                Ok(_) => {},
                Err(Error::LinkLost { .. }) => {
                    self.clear();
                    return Ok(LineEvent::LinkLost);
                },
                Err(e) => return Err(e),
            }

            match byte[0] {
                b'\n' => {
                    if let Some(line) = self.take_line() {
                        return Ok(LineEvent::Line(line));
                    }
                },
                b'\0' => return Ok(LineEvent::Pending),
                other => self.push(other),
            }
        }
    }

    fn push(&mut self, byte: u8) {
        if self.buffer.len() >= self.max_len {
            warn!(
                "Discarding {} bytes without a line terminator",
                self.buffer
                    .len()
            );
            self.clear();
        }
        self.buffer
            .push(byte);
    }

    fn take_line(&mut self) -> Option<String> {
        if self.buffer.last() == Some(&b'\r') {
            self.buffer
                .pop();
        }
        if self.buffer.is_empty() {
            return None;
        }

        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.clear();
        Some(line)
    }
}
