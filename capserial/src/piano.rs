//! Key edge detection for the banana piano board.
//!
//! The board prints one character per key on every line: `'1'` while the key
//! is open and `'0'` while it is touched. A note triggers on the `1 -> 0`
//! edge. [`KeyboardState`] carries the last reading per key between lines.

/// Note names, one per key, in the order the board reports them.
pub const NOTES: [&str; 12] = [
    "g#", "a", "bb", "b", "c", "c#", "d", "eb", "e", "f", "f#", "g",
];

/// What a connection indicator should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// No serial connection.
    Disconnected,
    /// Connected, but the last line was not a keyboard reading.
    NoData,
    /// Connected and receiving keyboard readings.
    Receiving,
}

/// Last reading per key, plus whether the latest line was well-formed.
#[derive(Debug, Clone)]
pub struct KeyboardState {
    last: [u8; NOTES.len()],
    valid: bool,
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardState {
    /// All keys released, no data yet.
    pub fn new() -> Self {
        Self {
            last: [b'1'; NOTES.len()],
            valid: false,
        }
    }

    /// Feed one line. Returns the indices into [`NOTES`] that were just
    /// pressed.
    ///
    /// A line of the wrong length marks the state invalid and leaves the key
    /// history untouched.
    pub fn update(&mut self, line: &str) -> Vec<usize> {
        let bytes = line.as_bytes();
        if bytes.len() != NOTES.len() {
            self.valid = false;
            return Vec::new();
        }

        self.valid = true;
        let mut pressed = Vec::new();
        for (i, (&now, last)) in bytes
            .iter()
            .zip(self.last.iter_mut())
            .enumerate()
        {
            if now == b'0' && *last == b'1' {
                pressed.push(i);
            }
            *last = now;
        }
        pressed
    }

    /// Whether the latest line was a well-formed reading.
    pub fn has_valid_data(&self) -> bool {
        self.valid
    }

    /// Indicator state for the given connection state.
    pub fn indicator(&self, connected: bool) -> Indicator {
        match (connected, self.valid) {
            (false, _) => Indicator::Disconnected,
            (true, false) => Indicator::NoData,
            (true, true) => Indicator::Receiving,
        }
    }
}
