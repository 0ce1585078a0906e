//! Serial monitor command implementation.
//!
//! Prints every sensor line to stdout. Connection status goes to stderr so the
//! data stream can be piped.

use anyhow::Result;
use capserial::Backend;
use console::style;
use std::io::{self, Write as _};
use std::ops::ControlFlow;
use std::time::Instant;

use crate::session::{Session, SessionEvent};
use crate::was_interrupted;

/// Run the monitor until Ctrl-C, the deadline or `max_lines`.
pub(crate) fn cmd_monitor<B: Backend>(
    session: &mut Session<B>,
    deadline: Option<Instant>,
    max_lines: Option<usize>,
    timestamp: bool,
    quiet: bool,
) -> Result<()> {
    let started = Instant::now();
    let mut seen = 0usize;
    let mut stdout = io::stdout().lock();

    if !quiet {
        print_waiting(session.pinned());
    }

    let mut result = Ok(());
    session.run(deadline, was_interrupted, |event, s| {
        match event {
            SessionEvent::Line(line) => {
                let written = if timestamp {
                    writeln!(
                        stdout,
                        "[{:>9.3}] {line}",
                        started
                            .elapsed()
                            .as_secs_f64()
                    )
                } else {
                    writeln!(stdout, "{line}")
                };
                if let Err(e) = written.and_then(|()| stdout.flush()) {
                    // Closed pipe: stop quietly.
                    result = if e.kind() == io::ErrorKind::BrokenPipe {
                        Ok(())
                    } else {
                        Err(e.into())
                    };
                    return ControlFlow::Break(());
                }

                seen += 1;
                if max_lines.is_some_and(|max| seen >= max) {
                    return ControlFlow::Break(());
                }
            },
            SessionEvent::Connected(device) if !quiet => print_connected(&device),
            SessionEvent::Disconnected(device) if !quiet => {
                print_disconnected(&device);
                print_waiting(s.pinned());
            },
            _ => {},
        }
        ControlFlow::Continue(())
    });

    result
}

pub(crate) fn print_waiting(pinned: Option<&str>) {
    match pinned {
        Some(device) => eprintln!(
            "{} Waiting for {}...",
            style("…").dim(),
            style(device).cyan()
        ),
        None => eprintln!("{} Waiting for a serial device...", style("…").dim()),
    }
}

pub(crate) fn print_connected(device: &str) {
    eprintln!(
        "{} Connected to {}",
        style("📡").cyan(),
        style(device).green()
    );
}

pub(crate) fn print_disconnected(device: &str) {
    eprintln!(
        "{} {} disconnected",
        style("✗").red().bold(),
        style(device).yellow()
    );
}
