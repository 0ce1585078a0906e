//! Piano mode: print a note name each time a key is touched.

use anyhow::Result;
use capserial::{Backend, Indicator, KeyboardState, NOTES};
use console::style;
use log::trace;
use std::io::{self, Write as _};
use std::ops::ControlFlow;
use std::time::Instant;

use super::monitor::{print_connected, print_disconnected, print_waiting};
use crate::session::{Session, SessionEvent};
use crate::was_interrupted;

/// Run piano mode until Ctrl-C or the deadline.
pub(crate) fn cmd_piano<B: Backend>(
    session: &mut Session<B>,
    deadline: Option<Instant>,
    quiet: bool,
) -> Result<()> {
    let mut keys = KeyboardState::new();
    let mut shown = Indicator::Disconnected;
    let mut stdout = io::stdout().lock();

    if !quiet {
        print_waiting(session.pinned());
    }

    let mut result = Ok(());
    session.run(deadline, was_interrupted, |event, s| {
        match event {
            SessionEvent::Line(line) => {
                let pressed = keys.update(&line);
                if !keys.has_valid_data() {
                    trace!("Ignoring line {line:?}");
                }
                for i in pressed {
                    if let Err(e) = writeln!(stdout, "{}", NOTES[i]).and_then(|()| stdout.flush())
                    {
                        result = if e.kind() == io::ErrorKind::BrokenPipe {
                            Ok(())
                        } else {
                            Err(e.into())
                        };
                        return ControlFlow::Break(());
                    }
                }
            },
            SessionEvent::Connected(device) if !quiet => print_connected(&device),
            SessionEvent::Disconnected(device) => {
                // Stale key history would fire notes on reconnect.
                keys = KeyboardState::new();
                if !quiet {
                    print_disconnected(&device);
                    print_waiting(s.pinned());
                }
            },
            _ => {},
        }

        let now = keys.indicator(s.is_connected());
        if now != shown {
            if !quiet {
                print_indicator(now);
            }
            shown = now;
        }
        ControlFlow::Continue(())
    });

    result
}

fn print_indicator(indicator: Indicator) {
    match indicator {
        Indicator::Disconnected => eprintln!("{} no connection", style("○").red()),
        Indicator::NoData => eprintln!("{} connected, no keyboard data", style("◐").yellow()),
        Indicator::Receiving => eprintln!("{} receiving", style("●").green()),
    }
}
