//! capserial CLI - Command-line monitor for capacitive sensor boards.
//!
//! ## Features
//!
//! - List candidate serial devices
//! - Monitor sensor lines with automatic discovery and reconnection
//! - Piano mode: print notes as keys are touched
//! - Shell completion generation
//! - Configuration file and environment variable support

use anyhow::{Context, Result};
use capserial::{NativeBackend, NativeTransport};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use env_logger::Env;
use log::{debug, warn};
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

mod commands;
mod config;
mod session;

use config::Config;
use session::Session;

/// Set by the Ctrl-C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Whether Ctrl-C was pressed.
pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// capserial - Read capacitive sensor boards over a serial port.
///
/// Environment variables:
///   CAPSERIAL_PORT    - Serial device to use
///   CAPSERIAL_BAUD    - Baud rate (default: 115200)
///   CAPSERIAL_RATE    - Polls per second (default: 25)
#[derive(Parser)]
#[command(name = "capserial")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Serial device to use (first discovered device if not specified).
    #[arg(short, long, global = true, env = "CAPSERIAL_PORT")]
    port: Option<String>,

    /// Baud rate (default: 115200).
    #[arg(short, long, global = true, env = "CAPSERIAL_BAUD")]
    baud: Option<u32>,

    /// Polls per second (default: 25).
    #[arg(short, long, global = true, env = "CAPSERIAL_RATE")]
    rate: Option<u32>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// List candidate serial devices.
    ListPorts {
        /// Output device list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Print sensor lines, reconnecting when the device is unplugged.
    Monitor {
        /// Exit after this many lines.
        #[arg(long, value_name = "N")]
        max_lines: Option<usize>,

        /// Exit after this many seconds.
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,

        /// Prefix each line with the time since start.
        #[arg(long)]
        timestamp: bool,
    },

    /// Print a note name whenever a piano key is touched.
    Piano {
        /// Exit after this many seconds.
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if env::var("NO_COLOR").is_ok() || !console::Term::stderr().is_term() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "capserial v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::ListPorts { json } => {
            commands::list_ports::cmd_list_ports(*json)?;
        },
        Commands::Monitor {
            max_lines,
            duration,
            timestamp,
        } => {
            install_interrupt_handler();
            let mut session = open_session(&cli, &config);
            commands::monitor::cmd_monitor(
                &mut session,
                deadline(*duration),
                *max_lines,
                *timestamp,
                cli.quiet,
            )?;
        },
        Commands::Piano { duration } => {
            install_interrupt_handler();
            let mut session = open_session(&cli, &config);
            commands::piano::cmd_piano(&mut session, deadline(*duration), cli.quiet)?;
        },
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
        },
    }

    Ok(())
}

/// Build the poll session from CLI flags and configuration.
fn open_session(cli: &Cli, config: &Config) -> Session<NativeBackend> {
    let mut transport = NativeTransport::new(String::new());
    transport.set_config(config.line_config(cli.baud));

    let pinned = cli
        .port
        .clone()
        .or_else(|| {
            config
                .connection
                .device
                .clone()
        });
    if let Some(ref device) = pinned {
        debug!("Using device {device}");
    }

    Session::new(
        transport,
        pinned,
        config.poll_period(cli.rate),
        config.reconnect_interval(),
    )
}

fn deadline(duration: Option<u64>) -> Option<Instant> {
    duration.map(|secs| Instant::now() + Duration::from_secs(secs))
}

fn install_interrupt_handler() {
    if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::Relaxed))
        .context("failed to install Ctrl-C handler")
    {
        warn!("{e:#}");
    }
}
