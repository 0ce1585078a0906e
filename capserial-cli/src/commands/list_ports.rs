//! `list-ports` command.

use anyhow::{Context, Result};
use capserial::NativeTransport;
use console::style;

/// List candidate devices, as JSON on stdout or as a styled list on stderr.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let devices = NativeTransport::list_available_devices();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&devices).context("failed to encode device list")?
        );
        return Ok(());
    }

    eprintln!("{}", style("Serial devices").bold().underlined());

    if devices.is_empty() {
        eprintln!("  {}", style("No serial devices found").dim());
        return Ok(());
    }

    for device in &devices {
        eprintln!("  {} {}", style("•").green(), style(device).cyan());
    }

    // The poll loop picks the first entry when no device is pinned.
    eprintln!(
        "\n{} default: {}",
        style("→").green().bold(),
        style(&devices[0]).cyan().bold()
    );

    Ok(())
}
