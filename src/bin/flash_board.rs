//! esptool-based firmware flashing CLI.
//!
//! Usage:
//!   flash-board list-firmware
//!   flash-board flash --port /dev/ttyUSB0 --firmware lolin_s2_mini_v0.0.1
//!   flash-board flash                       # auto port + recommended firmware
//!   flash-board erase --port /dev/ttyUSB0
//!   flash-board                             # interactive mode

use anyhow::{Context, Result, bail};
use boardflash::catalog::FirmwareIndex;
use boardflash::exec::{self, CommandSpec};
use boardflash::flash::{self, BOOTLOADER_INSTRUCTIONS, ResetOptions};
use boardflash::ports;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flash-board")]
#[command(about = "Flash published firmware onto an ESP32-S2 board via esptool")]
struct Cli {
    /// Firmware storage directory (defaults to auto-discovery)
    #[arg(long, value_name = "DIR", global = true)]
    firmware_root: Option<PathBuf>,

    /// Print the external commands being run
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List firmware versions in the catalog
    ListFirmware,

    /// List available serial ports
    ListPorts,

    /// Erase the entire flash memory
    Erase {
        /// Serial port (e.g., /dev/ttyUSB0, COM3)
        #[arg(short, long)]
        port: String,

        /// Baudrate for the operation
        #[arg(short, long, default_value_t = flash::DEFAULT_BAUD)]
        baud: u32,

        /// Reset the board before talking to it
        #[arg(long)]
        reset_before: bool,

        /// Leave the board unreset afterwards
        #[arg(long)]
        no_reset_after: bool,
    },

    /// Flash a catalog firmware onto the board
    Flash {
        /// Serial port; defaults to the first detected port
        #[arg(short, long)]
        port: Option<String>,

        /// Firmware id; defaults to the recommended entry
        #[arg(short, long)]
        firmware: Option<String>,

        /// Baudrate for flashing
        #[arg(short, long, default_value_t = flash::DEFAULT_BAUD)]
        baud: u32,

        /// Reset the board before talking to it
        #[arg(long)]
        reset_before: bool,

        /// Leave the board unreset afterwards
        #[arg(long)]
        no_reset_after: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Some(Commands::ListFirmware) => list_firmware(&cli),
        Some(Commands::ListPorts) => list_ports(),
        Some(Commands::Erase {
            port,
            baud,
            reset_before,
            no_reset_after,
        }) => erase(&cli, port, *baud, *reset_before, *no_reset_after),
        Some(Commands::Flash {
            port,
            firmware,
            baud,
            reset_before,
            no_reset_after,
            yes,
        }) => auto_flash(
            &cli,
            port.as_deref(),
            firmware.as_deref(),
            *baud,
            *reset_before,
            *no_reset_after,
            *yes,
        ),
        None => interactive(&cli),
    }
}

fn firmware_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.firmware_root {
        Some(root) => Ok(root.clone()),
        None => boardflash::find_firmware_root(),
    }
}

fn trace(cli: &Cli, spec: &CommandSpec) {
    if cli.verbose {
        eprintln!("running: {}", spec.rendered());
    }
}

fn list_firmware(cli: &Cli) -> Result<()> {
    let root = firmware_root(cli)?;
    let index = FirmwareIndex::load(&root)?;
    if index.entries().is_empty() {
        println!("No firmware versions published.");
        return Ok(());
    }
    println!("Available firmware versions:");
    for (pos, entry) in index.entries().iter().enumerate() {
        let marker = if entry.recommended {
            " (recommended)"
        } else {
            ""
        };
        println!(
            "  {}. {} - {}{} [{}]",
            pos + 1,
            entry.version,
            entry.board,
            marker,
            entry.id
        );
    }
    Ok(())
}

fn list_ports() -> Result<()> {
    let ports = ports::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found. Connect the board and try again.");
        return Ok(());
    }
    println!("Available serial ports:");
    for port in ports {
        println!("  {}", port.label());
    }
    Ok(())
}

fn erase(cli: &Cli, port: &str, baud: u32, reset_before: bool, no_reset_after: bool) -> Result<()> {
    let esptool = flash::resolve_esptool()?;
    let reset = ResetOptions {
        before: reset_before,
        after: !no_reset_after,
    };
    let spec = flash::erase_plan(&esptool, port, baud, reset);
    trace(cli, &spec);
    println!("Erasing flash on {port} at {baud} baud...");
    exec::run_checked(&spec)?;
    println!("Flash memory erased.");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn auto_flash(
    cli: &Cli,
    port: Option<&str>,
    firmware: Option<&str>,
    baud: u32,
    reset_before: bool,
    no_reset_after: bool,
    yes: bool,
) -> Result<()> {
    let root = firmware_root(cli)?;
    let index = FirmwareIndex::load(&root)?;

    let id = match firmware {
        Some(id) => id.to_string(),
        None => {
            let entry = index.select_default()?;
            println!("Auto-selected firmware: {} ({})", entry.version, entry.id);
            entry.id.clone()
        }
    };
    let files = index.resolve_files(&id)?;

    let port = match port {
        Some(port) => port.to_string(),
        None => {
            let ports = ports::list_ports()?;
            let Some(first) = ports.first() else {
                bail!("no serial ports found; connect the board and try again");
            };
            println!("Auto-selected port: {}", first.name);
            first.name.clone()
        }
    };

    let esptool = flash::resolve_esptool()?;
    if !flash::detect_board(&esptool, &port)? {
        eprintln!("Board not detected in bootloader mode on {port}.");
        eprintln!("{BOOTLOADER_INSTRUCTIONS}");
        bail!("board not in bootloader mode");
    }

    if let Some(entry) = index.get(&id) {
        println!("Flashing {} ({}) to {port} at {baud} baud", entry.version, entry.board);
    }
    if !yes && !confirm("Proceed with flashing? [y/N]: ")? {
        println!("Flashing cancelled.");
        return Ok(());
    }

    let reset = ResetOptions {
        before: reset_before,
        after: !no_reset_after,
    };
    write_firmware(cli, &esptool, &port, baud, reset, &files)
}

fn write_firmware(
    cli: &Cli,
    esptool: &std::path::Path,
    port: &str,
    baud: u32,
    reset: ResetOptions,
    files: &std::collections::BTreeMap<boardflash::ArtifactRole, PathBuf>,
) -> Result<()> {
    for (role, path) in files {
        println!("  {} -> {} ({})", role, role.flash_address(), path.display());
    }
    let spec = flash::write_plan(esptool, port, baud, reset, files);
    trace(cli, &spec);
    exec::run_checked(&spec)?;
    println!("Firmware flashed successfully. Power-cycle the board to boot it.");
    Ok(())
}

fn interactive(cli: &Cli) -> Result<()> {
    println!("Interactive flashing mode");
    println!("{}", "=".repeat(40));

    let root = firmware_root(cli)?;
    let index = FirmwareIndex::load(&root)?;
    if index.entries().is_empty() {
        bail!("firmware catalog contains no entries; publish a build first");
    }
    let esptool = flash::resolve_esptool()?;

    let ports = ports::list_ports()?;
    if ports.is_empty() {
        bail!("no serial ports found; connect the board and try again");
    }
    let port = if ports.len() == 1 {
        println!("Using only available port: {}", ports[0].name);
        ports[0].name.clone()
    } else {
        let labels: Vec<String> = ports.iter().map(|port| port.label()).collect();
        match select_from_menu("Select port", &labels)? {
            Some(choice) => ports[choice].name.clone(),
            None => {
                println!("Cancelled.");
                return Ok(());
            }
        }
    };

    while !flash::detect_board(&esptool, &port)? {
        eprintln!("Board not detected in bootloader mode on {port}.");
        println!("{BOOTLOADER_INSTRUCTIONS}");
        match prompt_line("\nPut the board in bootloader mode and press Enter to retry (or 'q' to quit): ")? {
            Some(answer) if answer.eq_ignore_ascii_case("q") => {
                println!("Cancelled.");
                return Ok(());
            }
            Some(_) => continue,
            None => return Ok(()),
        }
    }

    let labels: Vec<String> = index
        .entries()
        .iter()
        .map(|entry| {
            let marker = if entry.recommended {
                " (recommended)"
            } else {
                ""
            };
            format!("{} - {}{}", entry.version, entry.board, marker)
        })
        .collect();
    let Some(choice) = select_from_menu("Select firmware", &labels)? else {
        println!("Cancelled.");
        return Ok(());
    };
    let entry = &index.entries()[choice];
    let files = index.resolve_files(&entry.id)?;
    let baud = entry.baudrate.unwrap_or(flash::DEFAULT_BAUD);

    println!("\nReady to flash:");
    println!("  Board:    {}", entry.board);
    println!("  Version:  {}", entry.version);
    println!("  Port:     {port}");
    println!("  Baudrate: {baud}");
    if !confirm("\nProceed with flashing? [y/N]: ")? {
        println!("Flashing cancelled.");
        return Ok(());
    }

    write_firmware(cli, &esptool, &port, baud, ResetOptions::default(), &files)
}

fn prompt_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush().context("flushing stdout")?;
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading stdin")?;
    if read == 0 {
        // EOF: treat as cancel.
        println!();
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Parse a 1-based menu answer into a 0-based index.
fn parse_menu_choice(input: &str, len: usize) -> Option<usize> {
    let choice: usize = input.trim().parse().ok()?;
    if (1..=len).contains(&choice) {
        Some(choice - 1)
    } else {
        None
    }
}

fn select_from_menu(label: &str, items: &[String]) -> Result<Option<usize>> {
    loop {
        println!("\n{label}:");
        for (pos, item) in items.iter().enumerate() {
            println!("  {}. {item}", pos + 1);
        }
        let Some(answer) = prompt_line(&format!("{label} (1-{}, or 'q' to quit): ", items.len()))?
        else {
            return Ok(None);
        };
        if answer.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match parse_menu_choice(&answer, items.len()) {
            Some(choice) => return Ok(Some(choice)),
            None => println!(
                "Invalid selection. Enter a number between 1 and {}.",
                items.len()
            ),
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(matches!(prompt_line(prompt)?, Some(answer) if answer.eq_ignore_ascii_case("y")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_choice_accepts_in_range_numbers() {
        assert_eq!(parse_menu_choice("1", 3), Some(0));
        assert_eq!(parse_menu_choice(" 3 ", 3), Some(2));
    }

    #[test]
    fn menu_choice_rejects_out_of_range_and_garbage() {
        assert_eq!(parse_menu_choice("0", 3), None);
        assert_eq!(parse_menu_choice("4", 3), None);
        assert_eq!(parse_menu_choice("x", 3), None);
        assert_eq!(parse_menu_choice("", 3), None);
        assert_eq!(parse_menu_choice("1", 0), None);
    }
}
