//! PlatformIO build/upload CLI with catalog publishing.
//!
//! Usage:
//!   flash-pio build --environment lolin_s2_mini
//!   flash-pio upload --port /dev/ttyUSB0
//!   flash-pio publish --version 0.0.2
//!   flash-pio envs
//!   flash-pio monitor --port /dev/ttyUSB0
//!   flash-pio                               # interactive mode

use anyhow::{Context, Result, bail};
use boardflash::exec::{self, CommandSpec};
use boardflash::flash::DEFAULT_BAUD;
use boardflash::pio;
use boardflash::ports;
use boardflash::publish::{PublishOptions, publish_artifacts};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "flash-pio")]
#[command(about = "Build, upload, and publish ESP32-S2 firmware via PlatformIO")]
struct Cli {
    /// PlatformIO project directory
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    project: PathBuf,

    /// Print the external commands being run
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the firmware
    Build {
        /// PlatformIO environment; defaults to all environments
        #[arg(short, long)]
        environment: Option<String>,

        /// Clean before building
        #[arg(short, long)]
        clean: bool,
    },

    /// Build and upload over serial
    Upload {
        /// Upload port; defaults to the first detected port
        #[arg(short, long)]
        port: Option<String>,

        /// PlatformIO environment
        #[arg(short, long)]
        environment: Option<String>,

        /// Upload baudrate (rewrites upload_speed in platformio.ini)
        #[arg(short, long, default_value_t = DEFAULT_BAUD)]
        baud: u32,
    },

    /// Open a serial monitor
    Monitor {
        /// Monitor port; defaults to the first detected port
        #[arg(short, long)]
        port: Option<String>,

        /// Monitor baudrate
        #[arg(short, long, default_value_t = DEFAULT_BAUD)]
        baud: u32,
    },

    /// List PlatformIO environments in the project
    Envs,

    /// Copy built artifacts into the firmware catalog
    Publish {
        /// PlatformIO environment to take the build output from
        #[arg(short, long)]
        environment: Option<String>,

        /// Version number for the published entry
        #[arg(long, default_value = "0.0.1")]
        version: String,

        /// Board name for the published entry
        #[arg(long, default_value = "Lolin S2 Mini")]
        board: String,

        /// Firmware storage directory (defaults to auto-discovery)
        #[arg(long, value_name = "DIR")]
        firmware_root: Option<PathBuf>,
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
        Some(Commands::Build { environment, clean }) => build(&cli, environment.as_deref(), *clean),
        Some(Commands::Upload {
            port,
            environment,
            baud,
        }) => upload(&cli, port.as_deref(), environment.as_deref(), *baud),
        Some(Commands::Monitor { port, baud }) => monitor(&cli, port.as_deref(), *baud),
        Some(Commands::Envs) => list_environments(&cli),
        Some(Commands::Publish {
            environment,
            version,
            board,
            firmware_root,
        }) => publish(
            &cli,
            environment.as_deref(),
            version,
            board,
            firmware_root.as_deref(),
        ),
        None => interactive(&cli),
    }
}

fn trace(cli: &Cli, spec: &CommandSpec) {
    if cli.verbose {
        eprintln!("running: {}", spec.rendered());
    }
}

fn build(cli: &Cli, environment: Option<&str>, clean: bool) -> Result<()> {
    pio::check_project_config(&cli.project)?;
    let pio_cli = pio::resolve_pio()?;

    if clean {
        let spec = pio::clean_plan(&pio_cli, &cli.project, environment);
        trace(cli, &spec);
        println!("Cleaning build output...");
        exec::run_checked(&spec)?;
    }

    let spec = pio::build_plan(&pio_cli, &cli.project, environment);
    trace(cli, &spec);
    match environment {
        Some(env) => println!("Building environment '{env}'..."),
        None => println!("Building all environments..."),
    }
    exec::run_checked(&spec)?;
    println!("Build finished.");
    Ok(())
}

fn upload(cli: &Cli, port: Option<&str>, environment: Option<&str>, baud: u32) -> Result<()> {
    pio::check_project_config(&cli.project)?;
    let pio_cli = pio::resolve_pio()?;
    let port = resolve_port(port)?;

    if baud != DEFAULT_BAUD {
        set_project_upload_speed(&cli.project, baud)?;
        println!("Set upload_speed = {baud} in {}", pio::PROJECT_CONFIG);
    }

    let spec = pio::upload_plan(&pio_cli, &cli.project, &port, environment);
    trace(cli, &spec);
    println!("Building and uploading to {port}...");
    exec::run_checked(&spec)?;
    println!("Upload finished. The board reboots into the new firmware.");
    Ok(())
}

fn monitor(cli: &Cli, port: Option<&str>, baud: u32) -> Result<()> {
    let pio_cli = pio::resolve_pio()?;
    let port = resolve_port(port)?;
    let spec = pio::monitor_plan(&pio_cli, &port, baud);
    trace(cli, &spec);
    println!("Opening serial monitor on {port} at {baud} baud (Ctrl+C to exit)...");
    exec::run_interactive(&spec)
}

fn list_environments(cli: &Cli) -> Result<()> {
    let environments = project_environments(cli)?;
    if environments.is_empty() {
        println!("No environments found in {}.", pio::PROJECT_CONFIG);
        return Ok(());
    }
    println!("PlatformIO environments:");
    for env in environments {
        println!("  {env}");
    }
    Ok(())
}

fn publish(
    cli: &Cli,
    environment: Option<&str>,
    version: &str,
    board: &str,
    firmware_root: Option<&Path>,
) -> Result<()> {
    let root = match firmware_root {
        Some(root) => root.to_path_buf(),
        None => boardflash::find_firmware_root()?,
    };
    let artifacts = pio::find_built_artifacts(&cli.project, environment)?;
    if artifacts.is_empty() {
        bail!("no firmware artifacts found in the build output; build the firmware first");
    }

    let options = PublishOptions {
        version: version.to_string(),
        board: board.to_string(),
    };
    let entry = publish_artifacts(&root, &artifacts, &options)?;
    println!(
        "Published {} ({} files) as '{}' in {}",
        entry.version,
        entry.files.len(),
        entry.id,
        root.display()
    );
    Ok(())
}

fn interactive(cli: &Cli) -> Result<()> {
    println!("Interactive PlatformIO mode");
    println!("{}", "=".repeat(40));

    pio::check_project_config(&cli.project)?;

    let environments = project_environments(cli)?;
    let environment = match environments.len() {
        0 => None,
        1 => {
            println!("Using only environment: {}", environments[0]);
            Some(environments[0].clone())
        }
        _ => match select_from_menu("Select environment", &environments)? {
            Some(choice) => Some(environments[choice].clone()),
            None => {
                println!("Cancelled.");
                return Ok(());
            }
        },
    };

    if confirm("Build the firmware? [y/N]: ")? {
        let clean = confirm("Clean before building? [y/N]: ")?;
        build(cli, environment.as_deref(), clean)?;
    }

    if confirm("Publish the build into the firmware catalog? [y/N]: ")? {
        let version = prompt_default("Version", "0.0.1")?;
        let board = prompt_default("Board name", "Lolin S2 Mini")?;
        publish(cli, environment.as_deref(), &version, &board, None)?;
    }

    if confirm("Upload to a board now? [y/N]: ")? {
        upload(cli, None, environment.as_deref(), DEFAULT_BAUD)?;
        if confirm("Open the serial monitor? [y/N]: ")? {
            monitor(cli, None, DEFAULT_BAUD)?;
        }
    }

    Ok(())
}

/// Environments declared in the project, via `pio run --list-targets`.
fn project_environments(cli: &Cli) -> Result<Vec<String>> {
    pio::check_project_config(&cli.project)?;
    let pio_cli = pio::resolve_pio()?;
    let spec = pio::list_targets_plan(&pio_cli, &cli.project);
    trace(cli, &spec);
    let output = exec::run_checked(&spec)?;
    Ok(pio::parse_target_listing(
        &String::from_utf8_lossy(&output.stdout),
    ))
}

fn resolve_port(port: Option<&str>) -> Result<String> {
    if let Some(port) = port {
        return Ok(port.to_string());
    }
    let ports = ports::list_ports()?;
    let Some(first) = ports.first() else {
        bail!("no serial ports found; connect the board and try again");
    };
    println!("Auto-selected port: {}", first.name);
    Ok(first.name.clone())
}

fn set_project_upload_speed(project_root: &Path, baud: u32) -> Result<()> {
    let config_path = project_root.join(pio::PROJECT_CONFIG);
    let config = fs::read_to_string(&config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    let rewritten = pio::set_upload_speed(&config, baud);
    fs::write(&config_path, rewritten)
        .with_context(|| format!("writing {}", config_path.display()))?;
    Ok(())
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

fn prompt_default(label: &str, default: &str) -> Result<String> {
    match prompt_line(&format!("{label} [{default}]: "))? {
        Some(answer) if !answer.is_empty() => Ok(answer),
        _ => Ok(default.to_string()),
    }
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
