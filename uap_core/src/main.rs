//! # UAP Provisioning Tool
//!
//! Opens a secure session on a chip, stores pairing keys and writes the
//! reference R-config profile.
//!
//! # Usage
//!
//! ```bash
//! # Provision the simulated chip, keeping its state between runs
//! uap_provision --config provision.toml --state-file /tmp/chip.bin
//!
//! # Print the reference profile as JSON
//! uap_provision --print-profile
//!
//! # Verbose logging, JSON output
//! uap_provision --config provision.toml -v --json
//! ```

use clap::Parser;
use std::path::PathBuf;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use uap_common::config::{ConfigLoader, LogLevel, ProvisionConfig};
use uap_common::consts::{DEFAULT_CONFIG_PATH, UAP_SERVICE_NAME};
use uap_common::transport::ChipTransport;
use uap_core::drivers::simulation::SimulatedChip;
use uap_core::{ChipHandle, TransportRegistry, provision, reference_r_config};

/// UAP provisioning - pairing keys and access-privilege configuration
#[derive(Parser, Debug)]
#[command(name = "uap_provision")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Provision pairing keys and access privileges of a secure element")]
#[command(long_about = None)]
struct Args {
    /// Path to provisioning configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Transport to use
    #[arg(short, long, default_value = "simulation")]
    driver: String,

    /// Simulator state file (overrides [simulation].state_file)
    #[arg(long, value_name = "FILE")]
    state_file: Option<PathBuf>,

    /// Print the reference R-config profile as JSON and exit
    #[arg(long)]
    print_profile: bool,

    /// List available transports and exit
    #[arg(long)]
    list_drivers: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Provisioning failed: {}", e);
        eprintln!("uap_provision: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let registry = TransportRegistry::with_builtin();

    if args.print_profile {
        let profile = reference_r_config()?;
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }
    if args.list_drivers {
        let mut names = registry.list();
        names.sort();
        for name in names {
            println!("{name}");
        }
        return Ok(());
    }

    let config = ProvisionConfig::load(&args.config)?;
    setup_tracing(&args, config.shared.log_level);

    info!(
        "{} provisioning v{} starting ({})",
        UAP_SERVICE_NAME,
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let state_file = args.state_file.clone().or(config.simulation.state_file.clone());
    let transport: Box<dyn ChipTransport> = match (args.driver.as_str(), state_file) {
        ("simulation", Some(path)) => {
            info!("Simulator state file {:?}", path);
            Box::new(SimulatedChip::new().with_state_file(path))
        }
        (name, _) => registry.create(name)?,
    };
    info!("Using transport {} v{}", transport.name(), transport.version());

    let mut handle = ChipHandle::new(transport);
    let report = provision(&mut handle, &config)?;

    for slot in &report.keys_written {
        info!("Pairing key written: {slot}");
    }
    for slot in &report.keys_present {
        info!("Pairing key already present: {slot}");
    }
    if let Some(r_config) = &report.r_config {
        println!("{r_config}");
    }

    info!("Provisioning complete");
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        configured.as_directive().parse().unwrap_or(Level::INFO)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
