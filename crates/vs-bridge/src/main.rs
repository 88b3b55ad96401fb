//! vs-bridge - Open vSwitch bridge provider
//!
//! Entry point for the vs-bridge command.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use vs_bridge::{
    BridgeResource, BridgeState, Catalog, CatalogReport, CommandSet, ExternalIds, Manifest,
    OvsBridge, ProviderConfig, DEFAULT_CONFIG_PATH,
};
use vswitch_common::{ResourceProvider, SystemRunner};

/// Open vSwitch bridge provider
#[derive(Parser, Debug)]
#[command(name = "vs-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Provider configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Override the ovs-vsctl binary
    #[arg(long)]
    vsctl: Option<String>,

    /// Override the ip binary
    #[arg(long)]
    ip: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Converge every bridge declared in a manifest
    Apply {
        /// TOML manifest of [[bridge]] declarations
        manifest: PathBuf,

        /// Report what would change without changing anything
        #[arg(long)]
        noop: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check whether a bridge exists (exit status 0 if it does)
    Exists {
        /// Bridge name
        name: String,
    },

    /// Show the managed state of a bridge
    Show {
        /// Bridge name
        name: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Create a bridge and bring its link up
    Create {
        /// Bridge name
        name: String,

        /// External id to set, may be repeated
        #[arg(long = "external-id", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        external_ids: Vec<(String, String)>,

        /// MAC learning table limit
        #[arg(long)]
        mac_table_size: Option<u32>,
    },

    /// Bring a bridge's link down and delete it
    Destroy {
        /// Bridge name
        name: String,
    },

    /// Make a bridge's external ids exactly the given set
    SetExternalIds {
        /// Bridge name
        name: String,

        /// Desired external ids; none clears them all
        #[arg(value_name = "KEY=VALUE", value_parser = parse_key_value)]
        external_ids: Vec<(String, String)>,
    },

    /// Set a bridge's MAC learning table limit
    SetMacTableSize {
        /// Bridge name
        name: String,

        /// Table size
        size: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Parses a `KEY=VALUE` argument, splitting on the first `=`
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((key.to_string(), value.to_string()))
}

/// Initializes tracing/logging subsystem
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn build_provider(args: &Args) -> Result<OvsBridge> {
    let config = ProviderConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let vsctl = args.vsctl.as_deref().unwrap_or(&config.commands.vsctl);
    let ip = args.ip.as_deref().unwrap_or(&config.commands.ip);
    debug!(vsctl, ip, "Using commands");

    Ok(OvsBridge::with_commands(
        Arc::new(SystemRunner::new()),
        CommandSet::new(vsctl, ip),
    ))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_catalog_report(report: &CatalogReport) {
    for apply in &report.reports {
        for event in &apply.events {
            let suffix = if apply.noop { " (noop)" } else { "" };
            println!("Vs_bridge[{}]: {}{}", apply.resource, event, suffix);
        }
    }
    for failure in &report.failures {
        println!("Vs_bridge[{}]: failed: {}", failure.resource, failure.error);
    }
    println!(
        "{} changed, {} failed, {} total",
        report.changed_count(),
        report.failures.len(),
        report.reports.len() + report.failures.len()
    );
}

fn print_state(state: &BridgeState) {
    println!("bridge: {}", state.name);
    println!("exists: {}", state.exists);
    if !state.exists {
        return;
    }
    println!("external_ids:");
    for (key, value) in &state.external_ids {
        println!("  {}={}", key, value);
    }
    match state.mac_table_size {
        Some(size) => println!("mac_table_size: {}", size),
        None => println!("mac_table_size: unset"),
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let provider = build_provider(&args)?;

    match args.command {
        Command::Apply {
            manifest,
            noop,
            format,
        } => {
            let manifest = Manifest::load(&manifest)
                .with_context(|| format!("loading manifest {}", manifest.display()))?;
            let report = Catalog::new(&provider)
                .with_noop(noop)
                .apply_all(&manifest.bridges);
            match format {
                OutputFormat::Text => print_catalog_report(&report),
                OutputFormat::Json => print_json(&report)?,
            }
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Exists { name } => {
            let exists = provider.bridge_exists(&name)?;
            println!("{}", exists);
            Ok(if exists {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Show { name, format } => {
            let state = provider.state(&name)?;
            match format {
                OutputFormat::Text => print_state(&state),
                OutputFormat::Json => print_json(&state)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Create {
            name,
            external_ids,
            mac_table_size,
        } => {
            let mut resource = BridgeResource::new(name);
            if !external_ids.is_empty() {
                resource = resource.with_external_ids(external_ids);
            }
            resource.mac_table_size = mac_table_size;
            resource.validate()?;
            provider.create(&resource)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Destroy { name } => {
            provider.destroy(&BridgeResource::absent(name))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::SetExternalIds { name, external_ids } => {
            let desired: ExternalIds = external_ids.into_iter().collect();
            vs_bridge::validate_bridge_name(&name)?;
            vs_bridge::validate_external_ids(&desired)?;
            provider.set_external_ids(&name, &desired)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::SetMacTableSize { name, size } => {
            vs_bridge::validate_bridge_name(&name)?;
            provider.set_mac_table_size(&name, size)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
