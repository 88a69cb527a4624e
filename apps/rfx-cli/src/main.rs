use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info};

use command_bridge::{
    BridgeConfig, CapabilityCatalog, CommandExecutor, CommandTranslator, Translation,
};
use device_registry as devreg;
use rfx_transport as rfx;
use rfx_transport::{packet, Transceiver};

#[derive(Parser, Debug)]
#[command(
    name = "rfx",
    version,
    about = "rfxcom2mqtt operator CLI",
    disable_help_subcommand = true
)]
struct Cli {
    /// Dump raw packets while talking to a transceiver
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    packets: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Serial,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports a transceiver could be on
    Ports {
        #[arg(long, value_enum, default_value_t = Backend::Serial)]
        backend: Backend,
    },
    /// Print the device types and functions commands may use
    Catalog,
    /// Print the devices a config file registers
    Devices {
        #[arg(long, default_value = "config.yml")]
        config: PathBuf,
    },
    /// Print the JSON schema of a `devices` entry
    Schema,
    /// Resolve a command without transmitting it
    Resolve {
        #[arg(long, default_value = "config.yml")]
        config: PathBuf,
        /// Full topic, e.g. rfxcom2mqtt/command/Lighting2/Kitchen Light
        #[arg(long)]
        topic: String,
        /// JSON payload, e.g. {"deviceFunction":"switchOn","subType":0}
        #[arg(long)]
        payload: String,
    },
    /// Initialise a transceiver and print its status
    Status {
        #[arg(long, default_value = "/dev/ttyUSB0")]
        port: String,
        #[arg(long, value_enum, default_value_t = Backend::Serial)]
        backend: Backend,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.packets);

    match cli.command {
        Commands::Ports { backend } => list_ports(backend),
        Commands::Catalog => print_catalog(),
        Commands::Devices { config } => print_devices(&config),
        Commands::Schema => {
            let schema = schemars::schema_for!(devreg::DeviceConfigEntry);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Commands::Resolve {
            config,
            topic,
            payload,
        } => resolve(&config, &topic, &payload),
        Commands::Status { port, backend } => status(backend, &port, cli.packets),
    }
}

fn setup_tracing(packets: bool) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if packets {
        if let Ok(directive) = "rfx_transport=trace".parse() {
            filter = filter.add_directive(directive);
        }
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn list_ports(backend: Backend) -> Result<()> {
    let ports = match backend {
        Backend::Mock => rfx::MockTransceiver::list()?,
        Backend::Serial => rfx::SerialTransceiver::list()?,
    };
    if ports.is_empty() {
        eprintln!("no ports found");
    }
    for port in ports {
        println!("{}\t{}", port.name, port.driver);
    }
    Ok(())
}

fn print_catalog() -> Result<()> {
    let catalog = CapabilityCatalog::rfxcom();
    for name in catalog.device_types() {
        let Some(class) = catalog.class(name) else {
            continue;
        };
        let subtypes: Vec<String> = class
            .subtypes
            .iter()
            .map(|(n, code)| format!("{n}={code}"))
            .collect();
        println!("{name} ({})", class.protocol);
        println!("  functions: {}", class.function_names().collect::<Vec<_>>().join(", "));
        println!("  subtypes:  {}", subtypes.join(", "));
    }
    Ok(())
}

fn print_devices(path: &Path) -> Result<()> {
    let config = BridgeConfig::load(path)?;
    let registry: devreg::DeviceRegistry = config.registry()?;
    let catalog = CapabilityCatalog::rfxcom();
    println!("{} device(s) in {}", registry.len(), path.display());
    for entry in registry.iter() {
        let device_type = entry.device_type.as_deref().unwrap_or("-");
        let flag = match &entry.device_type {
            Some(t) if !catalog.is_known_device_type(t) => "\tUNKNOWN TYPE",
            _ => "",
        };
        println!(
            "{}\t{}\t{}\trepetitions={}{}",
            entry.display_name(),
            entry.id,
            device_type,
            entry
                .repetitions
                .unwrap_or(config.rfxcom.transmit.repeat),
            flag
        );
    }
    Ok(())
}

fn resolve(path: &Path, topic: &str, payload: &str) -> Result<()> {
    let config = BridgeConfig::load(path)?;
    let catalog = Arc::new(CapabilityCatalog::rfxcom());
    let registry = Arc::new(config.registry()?);
    let translator =
        CommandTranslator::new(catalog.clone(), registry, config.rfxcom.transmit.repeat);

    let cmd = match translator.translate(topic, payload.as_bytes())? {
        Translation::Command(cmd) => cmd,
        Translation::Rejected(reason) => {
            println!("rejected: {reason}");
            return Ok(());
        }
    };
    println!("{}", serde_json::to_string_pretty(&cmd)?);

    let plan = CommandExecutor::new(catalog)
        .plan(&cmd)
        .context("building transmission")?;
    println!("plan: {plan}");
    println!(
        "packet: {}",
        packet::hex(&packet::encode_transmission(&plan.transmission, 0))
    );
    Ok(())
}

fn status(backend: Backend, port: &str, packets: bool) -> Result<()> {
    let options = rfx::OpenOptions { debug: packets };
    let mut transceiver: Box<dyn Transceiver> = match backend {
        Backend::Mock => Box::new(rfx::MockTransceiver::open(port, &options)?),
        Backend::Serial => Box::new(
            rfx::SerialTransceiver::open(port, &options)
                .with_context(|| format!("opening {port}"))?,
        ),
    };
    info!(port, ?backend, "initialising");
    let status = match transceiver.initialise() {
        Ok(s) => s,
        Err(e) => {
            error!("initialise failed: {e}");
            return Err(e.into());
        }
    };
    let at = rfx::Timestamp::now().0.format(&Rfc3339)?;
    println!("# {port} at {at}");
    println!("{}", command_bridge::status_info(&status)?);
    Ok(())
}
