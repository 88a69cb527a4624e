use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use command_bridge::{
    Bridge, BridgeConfig, BridgeMetrics, CapabilityCatalog, LinkSettings, TransceiverLink,
};
use rfx_transport::{MockTransceiver, OpenOptions, SerialTransceiver, Transceiver};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod mqtt;

#[derive(Parser)]
#[command(name = "rfxcom2mqtt", version)]
#[command(about = "Bridges an RFXtrx433 transceiver to MQTT")]
struct Args {
    /// YAML configuration file
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    /// Use the in-process mock transceiver instead of the serial port
    #[arg(long, action = ArgAction::SetTrue)]
    mock: bool,

    /// Log at debug level regardless of the config file
    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = BridgeConfig::load(&args.config)?;
    setup_tracing(args.debug || config.debug, config.rfxcom.debug);

    info!("RFXCOM2MQTT starting");
    debug!(
        server = %config.mqtt.host(),
        port = config.mqtt.port,
        usbport = %config.rfxcom.usbport,
        receive = ?config.rfxcom.receive,
        devices = config.devices.len(),
        "configuration loaded"
    );

    let catalog = Arc::new(CapabilityCatalog::rfxcom());
    let registry = Arc::new(config.registry()?);
    for entry in registry.iter() {
        if let Some(device_type) = &entry.device_type {
            if !catalog.is_known_device_type(device_type) {
                warn!(
                    device = %entry.display_name(),
                    device_type = %device_type,
                    "configured type is not provided by the transceiver; commands to it will stop the bridge"
                );
            }
        }
    }

    let mut transceiver = open_transceiver(&config, args.mock)?;
    let (transceiver, status) = tokio::task::spawn_blocking(move || {
        let status = transceiver.initialise();
        (transceiver, status)
    })
    .await?;
    let status = status.context("Unable to initialise the RFXCOM device")?;
    info!(
        receiver = status.receiver_type().unwrap_or("unknown"),
        firmware = ?status.firmware_version(),
        "RFXCOM device initialised"
    );

    let (link, events) = TransceiverLink::spawn(
        transceiver,
        LinkSettings {
            repeat_interval: config.rfxcom.transmit.interval(),
            ..LinkSettings::default()
        },
    )?;
    let bridge = Bridge::new(
        &config,
        catalog,
        registry,
        link,
        BridgeMetrics::new().context("registering metrics")?,
    );
    let initial_info = bridge.status_outbound(&status);

    let outcome = mqtt::run(&config, &bridge, events, initial_info).await;

    let link = bridge.into_link();
    tokio::task::spawn_blocking(move || link.shutdown()).await??;
    info!("RFXCOM2MQTT stopped");
    outcome
}

fn open_transceiver(config: &BridgeConfig, mock: bool) -> Result<Box<dyn Transceiver>> {
    let options = OpenOptions {
        debug: config.rfxcom.debug,
    };
    let port = &config.rfxcom.usbport;
    if mock {
        warn!("using mock transceiver; nothing is transmitted");
        return Ok(Box::new(MockTransceiver::open(port, &options)?));
    }
    let serial =
        SerialTransceiver::open(port, &options).with_context(|| format!("opening {port}"))?;
    Ok(Box::new(serial))
}

fn setup_tracing(debug: bool, packet_trace: bool) {
    let mut filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if debug { "debug" } else { "info" })
    });
    if packet_trace {
        if let Ok(directive) = "rfx_transport=trace".parse() {
            filter = filter.add_directive(directive);
        }
    }
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
