use crate::{
    publish, topics, BridgeConfig, BridgeMetrics, CapabilityCatalog, CommandExecutor,
    CommandTranslator, EventPublisher, FatalError, LinkError, LinkEvent, Rejection,
    RfxcomSettings, TransceiverLink, Translation,
};
use device_registry::DeviceRegistry;
use rfx_transport::StatusEvent;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// One message ready to hand to the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Everything between the broker client and the transceiver link.
pub struct Bridge {
    translator: CommandTranslator,
    executor: CommandExecutor,
    publisher: EventPublisher,
    link: TransceiverLink,
    metrics: BridgeMetrics,
    rfxcom: RfxcomSettings,
    retain: bool,
}

impl Bridge {
    pub fn new(
        config: &BridgeConfig,
        catalog: Arc<CapabilityCatalog>,
        registry: Arc<DeviceRegistry>,
        link: TransceiverLink,
        metrics: BridgeMetrics,
    ) -> Self {
        metrics.devices_configured.set(registry.len() as i64);
        Self {
            translator: CommandTranslator::new(
                catalog.clone(),
                registry.clone(),
                config.rfxcom.transmit.repeat,
            ),
            executor: CommandExecutor::new(catalog),
            publisher: EventPublisher::new(registry),
            link,
            metrics,
            rfxcom: config.rfxcom.clone(),
            retain: config.mqtt.retain,
        }
    }

    /// Translate an inbound command and queue its transmissions.
    ///
    /// Anything wrong with the single message is logged and dropped. An `Err`
    /// means the bridge cannot keep serving commands.
    pub fn handle_command(&self, topic: &str, payload: &[u8]) -> Result<(), FatalError> {
        self.metrics.commands_received.inc();
        debug!(topic = %topic, payload = %String::from_utf8_lossy(payload), "command in");

        let cmd = match self.translator.translate(topic, payload)? {
            Translation::Command(cmd) => cmd,
            Translation::Rejected(_) => {
                self.metrics.commands_rejected.inc();
                return Ok(());
            }
        };
        let plan = match self.executor.plan(&cmd) {
            Ok(plan) => plan,
            Err(e) => {
                self.metrics.commands_rejected.inc();
                warn!(topic = %topic, "rejected command: {}", Rejection::Unbuildable(e));
                return Ok(());
            }
        };

        debug!(
            device_type = %cmd.device_type,
            entity = %cmd.entity_name,
            function = %cmd.device_function,
            value = ?cmd.value,
            repeat = plan.repeat_count,
            "dispatching"
        );
        let count = u64::from(plan.repeat_count);
        match self.link.execute(plan) {
            Ok(()) => {
                self.metrics.transmissions.inc_by(count);
                Ok(())
            }
            Err(LinkError::Closed) => Err(FatalError::LinkClosed),
            Err(e) => {
                error!("could not queue command: {e}");
                Err(FatalError::LinkClosed)
            }
        }
    }

    /// What to publish, if anything, for an event from the transceiver.
    pub fn handle_link_event(&self, event: LinkEvent) -> Option<Outbound> {
        match event {
            LinkEvent::Device(evt) => {
                if !self.rfxcom.receives(&evt.protocol) {
                    return None;
                }
                match self.publisher.resolve(&evt) {
                    Ok(out) => {
                        self.metrics.events_published.inc();
                        Some(Outbound {
                            topic: out.topic(),
                            payload: out.payload,
                            retain: self.retain,
                        })
                    }
                    Err(e) => {
                        warn!(protocol = %evt.protocol, "dropped event: {e}");
                        None
                    }
                }
            }
            LinkEvent::Status(status) => self.status_outbound(&status),
            LinkEvent::Disconnected(reason) => {
                error!("RFXCOM disconnected: {reason}");
                Some(Outbound {
                    topic: topics::DISCONNECTED.to_string(),
                    payload: "disconnected".to_string(),
                    retain: true,
                })
            }
        }
    }

    pub fn status_outbound(&self, status: &StatusEvent) -> Option<Outbound> {
        match publish::status_info(status) {
            Ok(payload) => Some(Outbound {
                topic: topics::INFO.to_string(),
                payload,
                retain: self.retain,
            }),
            Err(e) => {
                warn!("dropped status report: {e}");
                None
            }
        }
    }

    pub fn link(&self) -> &TransceiverLink {
        &self.link
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.metrics
    }

    pub fn into_link(self) -> TransceiverLink {
        self.link
    }
}
