use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct BridgeMetrics {
    pub registry: Registry,
    pub commands_received: IntCounter,
    pub commands_rejected: IntCounter,
    pub transmissions: IntCounter,
    pub events_published: IntCounter,
    pub devices_configured: IntGauge,
}

impl BridgeMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let commands_received = IntCounter::new(
            "rfxcom2mqtt_commands_received",
            "Command messages received from the broker",
        )?;
        let commands_rejected = IntCounter::new(
            "rfxcom2mqtt_commands_rejected",
            "Command messages dropped as invalid",
        )?;
        let transmissions = IntCounter::new(
            "rfxcom2mqtt_transmissions",
            "Packets handed to the transceiver, repetitions included",
        )?;
        let events_published = IntCounter::new(
            "rfxcom2mqtt_events_published",
            "Device events published to the broker",
        )?;
        let devices_configured =
            IntGauge::new("rfxcom2mqtt_devices_configured", "Devices in the registry")?;

        registry.register(Box::new(commands_received.clone()))?;
        registry.register(Box::new(commands_rejected.clone()))?;
        registry.register(Box::new(transmissions.clone()))?;
        registry.register(Box::new(events_published.clone()))?;
        registry.register(Box::new(devices_configured.clone()))?;

        Ok(Self {
            registry,
            commands_received,
            commands_rejected,
            transmissions,
            events_published,
            devices_configured,
        })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_show_in_text() {
        let m = BridgeMetrics::new().unwrap();
        m.commands_received.inc();
        m.transmissions.inc_by(3);
        m.devices_configured.set(2);
        let text = m.encode_text();
        assert!(text.contains("rfxcom2mqtt_commands_received 1"));
        assert!(text.contains("rfxcom2mqtt_transmissions 3"));
        assert!(text.contains("rfxcom2mqtt_devices_configured 2"));
    }
}
