//! Bridge configuration, read once at startup from a YAML file.

use anyhow::{bail, Context};
use device_registry::{DeviceConfigEntry, DeviceRegistry, RegistryError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub healthcheck: HealthCheckSettings,
    pub mqtt: MqttSettings,
    pub rfxcom: RfxcomSettings,
    #[serde(default)]
    pub devices: Vec<DeviceConfigEntry>,
}

/// Accepts `healthcheck: true` as well as `healthcheck: { enabled: true }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HealthCheckRepr")]
pub struct HealthCheckSettings {
    pub enabled: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HealthCheckRepr {
    Flag(bool),
    Table {
        #[serde(default = "enabled_by_default")]
        enabled: bool,
    },
}

fn enabled_by_default() -> bool {
    true
}

impl From<HealthCheckRepr> for HealthCheckSettings {
    fn from(repr: HealthCheckRepr) -> Self {
        match repr {
            HealthCheckRepr::Flag(enabled) | HealthCheckRepr::Table { enabled } => {
                Self { enabled }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttSettings {
    /// Broker address, optionally with an `mqtt://` or `tcp://` scheme.
    pub server: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub retain: bool,
    #[serde(default)]
    pub client_id: Option<String>,
}

fn default_mqtt_port() -> u16 {
    1883
}

impl MqttSettings {
    /// Broker host with any URL scheme and trailing slash removed.
    pub fn host(&self) -> &str {
        let server = self.server.trim();
        let host = server
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(server);
        host.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfxcomSettings {
    pub usbport: String,
    /// Dump raw packets at trace level.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub transmit: TransmitSettings,
    /// Protocol families whose events are published.
    #[serde(default)]
    pub receive: Vec<String>,
}

impl RfxcomSettings {
    /// Whether events of this protocol family are published.
    pub fn receives(&self, protocol: &str) -> bool {
        self.receive.iter().any(|p| p == protocol)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmitSettings {
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_repeat() -> u32 {
    1
}

fn default_interval_ms() -> u64 {
    100
}

impl Default for TransmitSettings {
    fn default() -> Self {
        Self {
            repeat: default_repeat(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl TransmitSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl BridgeConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("loading config: {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_yaml::from_str(raw).context("parsing yaml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mqtt.qos > 2 {
            bail!("mqtt.qos must be 0, 1 or 2 (got {})", self.mqtt.qos);
        }
        if self.rfxcom.transmit.repeat == 0 {
            bail!("rfxcom.transmit.repeat must be at least 1");
        }
        if self.mqtt.host().is_empty() {
            bail!("mqtt.server is empty");
        }
        self.registry().context("invalid devices")?;
        Ok(())
    }

    pub fn registry(&self) -> Result<DeviceRegistry, RegistryError> {
        DeviceRegistry::new(self.devices.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
debug: true
healthcheck:
  enabled: true
mqtt:
  server: mqtt://broker.local
  username: user
  password: pass
  qos: 1
  retain: true
rfxcom:
  usbport: /dev/ttyUSB0
  transmit:
    repeat: 2
  receive: [lighting2, lighting4]
devices:
  - id: "0x0101ABCD/1"
    friendlyName: Kitchen Light
    type: Lighting2
    subType: 0
    repetitions: 3
"#;

    #[test]
    fn test_full_config() {
        let cfg = BridgeConfig::from_yaml_str(FULL).unwrap();
        assert!(cfg.debug);
        assert!(cfg.healthcheck.enabled);
        assert_eq!(cfg.mqtt.host(), "broker.local");
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.mqtt.qos, 1);
        assert_eq!(cfg.rfxcom.transmit.repeat, 2);
        assert_eq!(cfg.rfxcom.transmit.interval(), Duration::from_millis(100));
        assert!(cfg.rfxcom.receives("lighting4"));
        assert!(!cfg.rfxcom.receives("chime1"));
        let registry = cfg.registry().unwrap();
        assert_eq!(
            registry
                .find_by_friendly_name("Kitchen Light")
                .and_then(|e| e.repetitions),
            Some(3)
        );
    }

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = BridgeConfig::from_yaml_str(
            "mqtt:\n  server: localhost\nrfxcom:\n  usbport: /dev/ttyUSB0\n",
        )
        .unwrap();
        assert!(!cfg.debug);
        assert!(!cfg.healthcheck.enabled);
        assert_eq!(cfg.mqtt.host(), "localhost");
        assert!(!cfg.mqtt.retain);
        assert_eq!(cfg.rfxcom.transmit.repeat, 1);
        assert!(cfg.rfxcom.receive.is_empty());
        assert!(cfg.devices.is_empty());
    }

    #[test]
    fn test_healthcheck_forms() {
        let flag = "healthcheck: true\nmqtt:\n  server: h\nrfxcom:\n  usbport: p\n";
        assert!(BridgeConfig::from_yaml_str(flag).unwrap().healthcheck.enabled);
        let off = "healthcheck: { enabled: false }\nmqtt:\n  server: h\nrfxcom:\n  usbport: p\n";
        assert!(!BridgeConfig::from_yaml_str(off).unwrap().healthcheck.enabled);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let qos = "mqtt:\n  server: h\n  qos: 3\nrfxcom:\n  usbport: p\n";
        assert!(BridgeConfig::from_yaml_str(qos).is_err());
        let repeat = "mqtt:\n  server: h\nrfxcom:\n  usbport: p\n  transmit: { repeat: 0 }\n";
        assert!(BridgeConfig::from_yaml_str(repeat).is_err());
        let dup = "mqtt:\n  server: h\nrfxcom:\n  usbport: p\ndevices:\n  - id: a\n  - id: a\n";
        assert!(BridgeConfig::from_yaml_str(dup).is_err());
    }
}
