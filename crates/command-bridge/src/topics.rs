//! Fixed MQTT topic namespace.

pub const ROOT: &str = "rfxcom2mqtt";
pub const COMMAND_MARKER: &str = "command";

pub const COMMAND_SUBSCRIPTION: &str = "rfxcom2mqtt/command/#";
pub const DEVICES: &str = "rfxcom2mqtt/devices";
pub const STATUS: &str = "rfxcom2mqtt/status";
pub const INFO: &str = "rfxcom2mqtt/info";
pub const DISCONNECTED: &str = "rfxcom2mqtt/disconnected";

pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

pub fn device_topic(suffix: &str) -> String {
    format!("{DEVICES}/{suffix}")
}
