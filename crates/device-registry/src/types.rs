use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One configured device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfigEntry {
    /// Address understood by the transceiver, e.g. `0x0101ABCD/1`.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    /// Device class name; overrides the class named in the command topic.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    /// Driver-defined, either a code or a name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<Value>,
    /// Passed verbatim to device construction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetitions: Option<u32>,
}

impl DeviceConfigEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            friendly_name: None,
            device_type: None,
            sub_type: None,
            options: None,
            repetitions: None,
        }
    }

    /// Name used on the bus for this device.
    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.id)
    }
}
