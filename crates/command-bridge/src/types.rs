use crate::topics;
use crate::Rejection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parsed `rfxcom2mqtt/command/<deviceType>/<entity>[/<unit>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTopic {
    pub device_type: String,
    /// `base/unit` when a unit segment is present.
    pub entity_name: String,
    pub unit: Option<String>,
}

impl CommandTopic {
    pub fn parse(topic: &str) -> Result<Self, Rejection> {
        let segments: Vec<&str> = topic.split('/').collect();
        if segments[0] != topics::ROOT {
            return Err(Rejection::WrongNamespace(topic.to_string()));
        }
        if segments.get(1) != Some(&topics::COMMAND_MARKER) {
            return Err(Rejection::NotACommand(topic.to_string()));
        }
        let device_type = match segments.get(2) {
            Some(t) if !t.is_empty() => *t,
            _ => return Err(Rejection::MissingDeviceType(topic.to_string())),
        };
        let base = match segments.get(3) {
            Some(e) if !e.is_empty() => *e,
            _ => return Err(Rejection::MissingEntity(topic.to_string())),
        };
        if segments.len() > 5 {
            return Err(Rejection::TooManySegments(topic.to_string()));
        }
        let unit = segments.get(4).filter(|u| !u.is_empty()).map(|u| u.to_string());
        let entity_name = match &unit {
            Some(unit) => format!("{base}/{unit}"),
            None => base.to_string(),
        };
        Ok(Self {
            device_type: device_type.to_string(),
            entity_name,
            unit,
        })
    }
}

/// JSON body of a command message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPayload {
    #[serde(default)]
    pub sub_type: Option<Value>,
    #[serde(default)]
    pub device_function: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub device_options: Option<Value>,
}

impl CommandPayload {
    pub fn parse(payload: &[u8]) -> Result<Self, Rejection> {
        serde_json::from_slice(payload).map_err(|e| Rejection::InvalidPayload(e.to_string()))
    }
}

/// A command with topic, payload and registry overrides merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCommand {
    pub device_type: String,
    pub entity_name: String,
    pub sub_type: Value,
    pub device_function: String,
    pub value: Option<Value>,
    pub device_options: Option<Value>,
    pub repeat_count: u32,
}

/// Outcome of translating one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Command(ResolvedCommand),
    Rejected(Rejection),
}

/// Where and what to publish for one radio event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPublish {
    /// Friendly name when configured, otherwise the raw device id.
    pub topic_suffix: String,
    pub payload: String,
}

impl ResolvedPublish {
    pub fn topic(&self) -> String {
        topics::device_topic(&self.topic_suffix)
    }
}
