use crate::{Rejection, ResolvedPublish};
use device_registry::DeviceRegistry;
use rfx_transport::{DeviceEvent, StatusEvent};
use serde_json::{Map, Value};
use std::sync::Arc;

/// The one protocol family that identifies devices by `data` instead of `id`.
const DATA_IDENTIFIED_PROTOCOL: &str = "lighting4";

/// Keys of a status report that only matter on the serial link.
const STATUS_LINK_FIELDS: [&str; 3] = ["subtype", "seqnbr", "cmnd"];

/// Identifier a radio event is addressed by.
pub fn device_identifier(event: &DeviceEvent) -> Option<String> {
    let key = if event.protocol == DATA_IDENTIFIED_PROTOCOL {
        "data"
    } else {
        "id"
    };
    match event.fields.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Maps radio events to device topics, preferring configured friendly names.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    registry: Arc<DeviceRegistry>,
}

impl EventPublisher {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self { registry }
    }

    pub fn resolve(&self, event: &DeviceEvent) -> Result<ResolvedPublish, Rejection> {
        let id = device_identifier(event).ok_or_else(|| Rejection::MissingIdentifier {
            protocol: event.protocol.clone(),
        })?;
        let topic_suffix = self
            .registry
            .find_by_id(&id)
            .and_then(|e| e.friendly_name.clone())
            .unwrap_or(id);

        let mut fields = event.fields.clone();
        fields.insert("type".into(), Value::String(event.protocol.clone()));
        Ok(ResolvedPublish {
            topic_suffix,
            payload: pretty(&Value::Object(fields))?,
        })
    }
}

/// Payload for the info topic: the status report without link bookkeeping.
pub fn status_info(status: &StatusEvent) -> Result<String, Rejection> {
    pretty(&strip_link_fields(Value::Object(status.fields.clone())))
}

fn strip_link_fields(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !STATUS_LINK_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k, strip_link_fields(v)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_link_fields).collect()),
        other => other,
    }
}

fn pretty(value: &Value) -> Result<String, Rejection> {
    serde_json::to_string_pretty(value).map_err(|e| Rejection::Encoding(e.to_string()))
}
