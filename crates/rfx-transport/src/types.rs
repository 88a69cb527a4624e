use crate::devices::DeviceEvent;
use serde_json::{Map, Value};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamp(pub OffsetDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }
}

/// Interface status as reported by the transceiver in reply to a status query.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusEvent {
    pub fields: Map<String, Value>,
}

impl StatusEvent {
    pub fn receiver_type(&self) -> Option<&str> {
        self.fields.get("receiverType").and_then(Value::as_str)
    }

    pub fn firmware_version(&self) -> Option<u64> {
        self.fields.get("firmwareVersion").and_then(Value::as_u64)
    }
}

/// Anything the transceiver can hand back from a read.
#[derive(Clone, Debug, PartialEq)]
pub enum Received {
    Device(DeviceEvent),
    Status(StatusEvent),
    /// Transmitter acknowledgement for the packet with this sequence number.
    Ack { seqnbr: u8, ok: bool },
}

#[derive(Clone, Debug)]
pub struct PortInfo {
    pub name: String,
    pub driver: String,
}
