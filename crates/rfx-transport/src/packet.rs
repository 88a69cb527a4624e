//! RFXtrx binary frames.
//!
//! Every frame starts with a length byte counting the bytes that follow it, then
//! the packet type, subtype and a sequence number. Payload layouts follow the
//! RFXtrx SDK for the families in [`crate::DEVICE_CLASSES`].

use crate::devices::{DeviceEvent, Lighting1Command, Lighting2Command, Transmission};
use crate::{Received, Result, StatusEvent, Timestamp, TransportError};
use serde_json::{json, Map, Value};

pub const TYPE_INTERFACE_CONTROL: u8 = 0x00;
pub const TYPE_INTERFACE_MESSAGE: u8 = 0x01;
pub const TYPE_TRANSMITTER_MESSAGE: u8 = 0x02;
pub const TYPE_LIGHTING1: u8 = 0x10;
pub const TYPE_LIGHTING2: u8 = 0x11;
pub const TYPE_LIGHTING4: u8 = 0x13;
pub const TYPE_CHIME1: u8 = 0x16;

/// Commands understood by the interface itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InterfaceCommand {
    Reset,
    GetStatus,
    StartReceiver,
}

impl InterfaceCommand {
    pub fn code(self) -> u8 {
        match self {
            InterfaceCommand::Reset => 0x00,
            InterfaceCommand::GetStatus => 0x02,
            InterfaceCommand::StartReceiver => 0x07,
        }
    }
}

pub fn encode_control(cmd: InterfaceCommand, seqnbr: u8) -> Vec<u8> {
    let mut out = vec![0u8; 14];
    out[0] = 0x0D;
    out[1] = TYPE_INTERFACE_CONTROL;
    out[2] = 0x00;
    out[3] = seqnbr;
    out[4] = cmd.code();
    out
}

pub fn encode_transmission(tx: &Transmission, seqnbr: u8) -> Vec<u8> {
    match *tx {
        Transmission::Lighting1 {
            sub_type,
            house_code,
            unit_code,
            command,
        } => vec![
            0x07,
            TYPE_LIGHTING1,
            sub_type,
            seqnbr,
            house_code as u8,
            unit_code,
            command.code(),
            0x00,
        ],
        Transmission::Lighting2 {
            sub_type,
            id,
            unit_code,
            command,
            level,
        } => vec![
            0x0B,
            TYPE_LIGHTING2,
            sub_type,
            seqnbr,
            ((id >> 24) & 0x03) as u8,
            (id >> 16) as u8,
            (id >> 8) as u8,
            id as u8,
            unit_code,
            command.code(),
            level,
            0x00,
        ],
        Transmission::Lighting4 {
            sub_type,
            data,
            pulse_width,
        } => vec![
            0x09,
            TYPE_LIGHTING4,
            sub_type,
            seqnbr,
            (data >> 16) as u8,
            (data >> 8) as u8,
            data as u8,
            (pulse_width >> 8) as u8,
            pulse_width as u8,
            0x00,
        ],
        Transmission::Chime1 { sub_type, id, sound } => vec![
            0x07,
            TYPE_CHIME1,
            sub_type,
            seqnbr,
            (id >> 8) as u8,
            id as u8,
            sound,
            0x00,
        ],
    }
}

/// Build the fields of an interface status report.
pub fn status_event(seqnbr: u8, cmnd: u8, receiver_type: u8, firmware: u8, flags: [u8; 3]) -> StatusEvent {
    let mut fields = Map::new();
    fields.insert("subtype".into(), json!(0));
    fields.insert("seqnbr".into(), json!(seqnbr));
    fields.insert("cmnd".into(), json!(cmnd));
    fields.insert("receiverTypeCode".into(), json!(receiver_type));
    fields.insert("receiverType".into(), json!(receiver_type_name(receiver_type)));
    fields.insert("firmwareVersion".into(), json!(firmware));
    fields.insert("enabledProtocols".into(), json!(flags));
    StatusEvent { fields }
}

fn receiver_type_name(code: u8) -> &'static str {
    match code {
        0x50 => "310MHz",
        0x51 => "315MHz",
        0x52 => "433.92MHz receiver only",
        0x53 => "433.92MHz transceiver",
        0x55 => "868.00MHz",
        0x56 => "868.00MHz FSK",
        0x57 => "868.30MHz",
        0x58 => "868.30MHz FSK",
        0x59 => "868.35MHz",
        0x5A => "868.35MHz FSK",
        0x5B => "868.95MHz",
        _ => "unknown",
    }
}

/// Decode one complete frame, length byte included.
pub fn decode(frame: &[u8]) -> Result<Received> {
    if frame.len() < 4 {
        return Err(TransportError::InvalidPacket("short frame"));
    }
    if frame[0] as usize + 1 != frame.len() {
        return Err(TransportError::InvalidPacket("length mismatch"));
    }
    let (kind, subtype, seqnbr) = (frame[1], frame[2], frame[3]);
    match kind {
        TYPE_INTERFACE_MESSAGE => {
            if frame.len() < 10 {
                return Err(TransportError::InvalidPacket("short status"));
            }
            Ok(Received::Status(status_event(
                seqnbr,
                frame[4],
                frame[5],
                frame[6],
                [frame[7], frame[8], frame[9]],
            )))
        }
        TYPE_TRANSMITTER_MESSAGE => {
            if frame.len() < 5 {
                return Err(TransportError::InvalidPacket("short ack"));
            }
            // 0x00 and 0x01 are both "ACK, transmit OK"
            Ok(Received::Ack {
                seqnbr,
                ok: frame[4] <= 0x01,
            })
        }
        TYPE_LIGHTING1 => {
            if frame.len() < 8 {
                return Err(TransportError::InvalidPacket("short lighting1"));
            }
            let house = frame[4] as char;
            let unit = frame[5];
            let mut fields = device_fields(subtype, seqnbr);
            fields.insert("id".into(), json!(format!("{house}/{unit}")));
            fields.insert("housecode".into(), json!(house.to_string()));
            fields.insert("unitcode".into(), json!(unit));
            fields.insert("commandNumber".into(), json!(frame[6]));
            fields.insert(
                "command".into(),
                json!(Lighting1Command::from_code(frame[6]).map(Lighting1Command::name)),
            );
            fields.insert("rssi".into(), json!(frame[7] >> 4));
            Ok(device("lighting1", fields))
        }
        TYPE_LIGHTING2 => {
            if frame.len() < 12 {
                return Err(TransportError::InvalidPacket("short lighting2"));
            }
            let id = u32::from(frame[4] & 0x03) << 24
                | u32::from(frame[5]) << 16
                | u32::from(frame[6]) << 8
                | u32::from(frame[7]);
            let mut fields = device_fields(subtype, seqnbr);
            fields.insert("id".into(), json!(format!("0x{id:08X}")));
            fields.insert("unitcode".into(), json!(frame[8]));
            fields.insert("commandNumber".into(), json!(frame[9]));
            fields.insert(
                "command".into(),
                json!(Lighting2Command::from_code(frame[9]).map(Lighting2Command::name)),
            );
            fields.insert("level".into(), json!(frame[10]));
            fields.insert("rssi".into(), json!(frame[11] >> 4));
            Ok(device("lighting2", fields))
        }
        TYPE_LIGHTING4 => {
            if frame.len() < 10 {
                return Err(TransportError::InvalidPacket("short lighting4"));
            }
            let data = u32::from(frame[4]) << 16 | u32::from(frame[5]) << 8 | u32::from(frame[6]);
            let pulse_width = u16::from(frame[7]) << 8 | u16::from(frame[8]);
            let mut fields = device_fields(subtype, seqnbr);
            fields.insert("data".into(), json!(format!("0x{data:06X}")));
            fields.insert("pulseWidth".into(), json!(pulse_width));
            fields.insert("rssi".into(), json!(frame[9] >> 4));
            Ok(device("lighting4", fields))
        }
        TYPE_CHIME1 => {
            if frame.len() < 8 {
                return Err(TransportError::InvalidPacket("short chime1"));
            }
            let id = u16::from(frame[4]) << 8 | u16::from(frame[5]);
            let mut fields = device_fields(subtype, seqnbr);
            fields.insert("id".into(), json!(format!("0x{id:04X}")));
            fields.insert("commandNumber".into(), json!(frame[6]));
            fields.insert("rssi".into(), json!(frame[7] >> 4));
            Ok(device("chime1", fields))
        }
        _ => Err(TransportError::InvalidPacket("unknown packet type")),
    }
}

fn device_fields(subtype: u8, seqnbr: u8) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("subtype".into(), json!(subtype));
    fields.insert("seqnbr".into(), json!(seqnbr));
    fields
}

fn device(protocol: &str, fields: Map<String, Value>) -> Received {
    Received::Device(DeviceEvent {
        protocol: protocol.to_string(),
        fields,
        timestamp: Some(Timestamp::now()),
    })
}

/// Uppercase hex dump used for trace logging.
pub fn hex(frame: &[u8]) -> String {
    frame
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
