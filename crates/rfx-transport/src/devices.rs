use crate::{Result, Timestamp, TransportError};
use serde_json::{Map, Value};

/// A decoded radio event from a device, e.g. a remote being pressed.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceEvent {
    /// Protocol family the packet belongs to (`lighting2`, `lighting4`, ...).
    pub protocol: String,
    pub fields: Map<String, Value>,
    pub timestamp: Option<Timestamp>,
}

pub type InvokeFn = fn(&DeviceHandle, &str, Option<&Value>) -> Result<Transmission>;

/// One callable function of a device class.
#[derive(Debug)]
pub struct DeviceFunction {
    pub name: &'static str,
    pub invoke: InvokeFn,
}

/// A family of devices the transceiver knows how to address.
#[derive(Debug)]
pub struct DeviceClass {
    pub name: &'static str,
    /// Protocol name used for events received from this family.
    pub protocol: &'static str,
    pub subtypes: &'static [(&'static str, u8)],
    pub functions: &'static [DeviceFunction],
}

impl DeviceClass {
    pub fn function(&self, name: &str) -> Option<&DeviceFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &'static str> {
        self.functions.iter().map(|f| f.name)
    }

    /// Accepts a numeric code, a subtype name (`"AC"`), or a numeric string (`"0x01"`).
    pub fn resolve_subtype(&self, sub_type: &Value) -> Result<u8> {
        let code = match sub_type {
            Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
            Value::String(s) => {
                let s = s.trim();
                self.subtypes
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(s))
                    .map(|(_, code)| *code)
                    .or_else(|| parse_number(s).and_then(|v| u8::try_from(v).ok()))
            }
            _ => None,
        };
        match code {
            Some(c) if self.subtypes.iter().any(|(_, known)| *known == c) => Ok(c),
            _ => Err(TransportError::InvalidSubType {
                device_type: self.name,
                sub_type: sub_type.to_string(),
            }),
        }
    }

    pub fn construct(&'static self, sub_type: &Value, options: Option<Value>) -> Result<DeviceHandle> {
        let sub_type = self.resolve_subtype(sub_type)?;
        Ok(DeviceHandle {
            class: self,
            sub_type,
            options,
        })
    }
}

/// A device class bound to a subtype and construction options.
#[derive(Clone, Debug)]
pub struct DeviceHandle {
    class: &'static DeviceClass,
    sub_type: u8,
    options: Option<Value>,
}

impl DeviceHandle {
    pub fn class(&self) -> &'static DeviceClass {
        self.class
    }

    pub fn sub_type(&self) -> u8 {
        self.sub_type
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.as_ref().and_then(|o| o.get(key))
    }

    /// Build the packet for `function` addressed to `device_id`.
    pub fn invoke(
        &self,
        function: &str,
        device_id: &str,
        value: Option<&Value>,
    ) -> Result<Transmission> {
        let f = self
            .class
            .function(function)
            .ok_or_else(|| TransportError::UnknownFunction {
                device_type: self.class.name.to_string(),
                function: function.to_string(),
            })?;
        (f.invoke)(self, device_id, value)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lighting1Command {
    Off,
    On,
    Dim,
    Bright,
    AllOff,
    AllOn,
    Chime,
}

impl Lighting1Command {
    pub fn code(self) -> u8 {
        match self {
            Lighting1Command::Off => 0x00,
            Lighting1Command::On => 0x01,
            Lighting1Command::Dim => 0x02,
            Lighting1Command::Bright => 0x03,
            Lighting1Command::AllOff => 0x05,
            Lighting1Command::AllOn => 0x06,
            Lighting1Command::Chime => 0x07,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Lighting1Command::Off),
            0x01 => Some(Lighting1Command::On),
            0x02 => Some(Lighting1Command::Dim),
            0x03 => Some(Lighting1Command::Bright),
            0x05 => Some(Lighting1Command::AllOff),
            0x06 => Some(Lighting1Command::AllOn),
            0x07 => Some(Lighting1Command::Chime),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Lighting1Command::Off => "Off",
            Lighting1Command::On => "On",
            Lighting1Command::Dim => "Dim",
            Lighting1Command::Bright => "Bright",
            Lighting1Command::AllOff => "All Off",
            Lighting1Command::AllOn => "All On",
            Lighting1Command::Chime => "Chime",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lighting2Command {
    Off,
    On,
    SetLevel,
    GroupOff,
    GroupOn,
    SetGroupLevel,
}

impl Lighting2Command {
    pub fn code(self) -> u8 {
        match self {
            Lighting2Command::Off => 0x00,
            Lighting2Command::On => 0x01,
            Lighting2Command::SetLevel => 0x02,
            Lighting2Command::GroupOff => 0x03,
            Lighting2Command::GroupOn => 0x04,
            Lighting2Command::SetGroupLevel => 0x05,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Lighting2Command::Off),
            0x01 => Some(Lighting2Command::On),
            0x02 => Some(Lighting2Command::SetLevel),
            0x03 => Some(Lighting2Command::GroupOff),
            0x04 => Some(Lighting2Command::GroupOn),
            0x05 => Some(Lighting2Command::SetGroupLevel),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Lighting2Command::Off => "Off",
            Lighting2Command::On => "On",
            Lighting2Command::SetLevel => "Set Level",
            Lighting2Command::GroupOff => "Group Off",
            Lighting2Command::GroupOn => "Group On",
            Lighting2Command::SetGroupLevel => "Set Group Level",
        }
    }
}

/// A fully addressed packet ready to be framed and sent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Transmission {
    Lighting1 {
        sub_type: u8,
        house_code: char,
        unit_code: u8,
        command: Lighting1Command,
    },
    Lighting2 {
        sub_type: u8,
        id: u32,
        unit_code: u8,
        command: Lighting2Command,
        level: u8,
    },
    Lighting4 {
        sub_type: u8,
        data: u32,
        pulse_width: u16,
    },
    Chime1 {
        sub_type: u8,
        id: u16,
        sound: u8,
    },
}

impl Transmission {
    pub fn family(&self) -> &'static str {
        match self {
            Transmission::Lighting1 { .. } => "Lighting1",
            Transmission::Lighting2 { .. } => "Lighting2",
            Transmission::Lighting4 { .. } => "Lighting4",
            Transmission::Chime1 { .. } => "Chime1",
        }
    }
}

pub static DEVICE_CLASSES: &[DeviceClass] = &[
    DeviceClass {
        name: "Lighting1",
        protocol: "lighting1",
        subtypes: &[
            ("X10", 0x00),
            ("ARC", 0x01),
            ("ELRO", 0x02),
            ("WAVEMAN", 0x03),
            ("CHACON", 0x04),
            ("IMPULS", 0x05),
            ("RISING_SUN", 0x06),
            ("PHILIPS_SBC", 0x07),
            ("ENERGENIE", 0x08),
            ("ENERGENIE_5_GANG", 0x09),
            ("COCO", 0x0A),
        ],
        functions: &[
            DeviceFunction {
                name: "switchOn",
                invoke: lighting1_switch_on,
            },
            DeviceFunction {
                name: "switchOff",
                invoke: lighting1_switch_off,
            },
            DeviceFunction {
                name: "increaseLevel",
                invoke: lighting1_bright,
            },
            DeviceFunction {
                name: "decreaseLevel",
                invoke: lighting1_dim,
            },
            DeviceFunction {
                name: "chime",
                invoke: lighting1_chime,
            },
        ],
    },
    DeviceClass {
        name: "Lighting2",
        protocol: "lighting2",
        subtypes: &[
            ("AC", 0x00),
            ("HOMEEASY_EU", 0x01),
            ("ANSLUT", 0x02),
            ("KAMBROOK", 0x03),
        ],
        functions: &[
            DeviceFunction {
                name: "switchOn",
                invoke: lighting2_switch_on,
            },
            DeviceFunction {
                name: "switchOff",
                invoke: lighting2_switch_off,
            },
            DeviceFunction {
                name: "setLevel",
                invoke: lighting2_set_level,
            },
        ],
    },
    DeviceClass {
        name: "Lighting4",
        protocol: "lighting4",
        subtypes: &[("PT2262", 0x00)],
        functions: &[DeviceFunction {
            name: "sendData",
            invoke: lighting4_send_data,
        }],
    },
    DeviceClass {
        name: "Chime1",
        protocol: "chime1",
        subtypes: &[
            ("BYRON_SX", 0x00),
            ("BYRON_MP001", 0x01),
            ("SELECT_PLUS", 0x02),
            ("SELECT_PLUS3", 0x03),
            ("ENVIVO", 0x04),
        ],
        functions: &[DeviceFunction {
            name: "chime",
            invoke: chime1_chime,
        }],
    },
];

const LIGHTING4_DEFAULT_PULSE_WIDTH: u16 = 350;
const CHIME1_DEFAULT_SOUND: u8 = 0x01;

pub(crate) fn parse_number(s: &str) -> Option<u32> {
    let t = s.trim();
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        t.parse::<u32>().ok()
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_number(s).map(u64::from),
        _ => None,
    }
}

fn bad_id(device_type: &'static str, id: &str) -> TransportError {
    TransportError::InvalidDeviceId {
        device_type,
        id: id.to_string(),
    }
}

// Lighting1 addresses are a house code letter and a unit, e.g. "A/1" or "A1".
fn parse_lighting1_id(id: &str) -> Result<(char, u8)> {
    let mut chars = id.trim().chars();
    let house = chars
        .next()
        .ok_or_else(|| bad_id("Lighting1", id))?
        .to_ascii_uppercase();
    if !('A'..='P').contains(&house) {
        return Err(bad_id("Lighting1", id));
    }
    let unit: u8 = chars
        .as_str()
        .trim_start_matches('/')
        .parse()
        .map_err(|_| bad_id("Lighting1", id))?;
    if unit > 16 {
        return Err(bad_id("Lighting1", id));
    }
    Ok((house, unit))
}

fn lighting1(handle: &DeviceHandle, id: &str, command: Lighting1Command) -> Result<Transmission> {
    let (house_code, unit_code) = parse_lighting1_id(id)?;
    Ok(Transmission::Lighting1 {
        sub_type: handle.sub_type,
        house_code,
        unit_code,
        command,
    })
}

fn lighting1_switch_on(handle: &DeviceHandle, id: &str, _: Option<&Value>) -> Result<Transmission> {
    let (_, unit) = parse_lighting1_id(id)?;
    let cmd = if unit == 0 {
        Lighting1Command::AllOn
    } else {
        Lighting1Command::On
    };
    lighting1(handle, id, cmd)
}

fn lighting1_switch_off(handle: &DeviceHandle, id: &str, _: Option<&Value>) -> Result<Transmission> {
    let (_, unit) = parse_lighting1_id(id)?;
    let cmd = if unit == 0 {
        Lighting1Command::AllOff
    } else {
        Lighting1Command::Off
    };
    lighting1(handle, id, cmd)
}

fn lighting1_bright(handle: &DeviceHandle, id: &str, _: Option<&Value>) -> Result<Transmission> {
    lighting1(handle, id, Lighting1Command::Bright)
}

fn lighting1_dim(handle: &DeviceHandle, id: &str, _: Option<&Value>) -> Result<Transmission> {
    lighting1(handle, id, Lighting1Command::Dim)
}

fn lighting1_chime(handle: &DeviceHandle, id: &str, _: Option<&Value>) -> Result<Transmission> {
    lighting1(handle, id, Lighting1Command::Chime)
}

// Lighting2 addresses are a 26-bit id and a unit, e.g. "0x0101ABCD/1". Unit 0 is the group.
fn parse_lighting2_id(id: &str) -> Result<(u32, u8)> {
    let (raw_id, raw_unit) = id.trim().split_once('/').ok_or_else(|| bad_id("Lighting2", id))?;
    let device = parse_number(raw_id)
        .filter(|v| *v <= 0x03FF_FFFF)
        .ok_or_else(|| bad_id("Lighting2", id))?;
    let unit = raw_unit
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|u| *u <= 16)
        .ok_or_else(|| bad_id("Lighting2", id))?;
    Ok((device, unit))
}

fn lighting2(
    handle: &DeviceHandle,
    id: &str,
    single: Lighting2Command,
    group: Lighting2Command,
    level: u8,
) -> Result<Transmission> {
    let (device, unit_code) = parse_lighting2_id(id)?;
    Ok(Transmission::Lighting2 {
        sub_type: handle.sub_type,
        id: device,
        unit_code,
        command: if unit_code == 0 { group } else { single },
        level,
    })
}

fn lighting2_switch_on(handle: &DeviceHandle, id: &str, _: Option<&Value>) -> Result<Transmission> {
    lighting2(handle, id, Lighting2Command::On, Lighting2Command::GroupOn, 0)
}

fn lighting2_switch_off(handle: &DeviceHandle, id: &str, _: Option<&Value>) -> Result<Transmission> {
    lighting2(handle, id, Lighting2Command::Off, Lighting2Command::GroupOff, 0)
}

fn lighting2_set_level(
    handle: &DeviceHandle,
    id: &str,
    value: Option<&Value>,
) -> Result<Transmission> {
    let level = value
        .and_then(value_as_u64)
        .filter(|l| *l <= 0x0F)
        .ok_or_else(|| {
            TransportError::InvalidValue(format!(
                "setLevel needs a level between 0 and 15, got {}",
                value.map(|v| v.to_string()).unwrap_or_else(|| "nothing".into())
            ))
        })?;
    lighting2(
        handle,
        id,
        Lighting2Command::SetLevel,
        Lighting2Command::SetGroupLevel,
        level as u8,
    )
}

fn lighting4_send_data(
    handle: &DeviceHandle,
    id: &str,
    value: Option<&Value>,
) -> Result<Transmission> {
    let data = parse_number(id)
        .filter(|d| *d <= 0x00FF_FFFF)
        .ok_or_else(|| bad_id("Lighting4", id))?;
    let pulse_width = match value.or_else(|| handle.option("pulseWidth")) {
        Some(v) => value_as_u64(v)
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| TransportError::InvalidValue(format!("pulse width {v}")))?,
        None => LIGHTING4_DEFAULT_PULSE_WIDTH,
    };
    Ok(Transmission::Lighting4 {
        sub_type: handle.sub_type,
        data,
        pulse_width,
    })
}

fn chime1_chime(handle: &DeviceHandle, id: &str, value: Option<&Value>) -> Result<Transmission> {
    let device = parse_number(id)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| bad_id("Chime1", id))?;
    let sound = match value.or_else(|| handle.option("sound")) {
        Some(v) => value_as_u64(v)
            .and_then(|s| u8::try_from(s).ok())
            .ok_or_else(|| TransportError::InvalidValue(format!("chime sound {v}")))?,
        None => CHIME1_DEFAULT_SOUND,
    };
    Ok(Transmission::Chime1 {
        sub_type: handle.sub_type,
        id: device,
        sound,
    })
}
