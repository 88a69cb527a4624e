use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("interface not found: {0}")]
    InterfaceNotFound(String),
    #[error("operation not supported on this backend: {0}")]
    Unsupported(&'static str),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("timeout")]
    Timeout,
    #[error("invalid packet: {0}")]
    InvalidPacket(&'static str),
    #[error("unknown device type: {0}")]
    UnknownDeviceType(String),
    #[error("{device_type} has no function {function}")]
    UnknownFunction {
        device_type: String,
        function: String,
    },
    #[error("invalid subtype {sub_type} for {device_type}")]
    InvalidSubType {
        device_type: &'static str,
        sub_type: String,
    },
    #[error("invalid {device_type} device id: {id}")]
    InvalidDeviceId {
        device_type: &'static str,
        id: String,
    },
    #[error("invalid value: {0}")]
    InvalidValue(String),
}
