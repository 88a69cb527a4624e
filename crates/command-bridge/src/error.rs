use rfx_transport::TransportError;
use thiserror::Error;

/// Why a single message was dropped. Processing continues with the next one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("topic {0} should start with rfxcom2mqtt")]
    WrongNamespace(String),
    #[error("topic {0} should start with rfxcom2mqtt/command")]
    NotACommand(String),
    #[error("topic {0} names no device type")]
    MissingDeviceType(String),
    #[error("topic {0} names no entity")]
    MissingEntity(String),
    #[error("topic {0} has too many segments")]
    TooManySegments(String),
    #[error("{0} is not a valid device")]
    UnknownDeviceType(String),
    #[error("payload is not a command object: {0}")]
    InvalidPayload(String),
    #[error("payload has no deviceFunction")]
    MissingFunction,
    #[error("{function} is not a valid device function on {device_type}")]
    UnknownFunction {
        device_type: String,
        function: String,
    },
    #[error("command cannot be built: {0}")]
    Unbuildable(TransportError),
    #[error("{protocol} event carries no device identifier")]
    MissingIdentifier { protocol: String },
    #[error("cannot encode payload: {0}")]
    Encoding(String),
}

/// Configuration or payload inconsistencies that halt command processing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FatalError {
    #[error("subType not found in message/payload or device config for {entity}")]
    MissingSubType { entity: String },
    #[error("device {entity} is configured with type {device_type}, which the transceiver does not provide")]
    UnknownConfiguredType { entity: String, device_type: String },
    #[error("transceiver link closed")]
    LinkClosed,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("transceiver link closed")]
    Closed,
    #[error("could not start link worker: {0}")]
    Spawn(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
