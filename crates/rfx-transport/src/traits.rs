use crate::{PortInfo, Received, Result, StatusEvent, Transmission};

#[derive(Clone, Debug, Default)]
pub struct OpenOptions {
    /// Dump every frame at trace level.
    pub debug: bool,
}

/// A minimal blocking RFXtrx transceiver interface.
pub trait Transceiver: Send {
    /// Open a transceiver by port path (e.g., "/dev/ttyUSB0").
    fn open(path: &str, options: &OpenOptions) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available ports for this backend.
    fn list() -> Result<Vec<PortInfo>>
    where
        Self: Sized;

    /// Reset the interface and read back its status. Must succeed before use.
    fn initialise(&mut self) -> Result<StatusEvent>;

    /// Query the interface status.
    fn request_status(&mut self) -> Result<StatusEvent>;

    /// Send one packet. Delivery is not acknowledged here.
    fn transmit(&mut self, tx: &Transmission) -> Result<()>;

    /// Receive one packet (blocking with optional timeout in milliseconds).
    /// `Ok(None)` means nothing usable arrived.
    fn recv(&mut self, timeout_ms: Option<u64>) -> Result<Option<Received>>;
}
