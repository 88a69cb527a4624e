//! rfx-transport: RFXtrx radio transceiver abstractions
//!
//! This crate exposes the device classes an RFXtrx interface can drive (with the
//! functions each class supports), a codec for the interface's binary packets, and
//! a `Transceiver` trait with feature-gated backends. The default build enables a
//! `mock` backend so that binaries can compile and run on any host without hardware.

mod types;
pub use types::{PortInfo, Received, StatusEvent, Timestamp};

mod error;
pub use error::{Result, TransportError};

mod devices;
pub use devices::{
    DeviceClass, DeviceEvent, DeviceFunction, DeviceHandle, Lighting1Command,
    Lighting2Command, Transmission, DEVICE_CLASSES,
};

pub mod packet;

mod traits;
pub use traits::{OpenOptions, Transceiver};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockHandle, MockTransceiver};

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialTransceiver;
