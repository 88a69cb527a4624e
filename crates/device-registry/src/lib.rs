//! device-registry: configured overrides for radio devices, keyed by id and friendly name

mod types;
pub use types::*;

mod registry;
pub use registry::{DeviceRegistry, RegistryError};
