use rfx_transport::{DeviceClass, DEVICE_CLASSES};
use std::collections::HashMap;

/// Device types the transceiver exposes and the functions each supports.
///
/// Built once at startup; a pure predicate for the translator.
#[derive(Debug, Clone)]
pub struct CapabilityCatalog {
    classes: HashMap<&'static str, &'static DeviceClass>,
}

impl CapabilityCatalog {
    pub fn new(classes: &'static [DeviceClass]) -> Self {
        Self {
            classes: classes.iter().map(|c| (c.name, c)).collect(),
        }
    }

    /// Catalog of everything `rfx-transport` can drive.
    pub fn rfxcom() -> Self {
        Self::new(DEVICE_CLASSES)
    }

    pub fn is_known_device_type(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn has_function(&self, device_type: &str, function: &str) -> bool {
        self.classes
            .get(device_type)
            .is_some_and(|c| c.function(function).is_some())
    }

    pub fn class(&self, name: &str) -> Option<&'static DeviceClass> {
        self.classes.get(name).copied()
    }

    /// Device type names, sorted.
    pub fn device_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.classes.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for CapabilityCatalog {
    fn default() -> Self {
        Self::rfxcom()
    }
}
