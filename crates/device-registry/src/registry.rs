use crate::types::DeviceConfigEntry;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("device entry {index} has an empty id")]
    EmptyId { index: usize },
    #[error("duplicate device id: {0}")]
    DuplicateId(String),
    #[error("duplicate friendly name: {0}")]
    DuplicateFriendlyName(String),
    #[error("device {0}: repetitions must be at least 1")]
    ZeroRepetitions(String),
}

/// Read-only list of configured devices.
///
/// Lookups are linear scans in configuration order; the first match wins.
#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    entries: Vec<DeviceConfigEntry>,
}

impl DeviceRegistry {
    /// Build a registry, rejecting duplicate ids or friendly names.
    pub fn new(entries: Vec<DeviceConfigEntry>) -> Result<Self, RegistryError> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for (index, entry) in entries.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(RegistryError::EmptyId { index });
            }
            if !ids.insert(entry.id.as_str()) {
                return Err(RegistryError::DuplicateId(entry.id.clone()));
            }
            if let Some(name) = &entry.friendly_name {
                if !names.insert(name.as_str()) {
                    return Err(RegistryError::DuplicateFriendlyName(name.clone()));
                }
            }
            if entry.repetitions == Some(0) {
                return Err(RegistryError::ZeroRepetitions(entry.id.clone()));
            }
        }
        tracing::debug!(devices = entries.len(), "device registry loaded");
        Ok(Self { entries })
    }

    pub fn find_by_id(&self, id: &str) -> Option<&DeviceConfigEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn find_by_friendly_name(&self, name: &str) -> Option<&DeviceConfigEntry> {
        self.entries
            .iter()
            .find(|e| e.friendly_name.as_deref() == Some(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceConfigEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
