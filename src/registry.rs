//! Read-only entity and device registry lookups.
//!
//! Discovery documents carry the device an entity belongs to and the entity's
//! display name. Both come from the hub's registries; the bridge only reads
//! them.

use serde::Deserialize;
use std::collections::HashMap;

use crate::entity::EntityId;

/// Entity registry entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityEntry {
    pub entity_id: EntityId,
    #[serde(default)]
    pub device_id: Option<String>,
    /// Name set by the user.
    #[serde(default)]
    pub name: Option<String>,
    /// Name provided by the integration.
    #[serde(default)]
    pub original_name: Option<String>,
}

/// Device registry entry.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceEntry {
    pub id: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sw_version: Option<String>,
    /// `(integration, identifier)` pairs.
    #[serde(default)]
    pub identifiers: Vec<(String, String)>,
    /// `(connection type, value)` pairs, e.g. `("mac", "aa:bb:..")`.
    #[serde(default)]
    pub connections: Vec<(String, String)>,
}

pub trait Registry {
    fn entity(&self, entity_id: &EntityId) -> Option<&EntityEntry>;
    fn device(&self, device_id: &str) -> Option<&DeviceEntry>;
}

/// Registry snapshot loaded once at startup.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    entities: HashMap<EntityId, EntityEntry>,
    devices: HashMap<String, DeviceEntry>,
}

impl StaticRegistry {
    pub fn new(entities: Vec<EntityEntry>, devices: Vec<DeviceEntry>) -> Self {
        Self {
            entities: entities
                .into_iter()
                .map(|entry| (entry.entity_id.clone(), entry))
                .collect(),
            devices: devices
                .into_iter()
                .map(|device| (device.id.clone(), device))
                .collect(),
        }
    }
}

impl Registry for StaticRegistry {
    fn entity(&self, entity_id: &EntityId) -> Option<&EntityEntry> {
        self.entities.get(entity_id)
    }

    fn device(&self, device_id: &str) -> Option<&DeviceEntry> {
        self.devices.get(device_id)
    }
}
