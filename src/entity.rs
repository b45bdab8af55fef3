use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::consts::{attr, STATE_UNAVAILABLE, STATE_UNKNOWN};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("Entity id has no domain separator: {0}")]
    MissingSeparator(String),

    #[error("Entity id has an empty domain or object id: {0}")]
    EmptyPart(String),
}

/// Hub entity address, `domain.object_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    pub fn new(domain: &str, object_id: &str) -> Result<Self, EntityIdError> {
        if domain.is_empty() || object_id.is_empty() {
            return Err(EntityIdError::EmptyPart(format!("{}.{}", domain, object_id)));
        }
        Ok(Self {
            domain: domain.to_string(),
            object_id: object_id.to_string(),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn kind(&self) -> Domain {
        Domain::from(self.domain.as_str())
    }

    /// `living_room_lamp` -> `Living Room Lamp`. A letter is upper-cased
    /// when it follows a non-letter: `wi-fi_2nd` -> `Wi-Fi 2Nd`.
    pub fn title(&self) -> String {
        let mut title = String::with_capacity(self.object_id.len());
        let mut after_letter = false;
        for c in self.object_id.chars() {
            let c = if c == '_' { ' ' } else { c };
            let cased = c.is_lowercase() || c.is_uppercase();
            if cased && !after_letter {
                title.extend(c.to_uppercase());
            } else {
                title.extend(c.to_lowercase());
            }
            after_letter = cased;
        }
        title
    }
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, object_id) = s
            .split_once('.')
            .ok_or_else(|| EntityIdError::MissingSeparator(s.to_string()))?;
        Self::new(domain, object_id)
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

/// Entity domains the bridge knows how to describe. Everything else is
/// `Other` and only ever gets raw state publication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Domain {
    Sensor,
    BinarySensor,
    Switch,
    InputBoolean,
    DeviceTracker,
    Light,
    Button,
    InputButton,
    Script,
    Other(String),
}

impl Domain {
    pub fn as_str(&self) -> &str {
        match self {
            Domain::Sensor => "sensor",
            Domain::BinarySensor => "binary_sensor",
            Domain::Switch => "switch",
            Domain::InputBoolean => "input_boolean",
            Domain::DeviceTracker => "device_tracker",
            Domain::Light => "light",
            Domain::Button => "button",
            Domain::InputButton => "input_button",
            Domain::Script => "script",
            Domain::Other(name) => name,
        }
    }

    /// Component name used in discovery topics.
    pub fn discovery_component(&self) -> &str {
        match self {
            Domain::InputBoolean => "switch",
            Domain::Script | Domain::InputButton => "button",
            other => other.as_str(),
        }
    }

    /// Domains accepting commands, in subscription order.
    pub fn commandable() -> [Domain; 6] {
        [
            Domain::Switch,
            Domain::Light,
            Domain::InputBoolean,
            Domain::Button,
            Domain::Script,
            Domain::InputButton,
        ]
    }
}

impl From<&str> for Domain {
    fn from(value: &str) -> Self {
        match value {
            "sensor" => Domain::Sensor,
            "binary_sensor" => Domain::BinarySensor,
            "switch" => Domain::Switch,
            "input_boolean" => Domain::InputBoolean,
            "device_tracker" => Domain::DeviceTracker,
            "light" => Domain::Light,
            "button" => Domain::Button,
            "input_button" => Domain::InputButton,
            "script" => Domain::Script,
            other => Domain::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entity state as reported by the hub.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StateSnapshot {
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,
}

impl StateSnapshot {
    pub fn new(state: &str, attributes: Map<String, Value>) -> Self {
        Self {
            state: state.to_string(),
            attributes,
            last_updated: None,
            last_changed: None,
        }
    }

    /// True for the unavailable/unknown sentinels and an empty state.
    pub fn is_unavailable(&self) -> bool {
        self.state.is_empty() || self.state == STATE_UNAVAILABLE || self.state == STATE_UNKNOWN
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Light feature bitmask; missing or non-numeric reads as none.
    pub fn supported_features(&self) -> u64 {
        self.attribute(attr::SUPPORTED_FEATURES)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_entity_id() {
        let id: EntityId = "light.living_room".parse().unwrap();
        assert_eq!(id.domain(), "light");
        assert_eq!(id.object_id(), "living_room");
        assert_eq!(id.kind(), Domain::Light);
        assert_eq!(id.to_string(), "light.living_room");
    }

    #[test]
    fn test_parse_entity_id_splits_on_first_dot() {
        let id: EntityId = "sensor.outdoor.temp".parse().unwrap();
        assert_eq!(id.domain(), "sensor");
        assert_eq!(id.object_id(), "outdoor.temp");
    }

    #[test]
    fn test_parse_entity_id_invalid() {
        assert!(matches!(
            "nodot".parse::<EntityId>(),
            Err(EntityIdError::MissingSeparator(_))
        ));
        assert!(matches!(
            ".lamp".parse::<EntityId>(),
            Err(EntityIdError::EmptyPart(_))
        ));
        assert!(matches!(
            "light.".parse::<EntityId>(),
            Err(EntityIdError::EmptyPart(_))
        ));
    }

    #[test]
    fn test_title() {
        let id: EntityId = "switch.garden_pump".parse().unwrap();
        assert_eq!(id.title(), "Garden Pump");
        let id: EntityId = "sensor.CPU_temp".parse().unwrap();
        assert_eq!(id.title(), "Cpu Temp");
        let id: EntityId = "sensor.2nd_floor".parse().unwrap();
        assert_eq!(id.title(), "2Nd Floor");
        let id: EntityId = "sensor.wi-fi_signal".parse().unwrap();
        assert_eq!(id.title(), "Wi-Fi Signal");
    }

    #[test]
    fn test_discovery_component() {
        assert_eq!(Domain::InputBoolean.discovery_component(), "switch");
        assert_eq!(Domain::Script.discovery_component(), "button");
        assert_eq!(Domain::InputButton.discovery_component(), "button");
        assert_eq!(Domain::Light.discovery_component(), "light");
        assert_eq!(Domain::from("climate").discovery_component(), "climate");
    }

    #[test]
    fn test_snapshot_deserialize() {
        let snapshot: StateSnapshot = serde_json::from_value(json!({
            "state": "on",
            "attributes": {"brightness": 128, "supported_features": 5},
            "last_updated": "2024-01-02T03:04:05Z"
        }))
        .unwrap();
        assert_eq!(snapshot.state, "on");
        assert_eq!(snapshot.supported_features(), 5);
        assert!(snapshot.last_updated.is_some());
        assert!(snapshot.last_changed.is_none());
        assert!(!snapshot.is_unavailable());
    }

    #[test]
    fn test_snapshot_unavailable() {
        assert!(StateSnapshot::new("unavailable", Map::new()).is_unavailable());
        assert!(StateSnapshot::new("unknown", Map::new()).is_unavailable());
        assert!(StateSnapshot::new("", Map::new()).is_unavailable());
        assert!(!StateSnapshot::new("off", Map::new()).is_unavailable());
    }
}
