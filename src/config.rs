use serde::Deserialize;
use std::fs::File;
use std::path::Path;

use crate::consts;
use crate::registry::{DeviceEntry, EntityEntry};

/// Include or exclude half of the entity filter.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterRules {
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub entity_globs: Vec<String>,
}

impl FilterRules {
    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.entities.is_empty() && self.entity_globs.is_empty()
    }
}

/// Hub registry contents served to the discovery builder.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    #[serde(default)]
    pub entities: Vec<EntityEntry>,
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub base_topic: String,
    #[serde(default)]
    pub discovery_topic: Option<String>,
    #[serde(default)]
    pub publish_attributes: bool,
    #[serde(default)]
    pub publish_timestamps: bool,
    #[serde(default)]
    pub publish_discovery: bool,
    #[serde(default = "default_unique_prefix", alias = "unique_id_prefix")]
    pub unique_prefix: String,
    #[serde(default)]
    pub include: FilterRules,
    #[serde(default)]
    pub exclude: FilterRules,
    #[serde(default)]
    pub registry: RegistryConfig,
}

fn default_unique_prefix() -> String {
    consts::DEFAULT_UNIQUE_PREFIX.to_string()
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(filename: P) -> anyhow::Result<Self> {
        let handle = File::open(filename)?;
        let data: Config = serde_yaml::from_reader(handle)?;
        data.validate()?;

        Ok(data)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let data: Config = serde_yaml::from_str(raw)?;
        data.validate()?;
        Ok(data)
    }

    fn validate(&self) -> anyhow::Result<()> {
        validate_publish_topic("base_topic", &self.base_topic)?;
        if let Some(discovery) = &self.discovery_topic {
            validate_publish_topic("discovery_topic", discovery)?;
        }
        Ok(())
    }

    pub fn topics(&self) -> TopicConfig {
        TopicConfig::new(
            &self.base_topic,
            self.discovery_topic.as_deref(),
            &self.unique_prefix,
        )
        .with_attributes(self.publish_attributes)
        .with_timestamps(self.publish_timestamps)
        .with_discovery(self.publish_discovery)
    }
}

fn validate_publish_topic(option: &str, topic: &str) -> anyhow::Result<()> {
    if topic.is_empty() {
        anyhow::bail!("{} must not be empty", option);
    }
    if topic.contains(['+', '#']) {
        anyhow::bail!("{} must not contain MQTT wildcards: {}", option, topic);
    }
    Ok(())
}

/// Topic prefixes and feature switches, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    /// Always ends with `/`.
    pub base_topic: String,
    /// Always ends with `/`.
    pub discovery_topic: String,
    pub unique_prefix: String,
    pub publish_attributes: bool,
    pub publish_timestamps: bool,
    pub publish_discovery: bool,
}

impl TopicConfig {
    /// Discovery prefix falls back to the base topic.
    pub fn new(base_topic: &str, discovery_topic: Option<&str>, unique_prefix: &str) -> Self {
        let discovery = discovery_topic
            .filter(|topic| !topic.is_empty())
            .unwrap_or(base_topic);
        Self {
            base_topic: with_separator(base_topic),
            discovery_topic: with_separator(discovery),
            unique_prefix: unique_prefix.to_string(),
            publish_attributes: false,
            publish_timestamps: false,
            publish_discovery: false,
        }
    }

    pub fn with_attributes(mut self, enabled: bool) -> Self {
        self.publish_attributes = enabled;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.publish_timestamps = enabled;
        self
    }

    pub fn with_discovery(mut self, enabled: bool) -> Self {
        self.publish_discovery = enabled;
        self
    }
}

fn with_separator(prefix: &str) -> String {
    if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_normalization() {
        let plain = TopicConfig::new("home", None, "mqtt");
        let slashed = TopicConfig::new("home/", None, "mqtt");
        assert_eq!(plain, slashed);
        assert_eq!(plain.base_topic, "home/");
        assert_eq!(plain.discovery_topic, "home/");
    }

    #[test]
    fn test_discovery_prefix() {
        let topics = TopicConfig::new("home", Some("homeassistant"), "mqtt");
        assert_eq!(topics.discovery_topic, "homeassistant/");
        let topics = TopicConfig::new("home", Some(""), "mqtt");
        assert_eq!(topics.discovery_topic, "home/");
    }

    #[test]
    fn test_parse_minimal() {
        let config = Config::from_yaml("base_topic: home").unwrap();
        assert_eq!(config.unique_prefix, "mqtt");
        assert!(!config.publish_discovery);
        assert!(config.include.is_empty());
        let topics = config.topics();
        assert_eq!(topics.base_topic, "home/");
        assert!(!topics.publish_attributes);
    }

    #[test]
    fn test_parse_full() {
        let raw = r#"
base_topic: home
discovery_topic: homeassistant
publish_attributes: true
publish_timestamps: true
publish_discovery: true
unique_id_prefix: bridge
include:
  domains: [light]
  entity_globs: ["sensor.*_temp"]
exclude:
  entities: [light.porch]
registry:
  entities:
    - entity_id: light.kitchen
      device_id: dev1
      name: Kitchen
  devices:
    - id: dev1
      manufacturer: Acme
      identifiers: [["hue", "abc"]]
      connections: [["mac", "00:11"]]
"#;
        let config = Config::from_yaml(raw).unwrap();
        assert_eq!(config.unique_prefix, "bridge");
        assert_eq!(config.include.domains, vec!["light"]);
        assert_eq!(config.exclude.entities, vec!["light.porch"]);
        assert_eq!(config.registry.entities.len(), 1);
        assert_eq!(config.registry.devices[0].identifiers[0].1, "abc");
        let topics = config.topics();
        assert!(topics.publish_discovery && topics.publish_timestamps && topics.publish_attributes);
        assert_eq!(topics.discovery_topic, "homeassistant/");
    }

    #[test]
    fn test_rejects_wildcards_and_unknown_keys() {
        assert!(Config::from_yaml("base_topic: home/#").is_err());
        assert!(Config::from_yaml("base_topic: ''").is_err());
        assert!(Config::from_yaml("base_topic: home\nbogus: 1").is_err());
        assert!(Config::from_yaml("publish_discovery: true").is_err());
    }
}
