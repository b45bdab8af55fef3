//! Entity id to topic mapping.
//!
//! Layout under the base prefix:
//! `<base>/<domain>/<object_id>/{state,attributes,availability,set,set_light}`
//! Discovery configs go to
//! `<discovery>/<component>/<object_id>/config`.

use crate::config::TopicConfig;
use crate::consts::{ELEMENT_SET, ELEMENT_SET_LIGHT};
use crate::entity::{Domain, EntityId};

#[derive(Debug, Clone)]
pub struct TopicMapper {
    base: String,
    discovery: String,
}

impl TopicMapper {
    pub fn new(config: &TopicConfig) -> Self {
        Self {
            base: config.base_topic.clone(),
            discovery: config.discovery_topic.clone(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn entity_base(&self, entity_id: &EntityId) -> String {
        format!(
            "{}{}/{}/",
            self.base,
            entity_id.domain(),
            entity_id.object_id()
        )
    }

    /// Per-attribute and timestamp topics: `<entity base><key>`.
    pub fn element(&self, entity_id: &EntityId, key: &str) -> String {
        format!("{}{}", self.entity_base(entity_id), key)
    }

    pub fn state(&self, entity_id: &EntityId) -> String {
        self.element(entity_id, "state")
    }

    pub fn attributes(&self, entity_id: &EntityId) -> String {
        self.element(entity_id, "attributes")
    }

    pub fn availability(&self, entity_id: &EntityId) -> String {
        self.element(entity_id, "availability")
    }

    /// Lights take structured JSON commands on `set_light`.
    pub fn command(&self, entity_id: &EntityId) -> String {
        let element = match entity_id.kind() {
            Domain::Light => ELEMENT_SET_LIGHT,
            _ => ELEMENT_SET,
        };
        self.element(entity_id, element)
    }

    pub fn discovery(&self, entity_id: &EntityId) -> String {
        format!(
            "{}{}/{}/config",
            self.discovery,
            entity_id.kind().discovery_component(),
            entity_id.object_id()
        )
    }

    /// Command topic filters to subscribe to.
    pub fn command_subscriptions(&self) -> Vec<String> {
        Domain::commandable()
            .iter()
            .map(|domain| {
                let element = match domain {
                    Domain::Light => ELEMENT_SET_LIGHT,
                    _ => ELEMENT_SET,
                };
                format!("{}{}/+/{}", self.base, domain, element)
            })
            .collect()
    }
}
