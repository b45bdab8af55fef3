//! MQTT discovery config documents.
//!
//! config topic: <discovery_prefix>/<component>/<object_id>/config
//! Keys use the abbreviated discovery names (`stat_t`, `cmd_t`, ...).

use serde_json::{json, Map, Value};

use crate::consts::{attr, light_feature, PAYLOAD_PRESS, STATE_OFF, STATE_ON};
use crate::entity::{Domain, EntityId, StateSnapshot};
use crate::registry::{DeviceEntry, Registry};
use crate::topics::TopicMapper;

/// When a domain gets a config at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Always,
    /// Only with an include list configured or a `device_class` attribute.
    Annotated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payloads {
    None,
    OnOff,
    /// `pl_prs: "press"`
    Press,
    /// `pl_prs: <entity id>`
    PressEntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    None,
    Set,
    SetLight,
}

/// Per-domain shape of the discovery config.
#[derive(Debug)]
struct DomainSpec {
    domain: Domain,
    gate: Gate,
    attributes_topic: bool,
    payloads: Payloads,
    command: Command,
    light_capabilities: bool,
}

const fn spec(
    domain: Domain,
    gate: Gate,
    payloads: Payloads,
    command: Command,
) -> DomainSpec {
    let light = matches!(command, Command::SetLight);
    DomainSpec {
        domain,
        gate,
        attributes_topic: !light,
        payloads,
        command,
        light_capabilities: light,
    }
}

#[rustfmt::skip]
static DOMAIN_SPECS: [DomainSpec; 9] = [
    spec(Domain::Sensor,        Gate::Annotated, Payloads::None,          Command::None),
    spec(Domain::BinarySensor,  Gate::Annotated, Payloads::OnOff,         Command::None),
    spec(Domain::Switch,        Gate::Always,    Payloads::OnOff,         Command::Set),
    spec(Domain::InputBoolean,  Gate::Always,    Payloads::OnOff,         Command::Set),
    spec(Domain::DeviceTracker, Gate::Always,    Payloads::None,          Command::None),
    spec(Domain::Light,         Gate::Always,    Payloads::None,          Command::SetLight),
    spec(Domain::Button,        Gate::Always,    Payloads::Press,         Command::Set),
    spec(Domain::InputButton,   Gate::Always,    Payloads::Press,         Command::Set),
    spec(Domain::Script,        Gate::Always,    Payloads::PressEntityId, Command::Set),
];

fn domain_spec(domain: &Domain) -> Option<&'static DomainSpec> {
    DOMAIN_SPECS.iter().find(|spec| spec.domain == *domain)
}

/// Attributes copied verbatim into the config.
const PASSTHROUGH: [(&str, &str); 4] = [
    (attr::ICON, "ic"),
    (attr::DEVICE_CLASS, "dev_cla"),
    (attr::UNIT_OF_MEASUREMENT, "unit_of_meas"),
    (attr::STATE_CLASS, "stat_cla"),
];

/// A built config and the topic it belongs on.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryDocument {
    pub topic: String,
    pub config: Map<String, Value>,
}

impl DiscoveryDocument {
    pub fn payload(&self) -> String {
        Value::Object(self.config.clone()).to_string()
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryBuilder {
    topics: TopicMapper,
    unique_prefix: String,
    has_includes: bool,
}

impl DiscoveryBuilder {
    pub fn new(topics: TopicMapper, unique_prefix: &str, has_includes: bool) -> Self {
        Self {
            topics,
            unique_prefix: unique_prefix.to_string(),
            has_includes,
        }
    }

    fn gated_spec(
        &self,
        entity_id: &EntityId,
        snapshot: &StateSnapshot,
    ) -> Option<&'static DomainSpec> {
        let spec = domain_spec(&entity_id.kind())?;
        if spec.gate == Gate::Annotated
            && !self.has_includes
            && !snapshot.has_attribute(attr::DEVICE_CLASS)
        {
            return None;
        }
        Some(spec)
    }

    /// Whether `build` would produce a config for this snapshot.
    pub fn is_discoverable(&self, entity_id: &EntityId, snapshot: &StateSnapshot) -> bool {
        self.gated_spec(entity_id, snapshot).is_some()
    }

    /// Build the config, or `None` when the entity gets no discovery.
    pub fn build(
        &self,
        entity_id: &EntityId,
        snapshot: &StateSnapshot,
        registry: &dyn Registry,
    ) -> Option<DiscoveryDocument> {
        let spec = self.gated_spec(entity_id, snapshot)?;

        let mut config = Map::new();
        config.insert(
            "uniq_id".into(),
            json!(format!("{}_{}", self.unique_prefix, entity_id)),
        );
        config.insert("stat_t".into(), json!(self.topics.state(entity_id)));
        if spec.attributes_topic {
            config.insert("json_attr_t".into(), json!(self.topics.attributes(entity_id)));
        }
        config.insert("avty_t".into(), json!(self.topics.availability(entity_id)));

        for (attribute, key) in PASSTHROUGH {
            if let Some(value) = snapshot.attribute(attribute) {
                config.insert(key.into(), value.clone());
            }
        }

        match spec.payloads {
            Payloads::None => {}
            Payloads::OnOff => {
                config.insert("pl_off".into(), json!(STATE_OFF));
                config.insert("pl_on".into(), json!(STATE_ON));
            }
            Payloads::Press => {
                config.insert("pl_prs".into(), json!(PAYLOAD_PRESS));
            }
            Payloads::PressEntityId => {
                config.insert("pl_prs".into(), json!(entity_id.to_string()));
            }
        }

        if spec.command != Command::None {
            config.insert("cmd_t".into(), json!(self.topics.command(entity_id)));
        }

        if spec.light_capabilities {
            add_light_capabilities(&mut config, snapshot);
        }

        add_device_and_name(&mut config, entity_id, snapshot, registry);

        Some(DiscoveryDocument {
            topic: self.topics.discovery(entity_id),
            config,
        })
    }
}

fn add_light_capabilities(config: &mut Map<String, Value>, snapshot: &StateSnapshot) {
    config.insert("schema".into(), json!("json"));

    let features = snapshot.supported_features();
    if features & light_feature::BRIGHTNESS != 0 || snapshot.has_attribute(attr::BRIGHTNESS) {
        config.insert("brightness".into(), json!(true));
    }
    if features & light_feature::EFFECT != 0 {
        config.insert("effect".into(), json!(true));
    }
    if let Some(modes) = snapshot.attribute(attr::SUPPORTED_COLOR_MODES) {
        config.insert("color_mode".into(), json!(true));
        config.insert("supported_color_modes".into(), modes.clone());
        config.insert("brightness".into(), json!(true));
    }
    if let Some(effects) = snapshot.attribute(attr::EFFECT_LIST) {
        config.insert("effect".into(), json!(true));
        config.insert("fx_list".into(), effects.clone());
    }
}

fn device_block(device: &DeviceEntry) -> Map<String, Value> {
    let mut dev = Map::new();
    if let Some(manufacturer) = &device.manufacturer {
        dev.insert("mf".into(), json!(manufacturer));
    }
    if let Some(model) = &device.model {
        dev.insert("mdl".into(), json!(model));
    }
    if let Some(name) = &device.name {
        dev.insert("name".into(), json!(name));
    }
    if let Some(sw_version) = &device.sw_version {
        dev.insert("sw".into(), json!(sw_version));
    }
    if !device.identifiers.is_empty() {
        let ids: Vec<&str> = device
            .identifiers
            .iter()
            .map(|(_, id)| id.as_str())
            .collect();
        dev.insert("ids".into(), json!(ids));
    }
    if !device.connections.is_empty() {
        let connections: Vec<[&str; 2]> = device
            .connections
            .iter()
            .map(|(kind, value)| [kind.as_str(), value.as_str()])
            .collect();
        dev.insert("cns".into(), json!(connections));
    }
    dev
}

/// Device block from the registries, then the display name.
///
/// Registry entity: user name, original name, title-cased object id when
/// there is no device, otherwise `null` so the controller shows the device
/// name. Unregistered entity: `friendly_name`, else title-cased object id.
fn add_device_and_name(
    config: &mut Map<String, Value>,
    entity_id: &EntityId,
    snapshot: &StateSnapshot,
    registry: &dyn Registry,
) {
    let Some(entry) = registry.entity(entity_id) else {
        let name = snapshot
            .attribute(attr::FRIENDLY_NAME)
            .cloned()
            .unwrap_or_else(|| json!(entity_id.title()));
        config.insert("name".into(), name);
        return;
    };

    let device = entry
        .device_id
        .as_deref()
        .and_then(|device_id| registry.device(device_id));
    if let Some(device) = device {
        config.insert("dev".into(), Value::Object(device_block(device)));
    }

    let name = if let Some(name) = &entry.name {
        json!(name)
    } else if let Some(original) = &entry.original_name {
        json!(original)
    } else if device.is_none() {
        json!(entity_id.title())
    } else {
        Value::Null
    };
    config.insert("name".into(), name);
}
