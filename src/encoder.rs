use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::config::TopicConfig;
use crate::consts::{attr, AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE, STATE_ON};
use crate::entity::{Domain, EntityId, StateSnapshot};
use crate::mqtt::OutboundMessage;
use crate::topics::TopicMapper;

/// Turns hub state snapshots into retained bus messages.
#[derive(Debug, Clone)]
pub struct StateEncoder {
    topics: TopicMapper,
    publish_attributes: bool,
    publish_timestamps: bool,
    publish_discovery: bool,
}

impl StateEncoder {
    pub fn new(config: &TopicConfig) -> Self {
        Self {
            topics: TopicMapper::new(config),
            publish_attributes: config.publish_attributes,
            publish_timestamps: config.publish_timestamps,
            publish_discovery: config.publish_discovery,
        }
    }

    /// Timestamp and per-attribute messages, sent before any discovery
    /// config.
    pub fn encode_details(
        &self,
        entity_id: &EntityId,
        snapshot: &StateSnapshot,
    ) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();

        if self.publish_timestamps {
            if let Some(updated) = snapshot.last_updated {
                messages.push(OutboundMessage::new(
                    self.topics.element(entity_id, "last_updated"),
                    isoformat(&updated),
                ));
            }
            if let Some(changed) = snapshot.last_changed {
                messages.push(OutboundMessage::new(
                    self.topics.element(entity_id, "last_changed"),
                    isoformat(&changed),
                ));
            }
        }

        if self.publish_attributes {
            for (key, value) in &snapshot.attributes {
                match serde_json::to_string(value) {
                    Ok(encoded) => messages.push(OutboundMessage::new(
                        self.topics.element(entity_id, key),
                        encoded,
                    )),
                    Err(err) => warn!("Skipping attribute {} of {}: {}", key, entity_id, err),
                }
            }
        }

        messages
    }

    /// State, attributes and availability messages.
    pub fn encode_state(
        &self,
        entity_id: &EntityId,
        snapshot: &StateSnapshot,
    ) -> Vec<OutboundMessage> {
        if !self.publish_discovery {
            return vec![OutboundMessage::new(
                self.topics.state(entity_id),
                snapshot.state.clone(),
            )];
        }

        let availability = self.topics.availability(entity_id);
        if snapshot.is_unavailable() {
            return vec![OutboundMessage::new(availability, AVAILABILITY_OFFLINE)];
        }

        let mut messages = Vec::with_capacity(3);
        if entity_id.kind() == Domain::Light {
            messages.push(OutboundMessage::new(
                self.topics.state(entity_id),
                light_state(snapshot).to_string(),
            ));
        } else {
            messages.push(OutboundMessage::new(
                self.topics.state(entity_id),
                snapshot.state.clone(),
            ));
            messages.push(OutboundMessage::new(
                self.topics.attributes(entity_id),
                Value::Object(snapshot.attributes.clone()).to_string(),
            ));
        }
        messages.push(OutboundMessage::new(availability, AVAILABILITY_ONLINE));
        messages
    }

    /// Every message for one snapshot, in publish order, discovery aside.
    #[cfg(test)]
    fn encode(&self, entity_id: &EntityId, snapshot: &StateSnapshot) -> Vec<OutboundMessage> {
        let mut messages = self.encode_details(entity_id, snapshot);
        messages.extend(self.encode_state(entity_id, snapshot));
        messages
    }
}

/// `2024-05-06T07:08:09+00:00`, with microseconds only when non-zero.
fn isoformat(timestamp: &DateTime<Utc>) -> String {
    let precision = if timestamp.timestamp_subsec_micros() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    timestamp.to_rfc3339_opts(precision, false)
}

/// Non-empty array attribute.
fn color_components<'a>(snapshot: &'a StateSnapshot, key: &str) -> Option<&'a Vec<Value>> {
    snapshot
        .attribute(key)
        .and_then(Value::as_array)
        .filter(|components| !components.is_empty())
}

/// JSON-schema light state: `{state, brightness?, color_mode?, color_temp?,
/// effect?, color?}`.
fn light_state(snapshot: &StateSnapshot) -> Value {
    let mut payload = Map::new();
    let on = snapshot.state == STATE_ON;
    payload.insert(attr::STATE.into(), json!(if on { "ON" } else { "OFF" }));

    for key in [attr::BRIGHTNESS, attr::COLOR_MODE, attr::COLOR_TEMP, attr::EFFECT] {
        if let Some(value) = snapshot.attribute(key) {
            payload.insert(key.into(), value.clone());
        }
    }

    // hs, xy, rgb in that order; normally only one is set.
    let mut color = Map::new();
    let component =
        |components: &Vec<Value>, idx: usize| components.get(idx).cloned().unwrap_or(Value::Null);
    if let Some(hs) = color_components(snapshot, attr::HS_COLOR) {
        color.insert(attr::H.into(), component(hs, 0));
        color.insert(attr::S.into(), component(hs, 1));
    }
    if let Some(xy) = color_components(snapshot, attr::XY_COLOR) {
        color.insert(attr::X.into(), component(xy, 0));
        color.insert(attr::Y.into(), component(xy, 1));
    }
    if let Some(rgb) = color_components(snapshot, attr::RGB_COLOR) {
        color.insert(attr::R.into(), component(rgb, 0));
        color.insert(attr::G.into(), component(rgb, 1));
        color.insert(attr::B.into(), component(rgb, 2));
    }
    if !color.is_empty() {
        payload.insert(attr::COLOR.into(), Value::Object(color));
    }

    Value::Object(payload)
}
