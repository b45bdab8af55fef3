//! Inbound command topics to hub service calls.
//!
//! `<base>/<domain>/<object_id>/set` carries `ON`, `OFF` or `press` (any
//! payload for scripts). `<base>/light/<object_id>/set_light` carries a
//! JSON-schema light command.

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::consts::{
    attr, ELEMENT_SET, ELEMENT_SET_LIGHT, PAYLOAD_OFF, PAYLOAD_ON, PAYLOAD_PRESS, SERVICE_PRESS,
    SERVICE_TURN_OFF, SERVICE_TURN_ON,
};
use crate::entity::{Domain, EntityId};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Topic is not a command topic: {0}")]
    UnsupportedTopic(String),

    #[error("Invalid service for \"set\" - payload: {payload} for {entity_id}")]
    InvalidSetPayload { entity_id: EntityId, payload: String },

    #[error("Invalid domain for \"set_light\" for {0}")]
    DomainMismatch(EntityId),

    #[error("Invalid JSON for \"set_light\" for {entity_id}: {source}")]
    InvalidJson {
        entity_id: EntityId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing state for \"set_light\" for {0}")]
    MissingState(EntityId),

    #[error("Invalid state for \"set_light\" - state: {state} for {entity_id}")]
    InvalidState { entity_id: EntityId, state: String },

    #[error("Invalid color for \"set_light\" for {0}")]
    InvalidColor(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Set,
    SetLight,
}

/// Entity and element addressed by a command topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTarget {
    pub entity_id: EntityId,
    pub element: Element,
}

/// Hub service invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub data: Map<String, Value>,
}

impl ServiceCall {
    fn for_entity(entity_id: &EntityId, service: &str) -> Self {
        let mut data = Map::new();
        data.insert(attr::ENTITY_ID.into(), json!(entity_id.to_string()));
        Self {
            domain: entity_id.domain().to_string(),
            service: service.to_string(),
            data,
        }
    }
}

/// Parse `<base><domain>/<object_id>/<element>`. `base` ends with `/`.
pub fn parse_topic(base: &str, topic: &str) -> Result<CommandTarget, CommandError> {
    let unsupported = || CommandError::UnsupportedTopic(topic.to_string());

    let rest = topic.strip_prefix(base).ok_or_else(unsupported)?;
    let parts: Vec<&str> = rest.split('/').collect();
    let [domain, object_id, element] = parts.as_slice() else {
        return Err(unsupported());
    };
    let element = match *element {
        ELEMENT_SET => Element::Set,
        ELEMENT_SET_LIGHT => Element::SetLight,
        _ => return Err(unsupported()),
    };
    let entity_id = EntityId::new(domain, object_id).map_err(|_| unsupported())?;

    Ok(CommandTarget { entity_id, element })
}

pub fn decode(target: &CommandTarget, payload: &[u8]) -> Result<ServiceCall, CommandError> {
    match target.element {
        Element::Set => decode_set(&target.entity_id, payload),
        Element::SetLight => decode_set_light(&target.entity_id, payload),
    }
}

fn decode_set(entity_id: &EntityId, payload: &[u8]) -> Result<ServiceCall, CommandError> {
    let text = String::from_utf8_lossy(payload);
    match text.as_ref() {
        PAYLOAD_ON => Ok(ServiceCall::for_entity(entity_id, SERVICE_TURN_ON)),
        PAYLOAD_OFF => Ok(ServiceCall::for_entity(entity_id, SERVICE_TURN_OFF)),
        PAYLOAD_PRESS => Ok(ServiceCall::for_entity(entity_id, SERVICE_PRESS)),
        // Scripts run as a service named after themselves.
        _ if entity_id.kind() == Domain::Script => Ok(ServiceCall {
            domain: entity_id.domain().to_string(),
            service: entity_id.object_id().to_string(),
            data: Map::new(),
        }),
        other => Err(CommandError::InvalidSetPayload {
            entity_id: entity_id.clone(),
            payload: other.to_string(),
        }),
    }
}

fn decode_set_light(entity_id: &EntityId, payload: &[u8]) -> Result<ServiceCall, CommandError> {
    if entity_id.kind() != Domain::Light {
        return Err(CommandError::DomainMismatch(entity_id.clone()));
    }

    let command: Value =
        serde_json::from_slice(payload).map_err(|source| CommandError::InvalidJson {
            entity_id: entity_id.clone(),
            source,
        })?;
    let state = command
        .get(attr::STATE)
        .ok_or_else(|| CommandError::MissingState(entity_id.clone()))?;

    let mut call = match state.as_str() {
        Some(PAYLOAD_ON) => ServiceCall::for_entity(entity_id, SERVICE_TURN_ON),
        Some(PAYLOAD_OFF) => ServiceCall::for_entity(entity_id, SERVICE_TURN_OFF),
        _ => {
            return Err(CommandError::InvalidState {
                entity_id: entity_id.clone(),
                state: state.to_string(),
            })
        }
    };

    if let Some(transition) = command.get(attr::TRANSITION) {
        call.data.insert(attr::TRANSITION.into(), transition.clone());
    }
    if call.service == SERVICE_TURN_OFF {
        return Ok(call);
    }

    for key in [attr::BRIGHTNESS, attr::COLOR_TEMP] {
        if let Some(value) = command.get(key) {
            call.data.insert(key.into(), value.clone());
        }
    }
    if let Some(color) = command.get(attr::COLOR) {
        let color = color
            .as_object()
            .ok_or_else(|| CommandError::InvalidColor(entity_id.clone()))?;
        if let Some((key, value)) = color_parameter(color) {
            call.data.insert(key.into(), value);
        }
    }
    if let Some(effect) = command.get(attr::EFFECT) {
        call.data.insert(attr::EFFECT.into(), effect.clone());
    }

    Ok(call)
}

/// First complete color representation: hs, then xy, then rgb.
fn color_parameter(color: &Map<String, Value>) -> Option<(&'static str, Value)> {
    let pick = |keys: &[&str]| -> Option<Value> {
        keys.iter()
            .map(|key| color.get(*key).cloned())
            .collect::<Option<Vec<Value>>>()
            .map(Value::Array)
    };

    if let Some(hs) = pick(&[attr::H, attr::S]) {
        return Some((attr::HS_COLOR, hs));
    }
    if let Some(xy) = pick(&[attr::X, attr::Y]) {
        return Some((attr::XY_COLOR, xy));
    }
    pick(&[attr::R, attr::G, attr::B]).map(|rgb| (attr::RGB_COLOR, rgb))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(topic: &str) -> CommandTarget {
        parse_topic("home/", topic).unwrap()
    }

    fn decode_str(topic: &str, payload: &str) -> Result<ServiceCall, CommandError> {
        decode(&target(topic), payload.as_bytes())
    }

    #[test]
    fn test_parse_topic() {
        let parsed = target("home/switch/pump/set");
        assert_eq!(parsed.entity_id.to_string(), "switch.pump");
        assert_eq!(parsed.element, Element::Set);

        let parsed = target("home/light/desk/set_light");
        assert_eq!(parsed.entity_id.to_string(), "light.desk");
        assert_eq!(parsed.element, Element::SetLight);
    }

    #[test]
    fn test_parse_topic_rejects_foreign_topics() {
        for topic in [
            "other/switch/pump/set",
            "home/switch/pump/state",
            "home/switch/pump",
            "home/switch/pump/set/extra",
            "home//pump/set",
        ] {
            assert!(
                matches!(parse_topic("home/", topic), Err(CommandError::UnsupportedTopic(_))),
                "{}",
                topic
            );
        }
    }

    #[test]
    fn test_set_on_off_press() {
        let call = decode_str("home/switch/pump/set", "ON").unwrap();
        assert_eq!(call.domain, "switch");
        assert_eq!(call.service, "turn_on");
        assert_eq!(Value::Object(call.data), json!({"entity_id": "switch.pump"}));

        let call = decode_str("home/input_boolean/guest/set", "OFF").unwrap();
        assert_eq!(call.domain, "input_boolean");
        assert_eq!(call.service, "turn_off");

        let call = decode_str("home/button/restart/set", "press").unwrap();
        assert_eq!(call.service, "press");
        assert_eq!(Value::Object(call.data), json!({"entity_id": "button.restart"}));
    }

    #[test]
    fn test_set_script_any_payload() {
        let call = decode_str("home/script/good_night/set", "script.good_night").unwrap();
        assert_eq!(call.domain, "script");
        assert_eq!(call.service, "good_night");
        assert!(call.data.is_empty());
    }

    #[test]
    fn test_set_invalid_payload() {
        let err = decode_str("home/switch/pump/set", "toggle").unwrap_err();
        assert!(matches!(err, CommandError::InvalidSetPayload { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid service for \"set\" - payload: toggle for switch.pump"
        );
    }

    #[test]
    fn test_set_light_hs() {
        let call = decode_str(
            "home/light/desk/set_light",
            r#"{"state":"ON","color":{"h":10,"s":20},"brightness":5}"#,
        )
        .unwrap();
        assert_eq!(call.service, "turn_on");
        assert_eq!(
            Value::Object(call.data.clone()),
            json!({"entity_id": "light.desk", "brightness": 5, "hs_color": [10, 20]})
        );
        assert!(!call.data.contains_key("xy_color"));
        assert!(!call.data.contains_key("rgb_color"));
    }

    #[test]
    fn test_set_light_color_precedence() {
        let call = decode_str(
            "home/light/desk/set_light",
            r#"{"state":"ON","color":{"r":1,"g":2,"b":3,"x":0.1,"y":0.2}}"#,
        )
        .unwrap();
        assert_eq!(call.data["xy_color"], json!([0.1, 0.2]));
        assert!(!call.data.contains_key("rgb_color"));

        let call = decode_str(
            "home/light/desk/set_light",
            r#"{"state":"ON","color":{"r":1,"g":2,"b":3}}"#,
        )
        .unwrap();
        assert_eq!(call.data["rgb_color"], json!([1, 2, 3]));

        let call = decode_str(
            "home/light/desk/set_light",
            r#"{"state":"ON","color":{"h":1}}"#,
        )
        .unwrap();
        assert_eq!(Value::Object(call.data), json!({"entity_id": "light.desk"}));
    }

    #[test]
    fn test_set_light_full_on() {
        let call = decode_str(
            "home/light/desk/set_light",
            r#"{"state":"ON","transition":2,"color_temp":300,"effect":"rainbow","brightness":9}"#,
        )
        .unwrap();
        assert_eq!(
            serde_json::to_string(&call.data).unwrap(),
            r#"{"entity_id":"light.desk","transition":2,"brightness":9,"color_temp":300,"effect":"rainbow"}"#
        );
    }

    #[test]
    fn test_set_light_off() {
        let call = decode_str(
            "home/light/desk/set_light",
            r#"{"state":"OFF","transition":1.5,"brightness":9}"#,
        )
        .unwrap();
        assert_eq!(call.service, "turn_off");
        assert_eq!(
            Value::Object(call.data),
            json!({"entity_id": "light.desk", "transition": 1.5})
        );
    }

    #[test]
    fn test_set_light_errors() {
        assert!(matches!(
            decode_str("home/switch/pump/set_light", r#"{"state":"ON"}"#),
            Err(CommandError::DomainMismatch(_))
        ));
        assert!(matches!(
            decode_str("home/light/desk/set_light", "ON"),
            Err(CommandError::InvalidJson { .. })
        ));
        assert!(matches!(
            decode_str("home/light/desk/set_light", r#"{"brightness":1}"#),
            Err(CommandError::MissingState(_))
        ));
        assert!(matches!(
            decode_str("home/light/desk/set_light", r#"{"state":"TOGGLE"}"#),
            Err(CommandError::InvalidState { .. })
        ));
        assert!(matches!(
            decode_str("home/light/desk/set_light", r#"{"state":"ON","color":"red"}"#),
            Err(CommandError::InvalidColor(_))
        ));
    }
}
