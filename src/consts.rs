/// Software version
pub const BRIDGE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const BRIDGE_NAME: &str = "mqtt-discoverystream";

pub const DEFAULT_UNIQUE_PREFIX: &str = "mqtt";

/// Hub state sentinels.
pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";
pub const STATE_UNAVAILABLE: &str = "unavailable";
pub const STATE_UNKNOWN: &str = "unknown";

/// Availability payloads.
pub const AVAILABILITY_ONLINE: &str = "online";
pub const AVAILABILITY_OFFLINE: &str = "offline";

/// Command payloads on `.../set`.
pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";
pub const PAYLOAD_PRESS: &str = "press";

/// Hub service names.
pub const SERVICE_TURN_ON: &str = "turn_on";
pub const SERVICE_TURN_OFF: &str = "turn_off";
pub const SERVICE_PRESS: &str = "press";

/// Command topic elements.
pub const ELEMENT_SET: &str = "set";
pub const ELEMENT_SET_LIGHT: &str = "set_light";

/// Hub attribute names used by the bridge.
pub mod attr {
    pub const ENTITY_ID: &str = "entity_id";
    pub const FRIENDLY_NAME: &str = "friendly_name";
    pub const ICON: &str = "icon";
    pub const DEVICE_CLASS: &str = "device_class";
    pub const UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";
    pub const STATE_CLASS: &str = "state_class";
    pub const SUPPORTED_FEATURES: &str = "supported_features";

    pub const BRIGHTNESS: &str = "brightness";
    pub const COLOR_MODE: &str = "color_mode";
    pub const COLOR_TEMP: &str = "color_temp";
    pub const EFFECT: &str = "effect";
    pub const EFFECT_LIST: &str = "effect_list";
    pub const SUPPORTED_COLOR_MODES: &str = "supported_color_modes";
    pub const HS_COLOR: &str = "hs_color";
    pub const XY_COLOR: &str = "xy_color";
    pub const RGB_COLOR: &str = "rgb_color";
    pub const TRANSITION: &str = "transition";

    /// Keys of the structured light state / command JSON.
    pub const STATE: &str = "state";
    pub const COLOR: &str = "color";
    pub const H: &str = "h";
    pub const S: &str = "s";
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const R: &str = "r";
    pub const G: &str = "g";
    pub const B: &str = "b";
}

/// Legacy light supported-features bitmask.
pub mod light_feature {
    pub const BRIGHTNESS: u64 = 1;
    pub const EFFECT: u64 = 4;
}
