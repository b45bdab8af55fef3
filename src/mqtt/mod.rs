mod connection;
mod message;

pub use connection::{Initiator, MqttTransport};
pub use message::{Inbound, InboundMessage, OutboundMessage};
