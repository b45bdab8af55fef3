use super::{Inbound, InboundMessage, OutboundMessage};
use crate::bridge::Transport;
use rumqttc::{AsyncClient, ConnectionError, EventLoop, MqttOptions, QoS};
use rumqttc::{Event, Packet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;

use tracing::{debug, error, info, warn};

/// Connected, but not yet pumping the event loop.
pub struct Initiator {
    client: AsyncClient,
    event_loop: EventLoop,
}

/// Publishing half handed to the bridge.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

impl Initiator {
    /// Connect to the broker. Fails when the first connection attempt fails.
    pub async fn new(
        id: &str,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> anyhow::Result<Self> {
        let mut mqttoptions = MqttOptions::new(id, host, port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if !username.is_empty() {
            mqttoptions.set_credentials(username, password);
        }

        let (client, mut event_loop) = AsyncClient::new(mqttoptions, 10);

        // Fail early if parameters are invalid.
        if let Err(err) = event_loop.poll().await {
            warn!("Initial connection to MQTT failed. Check connection parameters");
            anyhow::bail!("Unable to contact MQTT at {}:{}: {}", host, port, err);
        }
        info!("Connected to MQTT at {}:{}", host, port);

        Ok(Initiator { client, event_loop })
    }

    async fn receiver(mut event_loop: EventLoop, queue: mpsc::Sender<Inbound>) {
        loop {
            let notification = event_loop.poll().await;
            let inbound = match route(&notification) {
                Route::Forward(inbound) => inbound,
                Route::Ignore => continue,
                Route::Retry => {
                    // The next poll reconnects.
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };
            if let Err(err) = queue.send(inbound).await {
                error!(
                    "Error while sending received message to queue: {:?}. Quitting loop",
                    err
                );
                return;
            }
        }
    }

    /// Spawn the event loop. Inbound publishes and reconnects arrive on the
    /// returned queue.
    pub fn start(self) -> (MqttTransport, mpsc::Receiver<Inbound>) {
        let (in_sender, in_receiver) = mpsc::channel::<Inbound>(10);
        task::spawn(Self::receiver(self.event_loop, in_sender));

        (
            MqttTransport {
                client: self.client,
            },
            in_receiver,
        )
    }
}

#[derive(Debug, PartialEq)]
enum Route {
    Forward(Inbound),
    Ignore,
    Retry,
}

/// The initial ConnAck is consumed by `Initiator::new`, so any ConnAck seen
/// here follows a reconnect.
fn route(notification: &Result<Event, ConnectionError>) -> Route {
    match notification {
        Ok(Event::Incoming(Packet::Publish(msg))) => {
            debug!("RX message to {} with payload '{:?}'", msg.topic, msg.payload);
            Route::Forward(Inbound::Message(InboundMessage {
                topic: msg.topic.clone(),
                payload: msg.payload.to_vec(),
            }))
        }
        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
            info!("MQTT session re-established: {:?}", ack);
            Route::Forward(Inbound::Reconnected)
        }
        Ok(Event::Outgoing(_))
        | Ok(Event::Incoming(Packet::PingResp))
        | Ok(Event::Incoming(Packet::SubAck(_)))
        | Ok(Event::Incoming(Packet::PubAck(_))) => {
            // Silence common messages
            Route::Ignore
        }
        Err(err) => {
            warn!("MQTT connection error: {}", err);
            Route::Retry
        }
        Ok(other) => {
            info!("Received other message = {:?}", other);
            Route::Ignore
        }
    }
}

impl Transport for MqttTransport {
    async fn publish(&self, message: OutboundMessage) -> anyhow::Result<()> {
        debug!("Publishing to {}: {}", message.topic, message.payload);
        self.client
            .publish(message.topic, message.qos, message.retain, message.payload)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> anyhow::Result<()> {
        info!("Subscribing to {}", topic);
        self.client.subscribe(topic, QoS::AtMostOnce).await?;
        Ok(())
    }
}
