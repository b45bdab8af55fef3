use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::command::{self, ServiceCall};
use crate::config::TopicConfig;
use crate::discovery::DiscoveryBuilder;
use crate::encoder::StateEncoder;
use crate::entity::{EntityId, StateSnapshot};
use crate::filter::EntityFilter;
use crate::mqtt::OutboundMessage;
use crate::registry::Registry;
use crate::topics::TopicMapper;
use crate::tracker::{DiscoveryRegistry, PublicationTracker};

/// Bus publish/subscribe primitives.
pub trait Transport {
    fn publish(&self, message: OutboundMessage) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn subscribe(&self, topic: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Hub service-call executor.
pub trait ServiceInvoker {
    fn call(&self, call: ServiceCall) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Hub <-> bus translation. The host feeds it state changes and inbound
/// command messages.
pub struct Bridge<T, S, R> {
    config: TopicConfig,
    topics: TopicMapper,
    filter: EntityFilter,
    encoder: StateEncoder,
    discovery: DiscoveryBuilder,
    tracker: PublicationTracker,
    registry: R,
    transport: T,
    services: S,
}

impl<T: Transport, S: ServiceInvoker, R: Registry> Bridge<T, S, R> {
    pub fn new(
        config: TopicConfig,
        filter: EntityFilter,
        publications: &Arc<DiscoveryRegistry>,
        registry: R,
        transport: T,
        services: S,
    ) -> Self {
        let topics = TopicMapper::new(&config);
        Self {
            encoder: StateEncoder::new(&config),
            discovery: DiscoveryBuilder::new(
                topics.clone(),
                &config.unique_prefix,
                filter.has_includes(),
            ),
            tracker: publications.tracker(&config.discovery_topic),
            topics,
            config,
            filter,
            registry,
            transport,
            services,
        }
    }

    /// Subscribe to command topics when discovery is enabled.
    pub async fn setup(&self) -> anyhow::Result<()> {
        if !self.config.publish_discovery {
            return Ok(());
        }
        for topic in self.topics.command_subscriptions() {
            self.transport
                .subscribe(&topic)
                .await
                .with_context(|| format!("Unable to subscribe to {}", topic))?;
        }
        Ok(())
    }

    /// The broker dropped the session; restore command subscriptions.
    pub async fn on_reconnect(&self) -> anyhow::Result<()> {
        if self.config.publish_discovery {
            info!("Reconnected to MQTT, restoring command subscriptions");
        }
        self.setup().await
    }

    /// Publish one entity state change. `None` means the entity was removed.
    pub async fn on_state_change(
        &self,
        entity_id: &EntityId,
        snapshot: Option<&StateSnapshot>,
    ) -> anyhow::Result<()> {
        let Some(snapshot) = snapshot else {
            return Ok(());
        };
        if !self.filter.matches(entity_id) {
            return Ok(());
        }

        for message in self.encoder.encode_details(entity_id, snapshot) {
            self.transport.publish(message).await?;
        }

        if self.config.publish_discovery {
            self.publish_discovery(entity_id, snapshot).await?;
        }

        for message in self.encoder.encode_state(entity_id, snapshot) {
            self.transport.publish(message).await?;
        }
        Ok(())
    }

    async fn publish_discovery(
        &self,
        entity_id: &EntityId,
        snapshot: &StateSnapshot,
    ) -> anyhow::Result<()> {
        if !self.discovery.is_discoverable(entity_id, snapshot) {
            return Ok(());
        }
        let Some(claim) = self.tracker.claim(entity_id).await else {
            return Ok(());
        };
        let Some(document) = self.discovery.build(entity_id, snapshot, &self.registry) else {
            return Ok(());
        };

        let payload = document.payload();
        debug!("Sending discovery payload to {}: {}", document.topic, payload);
        self.transport
            .publish(OutboundMessage::new(document.topic, payload))
            .await
            .with_context(|| format!("Unable to publish discovery config for {}", entity_id))?;
        claim.commit().await;
        info!("Published discovery config for {}", entity_id);
        Ok(())
    }

    /// Translate an inbound command message into a service call.
    ///
    /// Only entities already discovery-published or passing the filter are
    /// served; anything else is dropped quietly. Malformed commands are
    /// logged and dropped.
    pub async fn on_command(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        let target = match command::parse_topic(self.topics.base(), topic) {
            Ok(target) => target,
            Err(err) => {
                debug!("{}", err);
                return Ok(());
            }
        };

        if !self.tracker.is_published(&target.entity_id).await
            && !self.filter.matches(&target.entity_id)
        {
            debug!("Ignoring command for unknown entity {}", target.entity_id);
            return Ok(());
        }

        debug!(
            "Message received: topic {}; payload: {}",
            topic,
            String::from_utf8_lossy(payload)
        );
        match command::decode(&target, payload) {
            Ok(call) => {
                info!("Calling {}.{} for {}", call.domain, call.service, target.entity_id);
                self.services.call(call).await
            }
            Err(err) => {
                error!("{}", err);
                Ok(())
            }
        }
    }
}
