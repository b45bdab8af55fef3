//! Which entities already had their discovery config published.
//!
//! State lives for the process lifetime only, so configs are sent once per
//! start. Entries are grouped by discovery prefix.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::entity::EntityId;

#[derive(Debug, Default)]
struct Namespace {
    published: HashSet<EntityId>,
    /// Serializes first publication per entity.
    locks: HashMap<EntityId, Arc<Mutex<()>>>,
}

#[derive(Debug, Default)]
pub struct DiscoveryRegistry {
    namespaces: Mutex<HashMap<String, Namespace>>,
}

impl DiscoveryRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Handle scoped to one discovery prefix.
    pub fn tracker(self: &Arc<Self>, discovery_topic: &str) -> PublicationTracker {
        PublicationTracker {
            registry: self.clone(),
            namespace: discovery_topic.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublicationTracker {
    registry: Arc<DiscoveryRegistry>,
    namespace: String,
}

impl PublicationTracker {
    pub async fn is_published(&self, entity_id: &EntityId) -> bool {
        let namespaces = self.registry.namespaces.lock().await;
        namespaces
            .get(&self.namespace)
            .is_some_and(|ns| ns.published.contains(entity_id))
    }

    #[cfg(test)]
    pub(crate) async fn published_count(&self) -> usize {
        let namespaces = self.registry.namespaces.lock().await;
        namespaces
            .get(&self.namespace)
            .map_or(0, |ns| ns.published.len())
    }

    #[cfg(test)]
    pub(crate) async fn pending_claims(&self) -> usize {
        let namespaces = self.registry.namespaces.lock().await;
        namespaces.get(&self.namespace).map_or(0, |ns| ns.locks.len())
    }

    /// Enter the entity's critical section for a first publication.
    ///
    /// Returns `None` when the config is already published. Concurrent
    /// callers for the same entity wait here until the holder of the claim
    /// commits or drops it.
    pub async fn claim(&self, entity_id: &EntityId) -> Option<Claim> {
        let lock = {
            let mut namespaces = self.registry.namespaces.lock().await;
            let ns = namespaces.entry(self.namespace.clone()).or_default();
            if ns.published.contains(entity_id) {
                return None;
            }
            ns.locks.entry(entity_id.clone()).or_default().clone()
        };

        let guard = lock.lock_owned().await;
        if self.is_published(entity_id).await {
            return None;
        }

        Some(Claim {
            _guard: guard,
            tracker: self.clone(),
            entity_id: entity_id.clone(),
        })
    }
}

/// Exclusive right to publish one entity's discovery config. Dropping it
/// without `commit` leaves the entity unpublished.
#[derive(Debug)]
pub struct Claim {
    _guard: OwnedMutexGuard<()>,
    tracker: PublicationTracker,
    entity_id: EntityId,
}

impl Claim {
    /// Record a successful publish.
    pub async fn commit(self) {
        let mut namespaces = self.tracker.registry.namespaces.lock().await;
        let ns = namespaces.entry(self.tracker.namespace.clone()).or_default();
        ns.published.insert(self.entity_id.clone());
        ns.locks.remove(&self.entity_id);
    }
}
