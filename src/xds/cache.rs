//! # Snapshot Cache
//!
//! Holds the current immutable snapshot for every label. Each label owns a
//! slot with its own publish lock and a `watch` channel, so publishes to one
//! label are serialized while different labels publish concurrently, and
//! readers always observe a whole snapshot.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{watch, Mutex};
use tracing::info;

use crate::domain::{Cluster, EndpointAssignment, Label, Listener, RouteConfiguration};

/// Immutable resource set distributed to one label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub label: Label,
    pub version: u64,
    pub listeners: Vec<Listener>,
    pub route_configurations: Vec<RouteConfiguration>,
    pub clusters: Vec<Cluster>,
    pub endpoints: Vec<EndpointAssignment>,
}

impl Snapshot {
    /// Legal version-0 snapshot served before anything is published
    pub fn empty(label: Label) -> Self {
        Self {
            label,
            version: 0,
            listeners: Vec::new(),
            route_configurations: Vec::new(),
            clusters: Vec::new(),
            endpoints: Vec::new(),
        }
    }

    pub fn version_info(&self) -> String {
        self.version.to_string()
    }

    pub fn route_count(&self) -> usize {
        self.route_configurations.iter().map(|config| config.routes().len()).sum()
    }
}

/// Resources handed to [`SnapshotCache::publish`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishSet {
    pub listeners: Vec<Listener>,
    pub route_configurations: Vec<RouteConfiguration>,
    pub clusters: Vec<Cluster>,
    pub endpoints: Vec<EndpointAssignment>,
}

#[derive(Debug)]
struct LabelSlot {
    publish_lock: Mutex<()>,
    sender: watch::Sender<Arc<Snapshot>>,
}

impl LabelSlot {
    fn new(label: &Label) -> Self {
        let (sender, _) = watch::channel(Arc::new(Snapshot::empty(label.clone())));
        Self { publish_lock: Mutex::new(()), sender }
    }
}

/// Label-keyed store of current snapshots
#[derive(Debug, Default)]
pub struct SnapshotCache {
    slots: DashMap<Label, Arc<LabelSlot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, label: &Label) -> Arc<LabelSlot> {
        self.slots
            .entry(label.clone())
            .or_insert_with(|| Arc::new(LabelSlot::new(label)))
            .value()
            .clone()
    }

    /// Replace the label's snapshot with `set` at the next version
    pub async fn publish(&self, label: &Label, set: PublishSet) -> Arc<Snapshot> {
        let slot = self.slot(label);
        let _guard = slot.publish_lock.lock().await;

        let version = slot.sender.borrow().version + 1;
        let snapshot = Arc::new(Snapshot {
            label: label.clone(),
            version,
            listeners: set.listeners,
            route_configurations: set.route_configurations,
            clusters: set.clusters,
            endpoints: set.endpoints,
        });

        slot.sender.send_replace(snapshot.clone());

        info!(
            label = %label,
            version,
            clusters = snapshot.clusters.len(),
            routes = snapshot.route_count(),
            subscribers = slot.sender.receiver_count(),
            "Published snapshot"
        );

        snapshot
    }

    /// Current snapshot; an unseen label starts at an empty version 0
    pub fn snapshot(&self, label: &Label) -> Arc<Snapshot> {
        let slot = self.slot(label);
        let current = slot.sender.borrow().clone();
        current
    }

    pub fn subscribe(&self, label: &Label) -> watch::Receiver<Arc<Snapshot>> {
        // Subscribe under the entry guard so `release` sees the receiver.
        self.slots
            .entry(label.clone())
            .or_insert_with(|| Arc::new(LabelSlot::new(label)))
            .sender
            .subscribe()
    }

    /// Forget a label that was never published to and has no subscribers.
    ///
    /// Proxies may name any label; this keeps the map bounded by the labels
    /// actually deployed plus those with connected proxies.
    pub fn release(&self, label: &Label) -> bool {
        self.slots
            .remove_if(label, |_, slot| {
                Arc::strong_count(slot) == 1
                    && slot.sender.receiver_count() == 0
                    && slot.sender.borrow().version == 0
            })
            .is_some()
    }

    pub fn labels(&self) -> Vec<Label> {
        let mut labels: Vec<Label> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        labels.sort();
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClusterEndpoint;
    use std::time::Duration;

    fn label(raw: &str) -> Label {
        Label::parse(raw).unwrap()
    }

    fn set_with_cluster(name: &str) -> PublishSet {
        let cluster = Cluster {
            name: name.to_string(),
            endpoints: vec![ClusterEndpoint::new("10.0.0.1", 8080)],
            tls: false,
            sni: None,
            connect_timeout: Duration::from_secs(5),
        };
        PublishSet {
            endpoints: vec![cluster.assignment()],
            clusters: vec![cluster],
            ..PublishSet::default()
        }
    }

    #[tokio::test]
    async fn unseen_label_starts_empty_at_zero() {
        let cache = SnapshotCache::new();
        let snapshot = cache.snapshot(&label("edge"));
        assert_eq!(snapshot.version, 0);
        assert!(snapshot.clusters.is_empty());
        assert_eq!(cache.labels(), vec![label("edge")]);
    }

    #[tokio::test]
    async fn versions_increase_per_label() {
        let cache = SnapshotCache::new();
        let edge = label("edge");
        let internal = label("internal");

        assert_eq!(cache.publish(&edge, PublishSet::default()).await.version, 1);
        assert_eq!(cache.publish(&edge, set_with_cluster("a")).await.version, 2);
        assert_eq!(cache.publish(&internal, PublishSet::default()).await.version, 1);

        let current = cache.snapshot(&edge);
        assert_eq!(current.version, 2);
        assert_eq!(current.clusters[0].name, "a");
    }

    #[tokio::test]
    async fn publish_fully_supersedes_previous_snapshot() {
        let cache = SnapshotCache::new();
        let edge = label("edge");

        cache.publish(&edge, set_with_cluster("a")).await;
        cache.publish(&edge, PublishSet::default()).await;

        assert!(cache.snapshot(&edge).clusters.is_empty());
    }

    #[tokio::test]
    async fn subscribers_are_woken_with_whole_snapshot() {
        let cache = SnapshotCache::new();
        let edge = label("edge");
        let mut receiver = cache.subscribe(&edge);
        assert_eq!(receiver.borrow_and_update().version, 0);

        cache.publish(&edge, set_with_cluster("a")).await;

        receiver.changed().await.unwrap();
        let seen = receiver.borrow_and_update().clone();
        assert_eq!(seen.version, 1);
        assert_eq!(seen.endpoints.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_publishes_never_reuse_a_version() {
        let cache = Arc::new(SnapshotCache::new());
        let edge = label("edge");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let edge = edge.clone();
                tokio::spawn(async move { cache.publish(&edge, PublishSet::default()).await.version })
            })
            .collect();

        let mut versions = Vec::new();
        for handle in handles {
            versions.push(handle.await.unwrap());
        }
        versions.sort_unstable();

        assert_eq!(versions, (1..=16).collect::<Vec<_>>());
        assert_eq!(cache.snapshot(&edge).version, 16);
    }

    #[tokio::test]
    async fn release_drops_only_unpublished_unwatched_labels() {
        let cache = SnapshotCache::new();
        let ghost = label("ghost");
        let edge = label("edge");

        let receiver = cache.subscribe(&ghost);
        assert!(!cache.release(&ghost));
        drop(receiver);
        assert!(cache.release(&ghost));
        assert!(cache.labels().is_empty());

        cache.publish(&edge, PublishSet::default()).await;
        assert!(!cache.release(&edge));
        assert_eq!(cache.labels(), vec![edge.clone()]);
        assert_eq!(cache.snapshot(&edge).version, 1);
    }
}
