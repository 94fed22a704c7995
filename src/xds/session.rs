//! Per-stream ADS session state.
//!
//! A [`Session`] decides what to push and when. It tracks, per resource
//! type, the subscription, the requested names, the last sent
//! `(version, nonce)` and the last accepted version. At most one push is in
//! flight; the next one waits for the peer to echo its nonce or for the ACK
//! deadline to pass. Pending pushes drain in dependency order
//! (EDS, CDS, RDS, LDS).
//!
//! The state machine is synchronous and does no I/O; the stream driver feeds
//! it requests, snapshot versions and clock readings.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use envoy_types::pb::envoy::config::core::v3::Node;
use envoy_types::pb::envoy::service::discovery::v3::DiscoveryRequest;
use envoy_types::pb::google::protobuf::value::Kind;
use tokio::time::Instant;
use tracing::warn;

use crate::domain::Label;

use super::resources::ResourceType;

/// Node metadata key carrying the proxy's label
pub const NODE_LABEL_METADATA_KEY: &str = "label";

#[derive(Debug, Clone, PartialEq, Eq)]
struct SentResponse {
    version: u64,
    nonce: String,
}

#[derive(Debug, Default)]
struct TypeState {
    subscribed: bool,
    names: Vec<String>,
    last_sent: Option<SentResponse>,
    accepted: Option<u64>,
}

#[derive(Debug)]
struct InFlight {
    resource_type: ResourceType,
    nonce: String,
    sent_at: Instant,
}

/// What a discovery request meant to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// First request for a type; a push is queued
    Subscribed(ResourceType),
    Acked { resource_type: ResourceType, version: u64 },
    /// Rejected push; the accepted version is unchanged and the rejected one is not re-sent
    Nacked { resource_type: ResourceType, version: u64, message: String },
    /// Nonce does not match the last response of that type
    Stale(ResourceType),
    UnknownType(String),
}

#[derive(Debug)]
pub struct Session {
    label: Label,
    types: HashMap<ResourceType, TypeState>,
    queue: BTreeSet<ResourceType>,
    in_flight: Option<InFlight>,
}

impl Session {
    pub fn new(label: Label) -> Self {
        Self { label, types: HashMap::new(), queue: BTreeSet::new(), in_flight: None }
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn handle_request(&mut self, request: &DiscoveryRequest) -> RequestOutcome {
        let Some(resource_type) = ResourceType::from_type_url(&request.type_url) else {
            return RequestOutcome::UnknownType(request.type_url.clone());
        };

        let mut names = request.resource_names.clone();
        names.sort();
        names.dedup();

        let state = self.types.entry(resource_type).or_default();

        if request.response_nonce.is_empty() || !state.subscribed {
            state.subscribed = true;
            state.names = names;
            self.queue.insert(resource_type);
            return RequestOutcome::Subscribed(resource_type);
        }

        let version = match &state.last_sent {
            Some(sent) if sent.nonce == request.response_nonce => sent.version,
            _ => return RequestOutcome::Stale(resource_type),
        };

        if self.in_flight.as_ref().is_some_and(|in_flight| {
            in_flight.resource_type == resource_type && in_flight.nonce == request.response_nonce
        }) {
            self.in_flight = None;
        }

        let outcome = match &request.error_detail {
            Some(status) => RequestOutcome::Nacked {
                resource_type,
                version,
                message: status.message.clone(),
            },
            None => {
                state.accepted = Some(version);
                RequestOutcome::Acked { resource_type, version }
            }
        };

        if state.names != names {
            state.names = names;
            self.queue.insert(resource_type);
        }

        outcome
    }

    /// Queue every subscribed type not yet sent at `version`
    pub fn on_snapshot(&mut self, version: u64) {
        for (resource_type, state) in &self.types {
            let sent_version = state.last_sent.as_ref().map(|sent| sent.version);
            if state.subscribed && sent_version != Some(version) {
                self.queue.insert(*resource_type);
            }
        }
    }

    /// Next type to push, if nothing is awaiting acknowledgement
    pub fn next_push(&mut self) -> Option<ResourceType> {
        if self.in_flight.is_some() {
            return None;
        }
        self.queue.pop_first()
    }

    pub fn record_sent(&mut self, resource_type: ResourceType, version: u64, nonce: String, now: Instant) {
        let state = self.types.entry(resource_type).or_default();
        state.last_sent = Some(SentResponse { version, nonce: nonce.clone() });
        self.in_flight = Some(InFlight { resource_type, nonce, sent_at: now });
    }

    pub fn ack_deadline(&self, ack_timeout: Duration) -> Option<Instant> {
        self.in_flight.as_ref().map(|in_flight| in_flight.sent_at + ack_timeout)
    }

    /// Abandon the in-flight push so the queue can proceed
    pub fn expire_in_flight(&mut self) -> Option<ResourceType> {
        self.in_flight.take().map(|in_flight| in_flight.resource_type)
    }

    pub fn in_flight(&self) -> Option<ResourceType> {
        self.in_flight.as_ref().map(|in_flight| in_flight.resource_type)
    }

    pub fn requested_names(&self, resource_type: ResourceType) -> &[String] {
        self.types.get(&resource_type).map(|state| state.names.as_slice()).unwrap_or_default()
    }

    pub fn accepted_version(&self, resource_type: ResourceType) -> Option<u64> {
        self.types.get(&resource_type).and_then(|state| state.accepted)
    }

    pub fn last_sent_version(&self, resource_type: ResourceType) -> Option<u64> {
        self.types
            .get(&resource_type)
            .and_then(|state| state.last_sent.as_ref().map(|sent| sent.version))
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }
}

/// Resolve a proxy's label: node metadata `label`, else `node.cluster`, else the default label
pub fn label_from_node(node: Option<&Node>) -> Label {
    let Some(node) = node else {
        return Label::default_label();
    };

    let from_metadata = node.metadata.as_ref().and_then(|metadata| {
        match metadata.fields.get(NODE_LABEL_METADATA_KEY).and_then(|value| value.kind.as_ref()) {
            Some(Kind::StringValue(raw)) if !raw.trim().is_empty() => Some(raw.as_str()),
            _ => None,
        }
    });

    for candidate in [from_metadata, Some(node.cluster.as_str()).filter(|c| !c.trim().is_empty())]
        .into_iter()
        .flatten()
    {
        match Label::parse(candidate) {
            Ok(label) => return label,
            Err(err) => warn!(node_id = %node.id, candidate, error = %err, "Ignoring invalid node label"),
        }
    }

    Label::default_label()
}

#[cfg(test)]
mod tests {
    use super::*;
    use envoy_types::pb::google::protobuf::{Struct, Value};
    use envoy_types::pb::google::rpc::Status;

    fn request(resource_type: ResourceType, nonce: &str, names: &[&str]) -> DiscoveryRequest {
        DiscoveryRequest {
            type_url: resource_type.type_url().to_string(),
            response_nonce: nonce.to_string(),
            resource_names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    fn nack(resource_type: ResourceType, nonce: &str) -> DiscoveryRequest {
        DiscoveryRequest {
            error_detail: Some(Status { code: 3, message: "bad cluster".to_string(), details: vec![] }),
            ..request(resource_type, nonce, &[])
        }
    }

    fn session() -> Session {
        Session::new(Label::default_label())
    }

    #[test]
    fn first_requests_queue_in_dependency_order() {
        let mut session = session();
        session.handle_request(&request(ResourceType::Listener, "", &[]));
        session.handle_request(&request(ResourceType::Cluster, "", &[]));

        assert_eq!(session.next_push(), Some(ResourceType::Cluster));
        session.record_sent(ResourceType::Cluster, 0, "n1".into(), Instant::now());
        assert_eq!(session.next_push(), None, "one push in flight at a time");

        assert_eq!(
            session.handle_request(&request(ResourceType::Cluster, "n1", &[])),
            RequestOutcome::Acked { resource_type: ResourceType::Cluster, version: 0 }
        );
        assert_eq!(session.next_push(), Some(ResourceType::Listener));
    }

    #[test]
    fn snapshot_change_requeues_every_subscribed_type() {
        let mut session = session();
        for resource_type in ResourceType::DEPENDENCY_ORDER.iter().rev() {
            session.handle_request(&request(*resource_type, "", &[]));
        }

        let mut nonce = 0;
        while let Some(resource_type) = session.next_push() {
            nonce += 1;
            session.record_sent(resource_type, 0, nonce.to_string(), Instant::now());
            session.handle_request(&request(resource_type, &nonce.to_string(), &[]));
        }

        session.on_snapshot(1);
        let mut order = Vec::new();
        while let Some(resource_type) = session.next_push() {
            nonce += 1;
            session.record_sent(resource_type, 1, nonce.to_string(), Instant::now());
            session.handle_request(&request(resource_type, &nonce.to_string(), &[]));
            order.push(resource_type);
        }

        assert_eq!(order, ResourceType::DEPENDENCY_ORDER.to_vec());
        assert_eq!(session.accepted_version(ResourceType::Listener), Some(1));
    }

    #[test]
    fn nack_keeps_accepted_version_and_does_not_resend() {
        let mut session = session();
        session.handle_request(&request(ResourceType::Cluster, "", &[]));
        session.next_push();
        session.record_sent(ResourceType::Cluster, 1, "a".into(), Instant::now());
        session.handle_request(&request(ResourceType::Cluster, "a", &[]));

        session.on_snapshot(2);
        session.next_push();
        session.record_sent(ResourceType::Cluster, 2, "b".into(), Instant::now());

        let outcome = session.handle_request(&nack(ResourceType::Cluster, "b"));
        assert!(matches!(outcome, RequestOutcome::Nacked { version: 2, .. }));
        assert_eq!(session.accepted_version(ResourceType::Cluster), Some(1));
        assert_eq!(session.in_flight(), None);

        session.on_snapshot(2);
        assert_eq!(session.next_push(), None, "rejected version is not re-sent");

        session.on_snapshot(3);
        assert_eq!(session.next_push(), Some(ResourceType::Cluster));
    }

    #[test]
    fn stale_nonce_is_ignored() {
        let mut session = session();
        session.handle_request(&request(ResourceType::Cluster, "", &[]));
        session.next_push();
        session.record_sent(ResourceType::Cluster, 1, "current".into(), Instant::now());

        assert_eq!(
            session.handle_request(&request(ResourceType::Cluster, "old", &[])),
            RequestOutcome::Stale(ResourceType::Cluster)
        );
        assert_eq!(session.in_flight(), Some(ResourceType::Cluster));
        assert_eq!(session.accepted_version(ResourceType::Cluster), None);
    }

    #[test]
    fn expired_push_releases_queue() {
        let mut session = session();
        session.handle_request(&request(ResourceType::Cluster, "", &[]));
        session.handle_request(&request(ResourceType::Listener, "", &[]));

        let sent_at = Instant::now();
        session.next_push();
        session.record_sent(ResourceType::Cluster, 1, "a".into(), sent_at);
        assert_eq!(session.ack_deadline(Duration::from_secs(30)), Some(sent_at + Duration::from_secs(30)));

        assert_eq!(session.expire_in_flight(), Some(ResourceType::Cluster));
        assert_eq!(session.ack_deadline(Duration::from_secs(30)), None);
        assert_eq!(session.next_push(), Some(ResourceType::Listener));
    }

    #[test]
    fn changed_resource_names_requeue() {
        let mut session = session();
        session.handle_request(&request(ResourceType::Route, "", &["default"]));
        session.next_push();
        session.record_sent(ResourceType::Route, 1, "a".into(), Instant::now());

        session.handle_request(&request(ResourceType::Route, "a", &["default"]));
        assert!(!session.has_pending());

        session.handle_request(&request(ResourceType::Route, "a", &["default", "other"]));
        assert_eq!(session.next_push(), Some(ResourceType::Route));
        assert_eq!(session.requested_names(ResourceType::Route), ["default", "other"]);
    }

    #[test]
    fn unknown_type_url_reported() {
        let outcome = session().handle_request(&DiscoveryRequest {
            type_url: "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret".into(),
            ..Default::default()
        });
        assert!(matches!(outcome, RequestOutcome::UnknownType(_)));
    }

    fn node(label: Option<&str>, cluster: &str) -> Node {
        Node {
            id: "envoy-1".to_string(),
            cluster: cluster.to_string(),
            metadata: label.map(|l| Struct {
                fields: [(
                    NODE_LABEL_METADATA_KEY.to_string(),
                    Value { kind: Some(Kind::StringValue(l.to_string())) },
                )]
                .into_iter()
                .collect(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn label_resolution_order() {
        assert_eq!(label_from_node(Some(&node(Some("Edge"), "ignored"))).as_str(), "edge");
        assert_eq!(label_from_node(Some(&node(None, "internal"))).as_str(), "internal");
        assert_eq!(label_from_node(Some(&node(Some("not a label!"), "internal"))).as_str(), "internal");
        assert_eq!(label_from_node(Some(&node(None, ""))).as_str(), "default");
        assert_eq!(label_from_node(None).as_str(), "default");
    }
}
