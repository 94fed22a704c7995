//! ADS State-of-the-World stream driver.
//!
//! One task per stream. The label is taken from the first request's node;
//! the task then multiplexes three event sources with `tokio::select!`:
//! incoming requests, snapshot changes for the label, the ACK deadline of
//! the in-flight push, and control-plane shutdown. A transport error or
//! disconnect ends only this stream.

use std::sync::Arc;
use std::time::Duration;

use envoy_types::pb::envoy::service::discovery::v3::{DiscoveryRequest, DiscoveryResponse};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tonic::Status;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::xds::cache::{Snapshot, SnapshotCache};
use crate::xds::encoder::ResourceEncoder;
use crate::xds::session::{label_from_node, RequestOutcome, Session};
use crate::{Error, Result};

/// Run the ADS loop for one stream and return its response stream
pub fn run_ads_stream<S>(
    cache: Arc<SnapshotCache>,
    encoder: Arc<dyn ResourceEncoder>,
    mut in_stream: S,
    ack_timeout: Duration,
    shutdown: CancellationToken,
) -> ReceiverStream<std::result::Result<DiscoveryResponse, Status>>
where
    S: Stream<Item = std::result::Result<DiscoveryRequest, Status>> + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        let first = tokio::select! {
            first = in_stream.next() => match first {
                Some(Ok(request)) => request,
                Some(Err(status)) => {
                    warn!(error = %status, "ADS stream failed before the first request");
                    return;
                }
                None => return,
            },
            _ = shutdown.cancelled() => return,
        };

        let label = label_from_node(first.node.as_ref());
        let node_id = first.node.as_ref().map(|node| node.id.clone()).unwrap_or_default();
        info!(label = %label, node_id = %node_id, "ADS stream established");

        let mut snapshots = cache.subscribe(&label);
        let mut current = snapshots.borrow_and_update().clone();
        let mut session = Session::new(label.clone());
        let outcome = session.handle_request(&first);
        log_outcome(&session, &node_id, outcome);

        let result: Result<()> = async {
            loop {
                push_pending(&mut session, &current, encoder.as_ref(), &tx).await?;

                let deadline = session.ack_deadline(ack_timeout);

                tokio::select! {
                    request = in_stream.next() => match request {
                        Some(Ok(request)) => {
                            let outcome = session.handle_request(&request);
                            log_outcome(&session, &node_id, outcome);
                        }
                        Some(Err(status)) => {
                            return Err(Error::distribution(label.as_str(), status.to_string()));
                        }
                        None => {
                            info!(label = %label, node_id = %node_id, "ADS stream closed by peer");
                            return Ok(());
                        }
                    },
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            return Err(Error::distribution(label.as_str(), "snapshot cache dropped"));
                        }
                        current = snapshots.borrow_and_update().clone();
                        debug!(label = %label, version = current.version, "Snapshot changed");
                        session.on_snapshot(current.version);
                    }
                    _ = tx.closed() => {
                        info!(label = %label, node_id = %node_id, "ADS response stream dropped");
                        return Ok(());
                    }
                    _ = shutdown.cancelled() => {
                        info!(label = %label, node_id = %node_id, "Closing ADS stream for shutdown");
                        return Ok(());
                    }
                    _ = wait_until(deadline) => {
                        if let Some(resource_type) = session.expire_in_flight() {
                            warn!(
                                label = %label,
                                node_id = %node_id,
                                resource_type = %resource_type,
                                timeout_secs = ack_timeout.as_secs(),
                                "No acknowledgement before deadline; abandoning push"
                            );
                        }
                    }
                }
            }
        }
        .await;

        if let Err(err) = result {
            error!(label = %label, node_id = %node_id, error = %err, "ADS stream terminated");
        }

        drop(snapshots);
        if cache.release(&label) {
            debug!(label = %label, "Released unused label");
        }
    });

    ReceiverStream::new(rx)
}

async fn push_pending(
    session: &mut Session,
    snapshot: &Snapshot,
    encoder: &dyn ResourceEncoder,
    tx: &mpsc::Sender<std::result::Result<DiscoveryResponse, Status>>,
) -> Result<()> {
    let Some(resource_type) = session.next_push() else {
        return Ok(());
    };

    let resources = encoder.encode(resource_type, snapshot, session.requested_names(resource_type))?;

    let response = DiscoveryResponse {
        version_info: snapshot.version_info(),
        type_url: encoder.type_url(resource_type).to_string(),
        nonce: Uuid::new_v4().to_string(),
        resources,
        ..Default::default()
    };

    info!(
        label = %session.label(),
        resource_type = %resource_type,
        version = %response.version_info,
        nonce = %response.nonce,
        resource_count = response.resources.len(),
        "Sending discovery response"
    );

    session.record_sent(resource_type, snapshot.version, response.nonce.clone(), Instant::now());

    tx.send(Ok(response))
        .await
        .map_err(|_| Error::distribution(session.label().as_str(), "response receiver dropped"))
}

fn log_outcome(session: &Session, node_id: &str, outcome: RequestOutcome) {
    let label = session.label();
    match outcome {
        RequestOutcome::Subscribed(resource_type) => {
            debug!(label = %label, node_id, resource_type = %resource_type, "Subscription request");
        }
        RequestOutcome::Acked { resource_type, version } => {
            debug!(label = %label, node_id, resource_type = %resource_type, version, "[ACK]");
        }
        RequestOutcome::Nacked { resource_type, version, message } => {
            warn!(
                label = %label,
                node_id,
                resource_type = %resource_type,
                version,
                error_message = %message,
                "[NACK] Proxy rejected configuration"
            );
        }
        RequestOutcome::Stale(resource_type) => {
            debug!(label = %label, node_id, resource_type = %resource_type, "Ignoring stale nonce");
        }
        RequestOutcome::UnknownType(type_url) => {
            warn!(label = %label, node_id, type_url = %type_url, "Ignoring unsupported resource type");
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
