use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::info;

use envoy_types::pb::envoy::service::discovery::v3::{
    aggregated_discovery_service_server::AggregatedDiscoveryService, DeltaDiscoveryRequest,
    DeltaDiscoveryResponse, DiscoveryRequest, DiscoveryResponse,
};

use crate::xds::cache::SnapshotCache;
use crate::xds::encoder::ResourceEncoder;

use super::stream::run_ads_stream;

/// Snapshot-backed Aggregated Discovery Service
#[derive(Clone)]
pub struct SnapshotDiscoveryService {
    cache: Arc<SnapshotCache>,
    encoder: Arc<dyn ResourceEncoder>,
    ack_timeout: Duration,
    shutdown: CancellationToken,
}

impl SnapshotDiscoveryService {
    /// Streams opened on this service end when `shutdown` is cancelled
    pub fn new(
        cache: Arc<SnapshotCache>,
        encoder: Arc<dyn ResourceEncoder>,
        ack_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self { cache, encoder, ack_timeout, shutdown }
    }
}

impl std::fmt::Debug for SnapshotDiscoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotDiscoveryService")
            .field("labels", &self.cache.labels())
            .field("ack_timeout", &self.ack_timeout)
            .finish()
    }
}

#[tonic::async_trait]
impl AggregatedDiscoveryService for SnapshotDiscoveryService {
    type StreamAggregatedResourcesStream =
        Pin<Box<dyn Stream<Item = std::result::Result<DiscoveryResponse, Status>> + Send>>;
    type DeltaAggregatedResourcesStream =
        Pin<Box<dyn Stream<Item = std::result::Result<DeltaDiscoveryResponse, Status>> + Send>>;

    async fn stream_aggregated_resources(
        &self,
        request: Request<tonic::Streaming<DiscoveryRequest>>,
    ) -> std::result::Result<Response<Self::StreamAggregatedResourcesStream>, Status> {
        info!(remote_addr = ?request.remote_addr(), "New ADS stream connection established");

        let stream = run_ads_stream(
            self.cache.clone(),
            self.encoder.clone(),
            request.into_inner(),
            self.ack_timeout,
            self.shutdown.clone(),
        );

        Ok(Response::new(Box::pin(stream)))
    }

    async fn delta_aggregated_resources(
        &self,
        _request: Request<tonic::Streaming<DeltaDiscoveryRequest>>,
    ) -> std::result::Result<Response<Self::DeltaAggregatedResourcesStream>, Status> {
        Err(Status::unimplemented("incremental xDS is not supported; use state-of-the-world ADS"))
    }
}
