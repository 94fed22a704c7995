//! API deployment service
//!
//! Owns the registry of deployed APIs and keeps the snapshot cache in step
//! with it. Every change republishes each label the change touches, old and
//! new, from the full registry, so a label an API leaves is emptied of it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, instrument, warn};

use crate::compiler::naming::api_key;
use crate::compiler::{aggregate, compile, CompiledApi, CompilerOptions, ListenerSettings};
use crate::domain::{ApiDescriptor, ApiId, Cluster, Label};
use crate::openapi::normalize;
use crate::services::bundle::{extract_documents, BundleEntry, DEFAULT_MAX_EXTRACTED_BYTES};
use crate::xds::{PublishSet, SnapshotCache};
use crate::{Error, Result};

/// Upload flags from the admin API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployOptions {
    pub overwrite: bool,
    pub preserve_provider: bool,
}

/// An API that made it into the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedApi {
    pub name: String,
    pub version: String,
    pub labels: Vec<String>,
}

/// An API left out of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedApi {
    pub name: String,
    pub version: String,
    pub reason: String,
}

/// Outcome of one bundle upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub deployed: Vec<DeployedApi>,
    pub skipped: Vec<SkippedApi>,
}

/// Listing view of a deployed API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSummary {
    pub name: String,
    pub version: String,
    pub base_path: String,
    pub labels: Vec<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    descriptor: Arc<ApiDescriptor>,
    compiled: Arc<CompiledApi>,
}

impl RegistryEntry {
    fn labels(&self) -> impl Iterator<Item = &Label> {
        self.descriptor.labels.iter()
    }

    fn summary(&self) -> ApiSummary {
        ApiSummary {
            name: self.descriptor.name.clone(),
            version: self.descriptor.version.clone(),
            base_path: self.descriptor.base_path.clone(),
            labels: label_names(&self.descriptor),
            provider: self.descriptor.provider.clone(),
        }
    }
}

/// Registry of deployed APIs and the publisher for their labels
pub struct ApiDeployer {
    cache: Arc<SnapshotCache>,
    compiler_options: CompilerOptions,
    listener: ListenerSettings,
    max_extracted_bytes: usize,
    registry: Mutex<BTreeMap<ApiId, RegistryEntry>>,
    publish_lock: Mutex<()>,
}

impl std::fmt::Debug for ApiDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiDeployer")
            .field("compiler_options", &self.compiler_options)
            .field("listener", &self.listener)
            .field("max_extracted_bytes", &self.max_extracted_bytes)
            .finish_non_exhaustive()
    }
}

impl ApiDeployer {
    pub fn new(
        cache: Arc<SnapshotCache>,
        compiler_options: CompilerOptions,
        listener: ListenerSettings,
    ) -> Self {
        Self {
            cache,
            compiler_options,
            listener,
            max_extracted_bytes: DEFAULT_MAX_EXTRACTED_BYTES,
            registry: Mutex::new(BTreeMap::new()),
            publish_lock: Mutex::new(()),
        }
    }

    /// Cap on the decompressed size of the documents in one bundle
    pub fn with_max_extracted_bytes(mut self, bytes: usize) -> Self {
        self.max_extracted_bytes = bytes;
        self
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Wait for any in-flight publish and block new ones while the guard lives
    pub async fn publish_lock(&self) -> MutexGuard<'_, ()> {
        self.publish_lock.lock().await
    }

    /// Normalize, compile and publish every document in a zip bundle.
    ///
    /// Nothing is deployed when any document is malformed or conflicts with
    /// an existing API. APIs that fail compilation are skipped and reported.
    #[instrument(skip(self, archive, caller), fields(caller = %caller, bytes = archive.len()))]
    pub async fn deploy_bundle(
        &self,
        archive: &[u8],
        options: DeployOptions,
        caller: &str,
    ) -> Result<DeployReport> {
        let entries = extract_documents(archive, self.max_extracted_bytes)?;
        let descriptors = normalize_entries(&entries)?;
        self.deploy_descriptors(descriptors, options, caller).await
    }

    /// Deploy already normalized descriptors
    pub async fn deploy_descriptors(
        &self,
        descriptors: Vec<ApiDescriptor>,
        options: DeployOptions,
        caller: &str,
    ) -> Result<DeployReport> {
        let _publish = self.publish_lock.lock().await;
        let mut registry = self.registry.lock().await;

        if !options.overwrite {
            if let Some(existing) = descriptors.iter().find(|d| registry.contains_key(&d.id())) {
                return Err(Error::conflict(format!(
                    "API '{}' version '{}' is already deployed",
                    existing.name, existing.version
                )));
            }
        }

        check_resource_names(&registry, &descriptors)?;

        let mut report = DeployReport::default();
        let mut staged: Vec<(ApiId, RegistryEntry)> = Vec::with_capacity(descriptors.len());

        for mut descriptor in descriptors {
            let id = descriptor.id();
            descriptor.provider = resolve_provider(
                descriptor.provider.take(),
                registry.get(&id).and_then(|entry| entry.descriptor.provider.clone()),
                options.preserve_provider,
                caller,
            );

            match compile(&descriptor, &self.compiler_options) {
                Ok(compiled) => staged.push((
                    id,
                    RegistryEntry { descriptor: Arc::new(descriptor), compiled: Arc::new(compiled) },
                )),
                Err(Error::CompilationInvariant { api, message }) => {
                    warn!(api = %api, reason = %message, "Skipping API that failed compilation");
                    report.skipped.push(SkippedApi {
                        name: id.name,
                        version: id.version,
                        reason: message,
                    });
                }
                Err(other) => return Err(other),
            }
        }

        let mut affected: BTreeSet<Label> = BTreeSet::new();
        for (id, entry) in staged {
            affected.extend(entry.labels().cloned());
            if let Some(previous) = registry.insert(id.clone(), entry.clone()) {
                affected.extend(previous.labels().cloned());
            }

            info!(
                api = %id,
                labels = ?label_names(&entry.descriptor),
                provider = ?entry.descriptor.provider,
                routes = entry.compiled.routes.len(),
                clusters = entry.compiled.clusters.len(),
                "API deployed"
            );

            report.deployed.push(DeployedApi {
                name: id.name,
                version: id.version,
                labels: label_names(&entry.descriptor),
            });
        }

        self.republish(&registry, affected).await;

        Ok(report)
    }

    /// Remove an API and republish its labels
    #[instrument(skip(self))]
    pub async fn delete_api(&self, name: &str, version: &str) -> Result<()> {
        let _publish = self.publish_lock.lock().await;
        let mut registry = self.registry.lock().await;

        let id = ApiId::new(name, version);
        let removed = registry.remove(&id).ok_or_else(|| {
            Error::not_found(format!("API '{}' version '{}' is not deployed", name, version))
        })?;

        info!(api = %id, "API deleted");

        let affected: BTreeSet<Label> = removed.labels().cloned().collect();
        self.republish(&registry, affected).await;

        Ok(())
    }

    /// Deployed APIs whose name contains `query` (case-insensitive), capped at `limit`
    pub async fn list_apis(&self, query: Option<&str>, limit: Option<usize>) -> Vec<ApiSummary> {
        let needle = query.map(str::to_lowercase).filter(|q| !q.is_empty());
        let registry = self.registry.lock().await;

        registry
            .values()
            .filter(|entry| match &needle {
                Some(needle) => entry.descriptor.name.to_lowercase().contains(needle),
                None => true,
            })
            .take(limit.unwrap_or(usize::MAX))
            .map(RegistryEntry::summary)
            .collect()
    }

    async fn republish(&self, registry: &BTreeMap<ApiId, RegistryEntry>, labels: BTreeSet<Label>) {
        for label in labels {
            let set = self.build_publish_set(registry, &label);
            self.cache.publish(&label, set).await;
        }
    }

    fn build_publish_set(
        &self,
        registry: &BTreeMap<ApiId, RegistryEntry>,
        label: &Label,
    ) -> PublishSet {
        let members: Vec<(&ApiId, &RegistryEntry)> = registry
            .iter()
            .filter(|(_, entry)| entry.descriptor.labels.contains(label))
            .collect();

        if members.is_empty() {
            return PublishSet::default();
        }

        let mut routes = Vec::new();
        let mut clusters: Vec<Cluster> = Vec::new();
        let mut cluster_index: HashMap<String, usize> = HashMap::new();

        for (id, entry) in members {
            routes.extend(entry.compiled.routes.iter().cloned());

            for cluster in &entry.compiled.clusters {
                match cluster_index.get(&cluster.name) {
                    Some(&idx) => {
                        if clusters[idx] != *cluster {
                            warn!(
                                label = %label,
                                api = %id,
                                cluster = %cluster.name,
                                "Cluster name collides with another API; later definition wins"
                            );
                        }
                        clusters[idx] = cluster.clone();
                    }
                    None => {
                        cluster_index.insert(cluster.name.clone(), clusters.len());
                        clusters.push(cluster.clone());
                    }
                }
            }
        }

        let (listener, route_configuration) = aggregate(routes, &self.listener);

        PublishSet {
            listeners: vec![listener],
            route_configurations: vec![route_configuration],
            endpoints: clusters.iter().map(Cluster::assignment).collect(),
            clusters,
        }
    }
}

fn normalize_entries(entries: &[BundleEntry]) -> Result<Vec<ApiDescriptor>> {
    let mut seen: BTreeSet<ApiId> = BTreeSet::new();
    let mut descriptors = Vec::with_capacity(entries.len());

    for entry in entries {
        let descriptor = normalize(&entry.contents).map_err(|err| match err {
            Error::InputFormat { message, field } => Error::InputFormat {
                message: format!("{}: {}", entry.name, message),
                field: field.or_else(|| Some(entry.name.clone())),
            },
            other => other,
        })?;

        if !seen.insert(descriptor.id()) {
            return Err(Error::input_format_field(
                format!(
                    "API '{}' version '{}' appears more than once in the bundle",
                    descriptor.name, descriptor.version
                ),
                entry.name.clone(),
            ));
        }

        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

/// Reject APIs whose generated resource names match those of a different API.
///
/// Names are sanitized, so `pet store` and `pet-store` would otherwise share
/// clusters and routes.
fn check_resource_names(
    registry: &BTreeMap<ApiId, RegistryEntry>,
    descriptors: &[ApiDescriptor],
) -> Result<()> {
    let mut owners: HashMap<String, ApiId> = registry
        .keys()
        .map(|id| (api_key(&id.name, &id.version), id.clone()))
        .collect();

    for descriptor in descriptors {
        let id = descriptor.id();
        let key = api_key(&id.name, &id.version);
        match owners.get(&key) {
            Some(owner) if *owner != id => {
                return Err(Error::conflict(format!(
                    "API '{}' version '{}' maps to the same resource names ({}) as API '{}' version '{}'",
                    id.name, id.version, key, owner.name, owner.version
                )));
            }
            _ => {
                owners.insert(key, id);
            }
        }
    }

    Ok(())
}

fn resolve_provider(
    declared: Option<String>,
    existing: Option<String>,
    preserve: bool,
    caller: &str,
) -> Option<String> {
    if preserve {
        declared.or(existing)
    } else {
        Some(caller.to_string())
    }
}

fn label_names(descriptor: &ApiDescriptor) -> Vec<String> {
    descriptor.labels.iter().map(|label| label.as_str().to_string()).collect()
}
