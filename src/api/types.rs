//! Deployment API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::deployment::ResourceKind;

use super::plan::{Plan, PlanActivity};

/// One list per resource kind, the layout every deployment body uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerKind<T> {
    /// Elasticsearch entries.
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub elasticsearch: Vec<T>,
    /// Kibana entries.
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub kibana: Vec<T>,
    /// APM entries.
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub apm: Vec<T>,
    /// App Search entries.
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub appsearch: Vec<T>,
}

impl<T> Default for PerKind<T> {
    fn default() -> Self {
        Self {
            elasticsearch: Vec::new(),
            kibana: Vec::new(),
            apm: Vec::new(),
            appsearch: Vec::new(),
        }
    }
}

impl<T> PerKind<T> {
    /// Returns the entries of `kind`.
    #[must_use]
    pub fn of(&self, kind: ResourceKind) -> &[T] {
        match kind {
            ResourceKind::Elasticsearch => &self.elasticsearch,
            ResourceKind::Kibana => &self.kibana,
            ResourceKind::Apm => &self.apm,
            ResourceKind::Appsearch => &self.appsearch,
        }
    }

    /// Returns the entries of `kind` mutably.
    pub fn of_mut(&mut self, kind: ResourceKind) -> &mut Vec<T> {
        match kind {
            ResourceKind::Elasticsearch => &mut self.elasticsearch,
            ResourceKind::Kibana => &mut self.kibana,
            ResourceKind::Apm => &mut self.apm,
            ResourceKind::Appsearch => &mut self.appsearch,
        }
    }

    /// Adds an entry for `kind`.
    pub fn push(&mut self, kind: ResourceKind, value: T) {
        self.of_mut(kind).push(value);
    }

    /// Returns true if no kind has entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        ResourceKind::ALL.iter().all(|kind| self.of(*kind).is_empty())
    }

    /// Iterates over every entry together with its kind.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, &T)> {
        ResourceKind::ALL
            .into_iter()
            .flat_map(move |kind| self.of(kind).iter().map(move |value| (kind, value)))
    }
}

/// A deployment as returned by `GET /deployments/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentGetResponse {
    /// Deployment identifier.
    pub id: String,
    /// Deployment name.
    #[serde(default)]
    pub name: String,
    /// Overall health.
    #[serde(default)]
    pub healthy: bool,
    /// Resources by kind.
    #[serde(default)]
    pub resources: PerKind<ResourceInfo>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeploymentGetResponse {
    /// Returns the first resource of `kind`.
    #[must_use]
    pub fn first(&self, kind: ResourceKind) -> Option<&ResourceInfo> {
        self.resources.of(kind).first()
    }
}

/// A resource of a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    /// Resource identifier.
    pub id: String,
    /// Ref id within the deployment.
    pub ref_id: String,
    /// Region the resource runs in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Ref id of the Elasticsearch resource this one attaches to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch_cluster_ref_id: Option<String>,
    /// Cluster details.
    #[serde(default)]
    pub info: ResourceClusterInfo,
}

/// Cluster details of a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceClusterInfo {
    /// Lifecycle status.
    #[serde(default)]
    pub status: ResourceStatus,
    /// Health of the resource.
    #[serde(default)]
    pub healthy: bool,
    /// Plans of the resource.
    #[serde(default)]
    pub plan_info: PlanActivity,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lifecycle status of a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Being created.
    Initializing,
    /// Being stopped.
    Stopping,
    /// Stopped.
    Stopped,
    /// Rebooting.
    Rebooting,
    /// Restarting.
    Restarting,
    /// Applying a plan.
    Reconfiguring,
    /// Running.
    Started,
    /// Unrecognised status.
    #[default]
    #[serde(other)]
    Unknown,
}

impl ResourceStatus {
    /// Returns true once the resource is fully stopped.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Rebooting => "rebooting",
            Self::Restarting => "restarting",
            Self::Reconfiguring => "reconfiguring",
            Self::Started => "started",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A resource payload for deployment create or update requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePayload {
    /// Ref id within the deployment.
    pub ref_id: String,
    /// Region to run in.
    pub region: String,
    /// Ref id of the Elasticsearch resource to attach to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch_cluster_ref_id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Desired plan.
    pub plan: Plan,
    /// Resource settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

/// Body of `POST /deployments`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentCreateRequest {
    /// Deployment name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Resources to create.
    #[serde(default)]
    pub resources: PerKind<ResourcePayload>,
    /// Deployment metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Deployment settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

/// Body of `PUT /deployments/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentUpdateRequest {
    /// Deployment name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether resources missing from the request are shut down.
    #[serde(default)]
    pub prune_orphans: bool,
    /// Desired resources.
    #[serde(default)]
    pub resources: PerKind<ResourcePayload>,
    /// Deployment metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Deployment settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

/// A resource reported by a create, update or delete response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResource {
    /// Resource identifier.
    pub id: String,
    /// Resource kind, as sent by the server.
    pub kind: String,
    /// Ref id within the deployment.
    #[serde(default)]
    pub ref_id: String,
    /// Region the resource runs in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Cloud id, for Elasticsearch resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_id: Option<String>,
    /// Generated credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl DeploymentResource {
    /// Returns the kind, if it is one this tool manages.
    #[must_use]
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        self.kind.parse().ok()
    }
}

/// Credentials generated at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Resources shut down by an update with `prune_orphans`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Orphaned {
    /// Orphaned Elasticsearch resources.
    #[serde(default)]
    pub elasticsearch: Vec<OrphanedElasticsearch>,
    /// Orphaned Kibana resource ids.
    #[serde(default)]
    pub kibana: Vec<String>,
    /// Orphaned APM resource ids.
    #[serde(default)]
    pub apm: Vec<String>,
    /// Orphaned App Search resource ids.
    #[serde(default)]
    pub appsearch: Vec<String>,
}

/// An orphaned Elasticsearch resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanedElasticsearch {
    /// Resource identifier.
    pub id: String,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Orphaned {
    /// Returns every orphaned resource id with its kind.
    #[must_use]
    pub fn ids(&self) -> Vec<(ResourceKind, String)> {
        let mut ids: Vec<_> = self
            .elasticsearch
            .iter()
            .map(|es| (ResourceKind::Elasticsearch, es.id.clone()))
            .collect();
        for (kind, list) in [
            (ResourceKind::Kibana, &self.kibana),
            (ResourceKind::Apm, &self.apm),
            (ResourceKind::Appsearch, &self.appsearch),
        ] {
            ids.extend(list.iter().map(|id| (kind, id.clone())));
        }
        ids
    }
}

/// Response of `POST /deployments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentCreateResponse {
    /// Deployment identifier.
    pub id: String,
    /// Deployment name.
    #[serde(default)]
    pub name: String,
    /// Whether the deployment was created.
    #[serde(default)]
    pub created: bool,
    /// Created resources.
    #[serde(default)]
    pub resources: Vec<DeploymentResource>,
}

/// Response of `PUT /deployments/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentUpdateResponse {
    /// Deployment identifier.
    pub id: String,
    /// Deployment name.
    #[serde(default)]
    pub name: String,
    /// Resources in the desired state.
    #[serde(default)]
    pub resources: Vec<DeploymentResource>,
    /// Resources being shut down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_resources: Option<Orphaned>,
}

/// Response of `DELETE /deployments/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDeleteResponse {
    /// Deployment identifier.
    pub id: String,
    /// Deployment name.
    #[serde(default)]
    pub name: String,
    /// Deleted resources.
    #[serde(default)]
    pub resources: Vec<DeploymentResource>,
}

/// Response of deployment shutdown and restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentCommandResponse {
    /// Deployment identifier.
    pub id: String,
    /// Deployment name.
    #[serde(default)]
    pub name: String,
    /// Resources affected by the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orphaned: Option<Orphaned>,
}

/// Response of per-resource commands such as stop, start or shutdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceCommandResponse {
    /// Whatever the server returned.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Response of `POST .../{kind}/{ref_id}/_upgrade`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpgradeResponse {
    /// Upgraded resource.
    pub resource_id: String,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of bulk index synchronization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSyncResults {
    /// Number of synchronized entries.
    #[serde(default)]
    pub total_synchronized: u32,
    /// Entries scheduled for a later retry.
    #[serde(default)]
    pub retried: u32,
    /// Entries that failed.
    #[serde(default)]
    pub errors: Vec<Value>,
}

/// Response of a plan submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterCrudResponse {
    /// Elasticsearch resource id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch_cluster_id: Option<String>,
    /// Kibana resource id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kibana_cluster_id: Option<String>,
    /// APM resource id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apm_id: Option<String>,
    /// App Search resource id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appsearch_id: Option<String>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
