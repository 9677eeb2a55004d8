//! Per-resource operations.
//!
//! Deployment-scoped endpoints address a resource by kind and ref id; when
//! the ref id is omitted, the first resource of the kind in the deployment
//! is used. Plan endpoints address a resource by its resource id.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{
    DeploymentUpdateRequest, DeploymentUpdateResponse, EceClient, InstanceSelection, PlanActivity,
    ResourceCommandResponse, ResourceInfo, ResourceUpgradeResponse, ShowParams, ShutdownParams,
    UpdateParams,
};
use crate::cancel::CancelToken;
use crate::config::TrackConfig;
use crate::error::{DiscoveryError, PreconditionError, Result, ValidationError};
use crate::sink::OutputSink;

use super::ids::DeploymentId;
use super::kind::{ResourceKind, ResourceRef};
use super::payload::PayloadBuilder;
use super::reapply::{PlanReapplier, ReapplyOverrides};
use super::spec::SimpleSpec;
use super::tracker::{ChangeTracker, Submission, TrackTask};

/// A resource addressed through its deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSelector {
    /// Owning deployment.
    pub deployment_id: DeploymentId,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Ref id; discovered from the deployment when `None`.
    pub ref_id: Option<String>,
}

impl ResourceSelector {
    /// Selects the first resource of `kind` in the deployment.
    #[must_use]
    pub const fn new(deployment_id: DeploymentId, kind: ResourceKind) -> Self {
        Self {
            deployment_id,
            kind,
            ref_id: None,
        }
    }

    /// Selects the resource with `ref_id`.
    #[must_use]
    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }
}

/// Operations on single deployment resources.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    client: EceClient,
    output: OutputSink,
    track_config: TrackConfig,
    cancel: CancelToken,
}

impl ResourceManager {
    /// Creates a manager printing progress to `output`.
    #[must_use]
    pub fn new(client: EceClient, output: OutputSink) -> Self {
        Self {
            client,
            output,
            track_config: TrackConfig::default(),
            cancel: CancelToken::never(),
        }
    }

    /// Sets the tracking parameters.
    #[must_use]
    pub const fn with_track_config(mut self, config: TrackConfig) -> Self {
        self.track_config = config;
        self
    }

    /// Sets the cancellation token used while tracking.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolves the ref id of `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyRefId`] for an empty ref id, or
    /// [`DiscoveryError::RefIdUnavailable`] when the deployment has no
    /// resource of the kind.
    pub async fn ref_id(&self, selector: &ResourceSelector) -> Result<String> {
        match selector.ref_id.as_deref() {
            Some("") => Err(ValidationError::EmptyRefId {
                kind: selector.kind,
            }
            .into()),
            Some(ref_id) => Ok(ref_id.to_string()),
            None => {
                let deployment = self
                    .client
                    .get_deployment(&selector.deployment_id, &ShowParams::default())
                    .await?;
                let ref_id = deployment
                    .first(selector.kind)
                    .map(|resource| resource.ref_id.clone())
                    .ok_or_else(|| DiscoveryError::RefIdUnavailable {
                        kind: selector.kind,
                        deployment_id: selector.deployment_id.to_string(),
                    })?;
                debug!("Using {} ref id {ref_id}", selector.kind);
                Ok(ref_id)
            }
        }
    }

    /// Adds a resource of `kind` described by `spec` to an existing
    /// deployment. Other resources are left in place.
    ///
    /// # Errors
    ///
    /// Returns the payload builder's errors or the API error of the update.
    pub async fn create(
        &self,
        kind: ResourceKind,
        spec: &SimpleSpec,
        track: bool,
    ) -> Result<Submission<DeploymentUpdateResponse>> {
        let builder = PayloadBuilder::new(&self.client);
        let payload = if kind.is_stateless() {
            builder.build_stateless(kind, spec).await?
        } else {
            DeploymentId::parse(spec.deployment_id().unwrap_or_default())?;
            builder.build_elasticsearch(spec).await?
        };
        let id = DeploymentId::parse(spec.deployment_id().unwrap_or_default())?;
        let ref_id = payload.ref_id.clone();

        let mut request = DeploymentUpdateRequest {
            prune_orphans: false,
            ..DeploymentUpdateRequest::default()
        };
        request.resources.push(kind, payload);

        let response = self
            .client
            .update_deployment(&id, &request, &UpdateParams::default())
            .await?;
        info!("Added {kind} resource {ref_id} to deployment {id}");

        if !track {
            return Ok(Submission::untracked(response));
        }
        let tasks = response
            .resources
            .iter()
            .filter(|resource| resource.resource_kind() == Some(kind) && resource.ref_id == ref_id)
            .map(|resource| TrackTask::live(kind, resource.id.clone()))
            .collect();
        let tracking = self.tracker().track(tasks).await.err();
        Ok(Submission { response, tracking })
    }

    /// Reads a resource.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn show(&self, selector: &ResourceSelector, params: &ShowParams) -> Result<ResourceInfo> {
        let ref_id = self.ref_id(selector).await?;
        self.client
            .get_resource(&selector.deployment_id, selector.kind, &ref_id, params)
            .await
    }

    /// Shuts a resource down.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn shutdown(
        &self,
        selector: &ResourceSelector,
        params: &ShutdownParams,
    ) -> Result<ResourceCommandResponse> {
        let ref_id = self.ref_id(selector).await?;
        info!("Shutting down {} resource {ref_id}", selector.kind);
        self.client
            .shutdown_resource(&selector.deployment_id, selector.kind, &ref_id, params)
            .await
    }

    /// Restores a shut down resource.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn restore(
        &self,
        selector: &ResourceSelector,
        restore_snapshot: bool,
    ) -> Result<ResourceCommandResponse> {
        let ref_id = self.ref_id(selector).await?;
        info!("Restoring {} resource {ref_id}", selector.kind);
        self.client
            .restore_resource(&selector.deployment_id, selector.kind, &ref_id, restore_snapshot)
            .await
    }

    /// Upgrades a stateless resource to the version of its Elasticsearch
    /// resource.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedKind`] for Elasticsearch, which
    /// is upgraded through a plan change.
    pub async fn upgrade(&self, selector: &ResourceSelector) -> Result<ResourceUpgradeResponse> {
        if !selector.kind.is_stateless() {
            return Err(unsupported("upgrade", selector.kind));
        }
        let ref_id = self.ref_id(selector).await?;
        self.client
            .upgrade_resource(&selector.deployment_id, selector.kind, &ref_id)
            .await
    }

    /// Stops instances of a resource.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn stop(
        &self,
        selector: &ResourceSelector,
        instances: &InstanceSelection,
    ) -> Result<ResourceCommandResponse> {
        let ref_id = self.ref_id(selector).await?;
        self.client
            .set_instances_running(&selector.deployment_id, selector.kind, &ref_id, instances, false)
            .await
    }

    /// Starts instances of a resource.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn start(
        &self,
        selector: &ResourceSelector,
        instances: &InstanceSelection,
    ) -> Result<ResourceCommandResponse> {
        let ref_id = self.ref_id(selector).await?;
        self.client
            .set_instances_running(&selector.deployment_id, selector.kind, &ref_id, instances, true)
            .await
    }

    /// Moves instances of a resource in or out of maintenance mode.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn maintenance(
        &self,
        selector: &ResourceSelector,
        instances: &InstanceSelection,
        enabled: bool,
    ) -> Result<ResourceCommandResponse> {
        let ref_id = self.ref_id(selector).await?;
        self.client
            .set_maintenance_mode(&selector.deployment_id, selector.kind, &ref_id, instances, enabled)
            .await
    }

    /// Deletes a stopped stateless resource.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedKind`] for Elasticsearch, or
    /// [`PreconditionError::NotStopped`] without deleting anything when the
    /// resource is not stopped.
    pub async fn delete(&self, selector: &ResourceSelector) -> Result<ResourceCommandResponse> {
        if !selector.kind.is_stateless() {
            return Err(unsupported("delete", selector.kind));
        }
        let ref_id = self.ref_id(selector).await?;
        let resource = self
            .client
            .get_resource(&selector.deployment_id, selector.kind, &ref_id, &ShowParams::default())
            .await?;
        if !resource.info.status.is_stopped() {
            debug!("{} resource {ref_id} is {}", selector.kind, resource.info.status);
            return Err(PreconditionError::NotStopped {
                operation: format!("{} delete", selector.kind),
            }
            .into());
        }

        let response = self
            .client
            .delete_resource(&selector.deployment_id, selector.kind, &ref_id)
            .await?;
        info!("Deleted {} resource {ref_id}", selector.kind);
        Ok(response)
    }

    /// Resynchronizes the search index of a resource.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn resync(&self, resource: &ResourceRef) -> Result<ResourceCommandResponse> {
        self.client.resync_resource(resource.kind, &resource.id).await
    }

    /// Cancels the pending plan of a resource.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn cancel_pending_plan(&self, resource: &ResourceRef) -> Result<ResourceCommandResponse> {
        info!("Cancelling pending plan of {resource}");
        self.client
            .cancel_pending_plan(resource.kind, &resource.id)
            .await
    }

    /// Reads the plan activity of a resource.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn plan_activity(&self, resource: &ResourceRef, show_logs: bool) -> Result<PlanActivity> {
        self.client
            .get_plan_activity(resource.kind, &resource.id, false, show_logs)
            .await
    }

    /// Reapplies the latest plan of a resource.
    ///
    /// # Errors
    ///
    /// See [`PlanReapplier::reapply`].
    pub async fn reapply(
        &self,
        resource: &ResourceRef,
        overrides: &ReapplyOverrides,
        track: bool,
    ) -> Result<Submission<crate::api::ClusterCrudResponse>> {
        PlanReapplier::new(&self.client, self.output.clone())
            .with_track_config(self.track_config)
            .with_cancel(self.cancel.clone())
            .reapply(resource, overrides, track)
            .await
    }

    fn tracker(&self) -> ChangeTracker {
        ChangeTracker::new(Arc::new(self.client.clone()), self.output.clone())
            .with_config(self.track_config)
            .with_cancel(self.cancel.clone())
    }
}

fn unsupported(operation: &str, kind: ResourceKind) -> crate::error::EceError {
    ValidationError::UnsupportedKind {
        operation: operation.to_string(),
        kind,
    }
    .into()
}
