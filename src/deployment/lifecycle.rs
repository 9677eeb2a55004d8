//! Deployment level operations.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{
    DeploymentCommandResponse, DeploymentCreateRequest, DeploymentCreateResponse,
    DeploymentDeleteResponse, DeploymentGetResponse, DeploymentUpdateRequest,
    DeploymentUpdateResponse, EceClient, IndexSyncResults, ResourceCommandResponse, ShowParams,
    ShutdownParams, UpdateParams,
};
use crate::cancel::CancelToken;
use crate::config::TrackConfig;
use crate::error::{MultiError, PreconditionError, Result, TrackError};
use crate::sink::OutputSink;

use super::ids::DeploymentId;
use super::kind::ResourceKind;
use super::payload::PayloadBuilder;
use super::spec::SimpleSpec;
use super::tracker::{ChangeTracker, Submission, TrackTask};

/// Creates, changes and removes deployments.
#[derive(Debug, Clone)]
pub struct DeploymentManager {
    client: EceClient,
    output: OutputSink,
    track_config: TrackConfig,
    cancel: CancelToken,
}

impl DeploymentManager {
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

    /// Returns the API client.
    #[must_use]
    pub const fn client(&self) -> &EceClient {
        &self.client
    }

    /// Builds the request creating a deployment with one Elasticsearch
    /// resource described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns the payload builder's errors.
    pub async fn create_request(&self, spec: &SimpleSpec) -> Result<DeploymentCreateRequest> {
        let payload = PayloadBuilder::new(&self.client)
            .build_elasticsearch(spec)
            .await?;
        let mut request = DeploymentCreateRequest {
            name: spec.name.clone().filter(|n| !n.is_empty()),
            ..DeploymentCreateRequest::default()
        };
        request.resources.push(ResourceKind::Elasticsearch, payload);
        Ok(request)
    }

    /// Creates a deployment, optionally tracking every created resource.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn create(
        &self,
        request: &DeploymentCreateRequest,
        track: bool,
    ) -> Result<Submission<DeploymentCreateResponse>> {
        let response = self.client.create_deployment(request, false).await?;
        info!("Created deployment {}", response.id);

        let tracking = if track {
            self.track(TrackTask::from_response(&response.resources, None))
                .await
        } else {
            None
        };
        Ok(Submission { response, tracking })
    }

    /// Updates a deployment, optionally tracking live and shut down
    /// resources.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn update(
        &self,
        id: &DeploymentId,
        request: &DeploymentUpdateRequest,
        params: &UpdateParams,
        track: bool,
    ) -> Result<Submission<DeploymentUpdateResponse>> {
        let response = self.client.update_deployment(id, request, params).await?;
        info!("Updated deployment {id}");

        let tracking = if track {
            self.track(TrackTask::from_response(
                &response.resources,
                response.shutdown_resources.as_ref(),
            ))
            .await
        } else {
            None
        };
        Ok(Submission { response, tracking })
    }

    /// Reads a deployment.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn show(&self, id: &DeploymentId, params: &ShowParams) -> Result<DeploymentGetResponse> {
        self.client.get_deployment(id, params).await
    }

    /// Deletes a deployment whose resources are all stopped.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::NotStopped`] without deleting anything
    /// when a resource is still running, or the API error of a request.
    pub async fn delete(&self, id: &DeploymentId) -> Result<DeploymentDeleteResponse> {
        let deployment = self.client.get_deployment(id, &ShowParams::default()).await?;
        if let Some((kind, resource)) = deployment
            .resources
            .iter()
            .find(|(_, resource)| !resource.info.status.is_stopped())
        {
            debug!("{kind} resource {} is {}", resource.ref_id, resource.info.status);
            return Err(PreconditionError::NotStopped {
                operation: String::from("deployment delete"),
            }
            .into());
        }

        let response = self.client.delete_deployment(id).await?;
        info!("Deleted deployment {id}");
        Ok(response)
    }

    /// Shuts every resource of a deployment down.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn shutdown(
        &self,
        id: &DeploymentId,
        params: &ShutdownParams,
    ) -> Result<DeploymentCommandResponse> {
        info!("Shutting down deployment {id}");
        self.client.shutdown_deployment(id, params).await
    }

    /// Restores a shut down deployment.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn restore(&self, id: &DeploymentId, restore_snapshot: bool) -> Result<DeploymentCommandResponse> {
        info!("Restoring deployment {id}");
        self.client.restore_deployment(id, restore_snapshot).await
    }

    /// Resynchronizes the search index of one deployment.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn resync(&self, id: &DeploymentId) -> Result<ResourceCommandResponse> {
        self.client.resync_deployment(id).await
    }

    /// Resynchronizes the search index of every deployment.
    ///
    /// # Errors
    ///
    /// Returns the API error of the request.
    pub async fn resync_all(&self) -> Result<IndexSyncResults> {
        self.client.resync_deployments().await
    }

    async fn track(&self, tasks: Vec<TrackTask>) -> Option<MultiError<TrackError>> {
        ChangeTracker::new(Arc::new(self.client.clone()), self.output.clone())
            .with_config(self.track_config)
            .with_cancel(self.cancel.clone())
            .track(tasks)
            .await
            .err()
    }
}
