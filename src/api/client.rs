//! Deployment API client implementation.
//!
//! This module provides the HTTP client for the deployment platform REST API.
//! Reads are retried on transient failures; mutations are sent once.

use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::cancel::CancelToken;
use crate::config::ClientConfig;
use crate::deployment::{DeploymentId, ResourceKind};
use crate::error::{ApiError, ConfigError, EceError, Result};

use super::plan::{Plan, PlanActivity};
use super::template::{DeploymentTemplateInfo, StackVersionList};
use super::types::{
    ClusterCrudResponse, DeploymentCommandResponse, DeploymentCreateRequest,
    DeploymentCreateResponse, DeploymentDeleteResponse, DeploymentGetResponse,
    DeploymentUpdateRequest, DeploymentUpdateResponse, IndexSyncResults, ResourceCommandResponse,
    ResourceInfo, ResourceUpgradeResponse,
};

/// Path prefix of every endpoint.
const API_PREFIX: &str = "api/v1";

/// Maximum number of attempts for reads.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Body placeholder for requests without one.
const NO_BODY: Option<&()> = None;

type Query = Vec<(&'static str, String)>;

/// Deployment API client.
#[derive(Debug, Clone)]
pub struct EceClient {
    /// HTTP client.
    client: Client,
    /// `{host}/api/v1`.
    base_url: Url,
    /// Credentials sent with every request.
    auth: Auth,
    /// Aborts in-flight requests when fired.
    cancel: Option<CancelToken>,
    /// Base delay between read retries.
    retry_delay: Duration,
}

#[derive(Clone)]
enum Auth {
    ApiKey(String),
    Basic { user: String, password: String },
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(..)"),
            Self::Basic { user, .. } => write!(f, "Basic({user})"),
        }
    }
}

/// Flags of deployment and resource reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowParams {
    /// Include current and pending plans.
    pub show_plans: bool,
    /// Include plan step logs.
    pub show_plan_logs: bool,
    /// Include the plan history.
    pub show_plan_history: bool,
    /// Include server-side plan defaults.
    pub show_plan_defaults: bool,
    /// Include metadata.
    pub show_metadata: bool,
    /// Include settings.
    pub show_settings: bool,
    /// Number of system alerts to include.
    pub show_system_alerts: u32,
    /// Fill plan gaps from the deployment template.
    pub enrich_with_template: bool,
    /// Convert legacy plans to the current format.
    pub convert_legacy_plans: bool,
}

/// Flags of deployment updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateParams {
    /// Skip the snapshot of resources shut down by the update.
    pub skip_snapshot: bool,
    /// Hide resources shut down by the update.
    pub hide_pruned_orphans: bool,
    /// Only validate the request.
    pub validate_only: bool,
}

/// Flags of shutdown requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownParams {
    /// Skip the final snapshot.
    pub skip_snapshot: bool,
    /// Hide the resource once stopped.
    pub hide: bool,
}

/// Instances targeted by stop, start and maintenance requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InstanceSelection {
    /// Every instance of the resource.
    #[default]
    All,
    /// The listed instances.
    Only {
        /// Instance ids.
        ids: Vec<String>,
        /// Do not fail on unknown instance ids.
        ignore_missing: bool,
    },
}

impl ShowParams {
    /// Flags needed to read the template a deployment was created from.
    #[must_use]
    pub const fn template_discovery() -> Self {
        Self {
            show_plans: true,
            show_plan_logs: false,
            show_plan_history: false,
            show_plan_defaults: false,
            show_metadata: false,
            show_settings: false,
            show_system_alerts: 0,
            enrich_with_template: true,
            convert_legacy_plans: true,
        }
    }

    fn query(&self) -> Query {
        let flags = [
            ("show_plans", self.show_plans),
            ("show_plan_logs", self.show_plan_logs),
            ("show_plan_history", self.show_plan_history),
            ("show_plan_defaults", self.show_plan_defaults),
            ("show_metadata", self.show_metadata),
            ("show_settings", self.show_settings),
            ("enrich_with_template", self.enrich_with_template),
            ("convert_legacy_plans", self.convert_legacy_plans),
        ];
        let mut query: Query = flags
            .into_iter()
            .map(|(name, value)| (name, value.to_string()))
            .collect();
        if self.show_system_alerts > 0 {
            query.push(("show_system_alerts", self.show_system_alerts.to_string()));
        }
        query
    }
}

impl InstanceSelection {
    fn path(&self, base: &str, action: &str) -> (String, Query) {
        match self {
            Self::All => (format!("{base}/instances/{action}"), Vec::new()),
            Self::Only {
                ids,
                ignore_missing,
            } => (
                format!("{base}/instances/{}/{action}", ids.join(",")),
                vec![("ignore_missing", ignore_missing.to_string())],
            ),
        }
    }
}

impl EceClient {
    /// Creates a client from the given settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the host or credentials are missing,
    /// or a configuration error if the host is not a valid URL.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let host = config.host.trim().trim_end_matches('/');
        let host = if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        let base_url = Url::parse(&format!("{host}/{API_PREFIX}")).map_err(|e| {
            EceError::Config(ConfigError::InvalidValue {
                field: String::from("host"),
                message: e.to_string(),
            })
        })?;

        let auth = match (&config.api_key, &config.user, &config.password) {
            (Some(key), _, _) if !key.is_empty() => Auth::ApiKey(key.clone()),
            (_, Some(user), Some(password)) => Auth::Basic {
                user: user.clone(),
                password: password.clone(),
            },
            _ => return Err(crate::error::ValidationError::MissingApi.into()),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            auth,
            cancel: None,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Aborts in-flight requests when `token` fires.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sets the base delay between read retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Returns the API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    // Deployments

    /// Reads a deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_deployment(
        &self,
        id: &DeploymentId,
        params: &ShowParams,
    ) -> Result<DeploymentGetResponse> {
        self.get(&format!("deployments/{id}"), params.query()).await
    }

    /// Creates a deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_deployment(
        &self,
        request: &DeploymentCreateRequest,
        validate_only: bool,
    ) -> Result<DeploymentCreateResponse> {
        let query = vec![("validate_only", validate_only.to_string())];
        self.send(Method::POST, "deployments", query, Some(request))
            .await
    }

    /// Updates a deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_deployment(
        &self,
        id: &DeploymentId,
        request: &DeploymentUpdateRequest,
        params: &UpdateParams,
    ) -> Result<DeploymentUpdateResponse> {
        let query = vec![
            ("skip_snapshot", params.skip_snapshot.to_string()),
            ("hide_pruned_orphans", params.hide_pruned_orphans.to_string()),
            ("validate_only", params.validate_only.to_string()),
        ];
        self.send(Method::PUT, &format!("deployments/{id}"), query, Some(request))
            .await
    }

    /// Deletes a stopped deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_deployment(&self, id: &DeploymentId) -> Result<DeploymentDeleteResponse> {
        self.send(Method::DELETE, &format!("deployments/{id}"), Vec::new(), NO_BODY)
            .await
    }

    /// Shuts every resource of a deployment down.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn shutdown_deployment(
        &self,
        id: &DeploymentId,
        params: &ShutdownParams,
    ) -> Result<DeploymentCommandResponse> {
        let query = vec![
            ("skip_snapshot", params.skip_snapshot.to_string()),
            ("hide", params.hide.to_string()),
        ];
        self.send(Method::POST, &format!("deployments/{id}/_shutdown"), query, NO_BODY)
            .await
    }

    /// Restores a shut down deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn restore_deployment(
        &self,
        id: &DeploymentId,
        restore_snapshot: bool,
    ) -> Result<DeploymentCommandResponse> {
        let query = vec![("restore_snapshot", restore_snapshot.to_string())];
        self.send(Method::POST, &format!("deployments/{id}/_restore"), query, NO_BODY)
            .await
    }

    /// Resynchronizes the search index of one deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn resync_deployment(&self, id: &DeploymentId) -> Result<ResourceCommandResponse> {
        self.send(Method::POST, &format!("deployments/{id}/_resync"), Vec::new(), NO_BODY)
            .await
    }

    /// Resynchronizes the search index of every deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn resync_deployments(&self) -> Result<IndexSyncResults> {
        self.send(Method::POST, "deployments/_resync", Vec::new(), NO_BODY)
            .await
    }

    // Deployment resources

    /// Reads one resource of a deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_resource(
        &self,
        id: &DeploymentId,
        kind: ResourceKind,
        ref_id: &str,
        params: &ShowParams,
    ) -> Result<ResourceInfo> {
        self.get(&format!("deployments/{id}/{kind}/{ref_id}"), params.query())
            .await
    }

    /// Shuts a resource down.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn shutdown_resource(
        &self,
        id: &DeploymentId,
        kind: ResourceKind,
        ref_id: &str,
        params: &ShutdownParams,
    ) -> Result<ResourceCommandResponse> {
        let query = vec![
            ("skip_snapshot", params.skip_snapshot.to_string()),
            ("hide", params.hide.to_string()),
        ];
        let path = format!("deployments/{id}/{kind}/{ref_id}/_shutdown");
        self.send(Method::POST, &path, query, NO_BODY).await
    }

    /// Restores a shut down resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn restore_resource(
        &self,
        id: &DeploymentId,
        kind: ResourceKind,
        ref_id: &str,
        restore_snapshot: bool,
    ) -> Result<ResourceCommandResponse> {
        let query = vec![("restore_snapshot", restore_snapshot.to_string())];
        let path = format!("deployments/{id}/{kind}/{ref_id}/_restore");
        self.send(Method::POST, &path, query, NO_BODY).await
    }

    /// Upgrades a resource to the Elasticsearch version.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn upgrade_resource(
        &self,
        id: &DeploymentId,
        kind: ResourceKind,
        ref_id: &str,
    ) -> Result<ResourceUpgradeResponse> {
        let path = format!("deployments/{id}/{kind}/{ref_id}/_upgrade");
        self.send(Method::POST, &path, Vec::new(), NO_BODY).await
    }

    /// Stops or starts instances of a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn set_instances_running(
        &self,
        id: &DeploymentId,
        kind: ResourceKind,
        ref_id: &str,
        selection: &InstanceSelection,
        running: bool,
    ) -> Result<ResourceCommandResponse> {
        let action = if running { "_start" } else { "_stop" };
        let (path, query) = selection.path(&format!("deployments/{id}/{kind}/{ref_id}"), action);
        self.send(Method::POST, &path, query, NO_BODY).await
    }

    /// Moves instances of a resource in or out of maintenance mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn set_maintenance_mode(
        &self,
        id: &DeploymentId,
        kind: ResourceKind,
        ref_id: &str,
        selection: &InstanceSelection,
        enabled: bool,
    ) -> Result<ResourceCommandResponse> {
        let action = if enabled {
            "maintenance-mode/_start"
        } else {
            "maintenance-mode/_stop"
        };
        let (path, query) = selection.path(&format!("deployments/{id}/{kind}/{ref_id}"), action);
        self.send(Method::POST, &path, query, NO_BODY).await
    }

    /// Deletes a stopped stateless resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_resource(
        &self,
        id: &DeploymentId,
        kind: ResourceKind,
        ref_id: &str,
    ) -> Result<ResourceCommandResponse> {
        let path = format!("deployments/{id}/{kind}/{ref_id}");
        self.send(Method::DELETE, &path, Vec::new(), NO_BODY).await
    }

    // Resource-id addressed endpoints

    /// Resynchronizes the search index of one resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn resync_resource(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> Result<ResourceCommandResponse> {
        let path = format!("{}/{resource_id}/_resync", kind.cluster_path());
        self.send(Method::POST, &path, Vec::new(), NO_BODY).await
    }

    /// Reads the plan activity of a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_plan_activity(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        show_plan_defaults: bool,
        show_plan_logs: bool,
    ) -> Result<PlanActivity> {
        let query = vec![
            ("show_plan_defaults", show_plan_defaults.to_string()),
            ("show_plan_logs", show_plan_logs.to_string()),
        ];
        let path = format!("{}/{resource_id}/plan/activity", kind.cluster_path());
        self.get(&path, query).await
    }

    /// Reads the plan activity of a resource with a single request.
    ///
    /// Change tracking keeps its own retry budget, so transient failures are
    /// returned to the caller instead of being retried here.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn poll_plan_activity(&self, kind: ResourceKind, resource_id: &str) -> Result<PlanActivity> {
        let query = vec![
            ("show_plan_defaults", false.to_string()),
            ("show_plan_logs", false.to_string()),
        ];
        let path = format!("{}/{resource_id}/plan/activity", kind.cluster_path());
        self.send_attempts(Method::GET, &path, query, NO_BODY, 1).await
    }

    /// Submits a plan for a resource.
    ///
    /// `validate_only` is only sent for kinds that accept it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn submit_plan(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        plan: &Plan,
        validate_only: bool,
    ) -> Result<ClusterCrudResponse> {
        let mut query = Vec::new();
        if kind.supports_validate_only() {
            query.push(("validate_only", validate_only.to_string()));
        }
        let path = format!("{}/{resource_id}/plan", kind.cluster_path());
        self.send(Method::PUT, &path, query, Some(plan)).await
    }

    /// Cancels the pending plan of a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn cancel_pending_plan(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> Result<ResourceCommandResponse> {
        let path = format!("{}/{resource_id}/plan/pending", kind.cluster_path());
        self.send(Method::DELETE, &path, Vec::new(), NO_BODY).await
    }

    // Platform configuration

    /// Reads a deployment template.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_template(&self, template_id: &str) -> Result<DeploymentTemplateInfo> {
        let query = vec![("show_instance_configurations", String::from("true"))];
        self.get(&format!("platform/configuration/templates/{template_id}"), query)
            .await
    }

    /// Lists the available stack versions.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_stack_versions(&self) -> Result<StackVersionList> {
        self.get("platform/configuration/stacks", Vec::new()).await
    }

    // Transport

    async fn get<T: DeserializeOwned>(&self, path: &str, query: Query) -> Result<T> {
        self.send(Method::GET, path, query, NO_BODY).await
    }

    /// Sends a request, retrying reads on transient failures.
    async fn send<T, B>(&self, method: Method, path: &str, query: Query, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let attempts = if method == Method::GET { MAX_RETRIES } else { 1 };
        self.send_attempts(method, path, query, body, attempts).await
    }

    async fn send_attempts<T, B>(
        &self,
        method: Method,
        path: &str,
        query: Query,
        body: Option<&B>,
        attempts: u32,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES} for {path}");
                self.cancellable(tokio::time::sleep(self.retry_delay * attempt))
                    .await?;
            }

            match self
                .send_once::<T, B>(method.clone(), url.clone(), &query, body)
                .await
            {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::network("Max retries exceeded").into()))
    }

    async fn send_once<T, B>(
        &self,
        method: Method,
        url: Url,
        query: &Query,
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        trace!("{method} {url}");

        let mut request = self
            .client
            .request(method, url)
            .query(query)
            .header(header::ACCEPT, "application/json");
        request = match &self.auth {
            Auth::ApiKey(key) => request.header(header::AUTHORIZATION, format!("ApiKey {key}")),
            Auth::Basic { user, password } => request.basic_auth(user, Some(password)),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self
            .cancellable(request.send())
            .await?
            .map_err(|e| ApiError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(ApiError::RateLimited {
                retry_after_secs: retry_after,
            }
            .into());
        }

        let text = self
            .cancellable(response.text())
            .await?
            .map_err(|e| ApiError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::remote(status.as_u16(), text).into());
        }

        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            ApiError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            }
            .into()
        })
    }

    /// Runs `future` unless the cancel token fires first.
    async fn cancellable<F: Future>(&self, future: F) -> Result<F::Output> {
        match &self.cancel {
            Some(token) => tokio::select! {
                output = future => Ok(output),
                () = token.cancelled() => Err(ApiError::Cancelled.into()),
            },
            None => Ok(future.await),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| EceError::internal("API host cannot be used as a base URL"))?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use crate::test_support::{mock_client, DEPLOYMENT_ID};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_requires_host_and_credentials() {
        let err = EceClient::new(&ClientConfig::default()).unwrap_err();
        assert!(err.validation_errors().is_some());
    }

    #[test]
    fn test_base_url() {
        let client =
            EceClient::new(&ClientConfig::with_api_key("ece.local:12443/", "key")).unwrap();
        assert_eq!(client.base_url().as_str(), "https://ece.local:12443/api/v1");
        let url = client.endpoint("clusters/apm/abc/plan").unwrap();
        assert_eq!(url.as_str(), "https://ece.local:12443/api/v1/clusters/apm/abc/plan");
    }

    #[tokio::test]
    async fn test_get_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/platform/configuration/stacks"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/platform/configuration/stacks"))
            .and(header("authorization", "ApiKey test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"stacks": [{"version": "7.4.2"}]})),
            )
            .mount(&server)
            .await;

        let stacks = mock_client(&server).list_stack_versions().await.unwrap();
        assert_eq!(stacks.stacks[0].version, "7.4.2");
    }

    #[tokio::test]
    async fn test_plan_polling_sends_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/clusters/kibana/abc/plan/activity"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = mock_client(&server)
            .poll_plan_activity(ResourceKind::Kibana, "abc")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_mutations_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/api/v1/deployments/{DEPLOYMENT_ID}")))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let id = DeploymentId::parse(DEPLOYMENT_ID).unwrap();
        let err = mock_client(&server).delete_deployment(&id).await.unwrap_err();
        assert!(matches!(
            err,
            EceError::Api(ApiError::Remote { status: 500, ref body }) if body == "boom"
        ));
    }

    #[tokio::test]
    async fn test_validate_only_sent_for_elasticsearch_only() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/clusters/elasticsearch/abc/plan"))
            .and(query_param("validate_only", "false"))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let result = client
            .submit_plan(ResourceKind::Elasticsearch, "abc", &Plan::default(), false)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let handle = CancelHandle::new();
        let client = mock_client(&server).with_cancel(handle.token());
        handle.cancel();

        let err = client.list_stack_versions().await.unwrap_err();
        assert!(matches!(err, EceError::Api(ApiError::Cancelled)));
    }
}
