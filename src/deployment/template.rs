//! Template resolution.
//!
//! Stateless resources are created inside an existing deployment. When the
//! caller does not name the deployment template or the Elasticsearch ref id,
//! both are read from the deployment's first Elasticsearch resource that
//! carries a template reference.

use tracing::debug;

use crate::api::{DeploymentGetResponse, EceClient, ShowParams};
use crate::deployment::{DeploymentId, ResourceKind, SimpleSpec};
use crate::error::{DiscoveryError, Result};

/// Template id and Elasticsearch ref id found on a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateOrigin {
    /// Deployment template the Elasticsearch resource was created from.
    pub template_id: String,
    /// Ref id of that Elasticsearch resource.
    pub elasticsearch_ref_id: String,
}

/// Fills missing template information from an existing deployment.
#[derive(Debug)]
pub struct TemplateResolver<'a> {
    client: &'a EceClient,
}

impl<'a> TemplateResolver<'a> {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(client: &'a EceClient) -> Self {
        Self { client }
    }

    /// Returns `spec` with the template id and Elasticsearch ref id filled in.
    ///
    /// Values already present are kept. No request is made when both are
    /// present.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed deployment id,
    /// [`DiscoveryError::TemplateUnavailable`] when no Elasticsearch resource
    /// references a template, or the API error of the deployment read.
    pub async fn resolve(&self, mut spec: SimpleSpec) -> Result<SimpleSpec> {
        if spec.template_id().is_some() && spec.elasticsearch_ref_id().is_some() {
            return Ok(spec);
        }

        let id = DeploymentId::parse(spec.deployment_id().unwrap_or_default())?;
        debug!("Resolving deployment template of {id}");
        let deployment = self
            .client
            .get_deployment(&id, &ShowParams::template_discovery())
            .await?;

        let origin = find_origin(&deployment).ok_or_else(|| DiscoveryError::TemplateUnavailable {
            deployment_id: id.to_string(),
        })?;

        if spec.template_id().is_none() {
            spec.template_id = Some(origin.template_id);
        }
        if spec.elasticsearch_ref_id().is_none() {
            spec.elasticsearch_ref_id = Some(origin.elasticsearch_ref_id);
        }
        Ok(spec)
    }
}

/// Finds the first Elasticsearch resource whose current plan references a
/// deployment template.
#[must_use]
pub fn find_origin(deployment: &DeploymentGetResponse) -> Option<TemplateOrigin> {
    deployment
        .resources
        .of(ResourceKind::Elasticsearch)
        .iter()
        .find_map(|resource| {
            let template_id = resource
                .info
                .plan_info
                .current
                .as_ref()?
                .plan
                .as_ref()?
                .template_id()?;
            Some(TemplateOrigin {
                template_id: template_id.to_string(),
                elasticsearch_ref_id: resource.ref_id.clone(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EceError;
    use crate::test_support::{deployment_json, mock_client, mount_deployment, DEPLOYMENT_ID};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_discovers_template_and_ref_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/deployments/{DEPLOYMENT_ID}")))
            .and(query_param("enrich_with_template", "true"))
            .and(query_param("convert_legacy_plans", "true"))
            .and(query_param("show_plans", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(deployment_json(Some("default"))))
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let spec = SimpleSpec::new("ece-region").with_deployment_id(DEPLOYMENT_ID);
        let resolved = TemplateResolver::new(&client).resolve(spec).await.unwrap();

        assert_eq!(resolved.template_id.as_deref(), Some("default"));
        assert_eq!(resolved.elasticsearch_ref_id.as_deref(), Some("main-elasticsearch"));
    }

    #[tokio::test]
    async fn test_keeps_given_values() {
        let server = MockServer::start().await;
        mount_deployment(&server, deployment_json(Some("default"))).await;

        let client = mock_client(&server);
        let spec = SimpleSpec::new("ece-region")
            .with_deployment_id(DEPLOYMENT_ID)
            .with_elasticsearch_ref_id("my-es");
        let resolved = TemplateResolver::new(&client).resolve(spec).await.unwrap();

        assert_eq!(resolved.template_id.as_deref(), Some("default"));
        assert_eq!(resolved.elasticsearch_ref_id.as_deref(), Some("my-es"));
    }

    #[tokio::test]
    async fn test_skips_request_when_complete() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let spec = SimpleSpec::new("ece-region")
            .with_template_id("io-optimized")
            .with_elasticsearch_ref_id("main-elasticsearch");
        let resolved = TemplateResolver::new(&client).resolve(spec.clone()).await.unwrap();
        assert_eq!(resolved, spec);
    }

    #[tokio::test]
    async fn test_template_unavailable() {
        let server = MockServer::start().await;
        mount_deployment(&server, deployment_json(None)).await;

        let client = mock_client(&server);
        let spec = SimpleSpec::new("ece-region").with_deployment_id(DEPLOYMENT_ID);
        let err = TemplateResolver::new(&client).resolve(spec).await.unwrap_err();
        assert!(matches!(
            err,
            EceError::Discovery(DiscoveryError::TemplateUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_deployment_id() {
        let server = MockServer::start().await;
        let client = mock_client(&server);
        let spec = SimpleSpec::new("ece-region").with_deployment_id("short");
        let err = TemplateResolver::new(&client).resolve(spec).await.unwrap_err();
        assert!(err.validation_errors().is_some());
    }
}
