//! Resource payload construction.
//!
//! Payloads are built from a deployment template: the template's topology is
//! matched against the requested elements and the requested capacity is laid
//! over it. A missing stack version is replaced with the newest available.

use semver::Version;
use tracing::{debug, info};

use crate::api::{
    DeploymentTemplateInfo, EceClient, Plan, ResourcePayload, StackVersionList, TemplateReference,
    TopologySlot,
};
use crate::error::{DiscoveryError, MultiError, Result, ValidationError};

use super::ids::DeploymentId;
use super::kind::ResourceKind;
use super::spec::{SimpleSpec, TopologyElement};
use super::template::TemplateResolver;

/// Builds create and update payloads from a [`SimpleSpec`].
#[derive(Debug)]
pub struct PayloadBuilder<'a> {
    client: &'a EceClient,
}

impl<'a> PayloadBuilder<'a> {
    /// Creates a builder.
    #[must_use]
    pub const fn new(client: &'a EceClient) -> Self {
        Self { client }
    }

    /// Builds an Elasticsearch payload.
    ///
    /// With no topology requested a single `data` element of `size` and
    /// `zone_count` is used.
    ///
    /// # Errors
    ///
    /// Returns the collected validation errors, a discovery error if no
    /// version was given and none can be found, or a template mismatch.
    pub async fn build_elasticsearch(&self, spec: &SimpleSpec) -> Result<ResourcePayload> {
        validate_elasticsearch(spec)?;

        let version = match spec.version() {
            Some(version) => version.to_string(),
            None => self.latest_version().await?,
        };

        let template_id = spec.template_id_or_default();
        let template = self.client.get_template(template_id).await?;
        let section = template
            .deployment_template
            .resources
            .of(ResourceKind::Elasticsearch)
            .first()
            .ok_or_else(|| ValidationError::TemplateKindMissing {
                kind: ResourceKind::Elasticsearch,
                template_id: template_id.to_string(),
            })?;

        let topology =
            match_topology(&spec.requested_topology(), &section.plan.cluster_topology, template_id)?;

        let mut plan = Plan::for_kind(ResourceKind::Elasticsearch, Some(version));
        plan.cluster_topology = topology;
        plan.deployment_template = Some(TemplateReference::new(template_id));

        Ok(ResourcePayload {
            ref_id: spec.ref_id_or_default(ResourceKind::Elasticsearch),
            region: spec.region.clone(),
            elasticsearch_cluster_ref_id: None,
            display_name: spec.name.clone().filter(|n| !n.is_empty()),
            plan,
            settings: None,
        })
    }

    /// Builds a payload for a stateless kind attached to an existing
    /// deployment.
    ///
    /// The template id and Elasticsearch ref id are resolved from the
    /// deployment when absent. The version is left unset when not given so
    /// the server uses the Elasticsearch version.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedKind`] for Elasticsearch, the
    /// collected validation errors, a resolution error, or
    /// [`ValidationError::TemplateKindMissing`].
    pub async fn build_stateless(&self, kind: ResourceKind, spec: &SimpleSpec) -> Result<ResourcePayload> {
        validate_stateless(kind, spec)?;

        let spec = TemplateResolver::new(self.client).resolve(spec.clone()).await?;
        let template_id = spec.template_id_or_default();
        let template = self.client.get_template(template_id).await?;
        let slot = stateless_topology(kind, &template, &spec, template_id)?;

        let mut plan = Plan::for_kind(kind, spec.version().map(str::to_string));
        plan.cluster_topology = vec![slot];

        Ok(ResourcePayload {
            ref_id: spec.ref_id_or_default(kind),
            region: spec.region.clone(),
            elasticsearch_cluster_ref_id: Some(
                spec.elasticsearch_ref_id()
                    .unwrap_or_else(|| ResourceKind::Elasticsearch.default_ref_id())
                    .to_string(),
            ),
            display_name: spec.name.clone().filter(|n| !n.is_empty()),
            plan,
            settings: None,
        })
    }

    /// Returns the newest stack version known to the platform.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::VersionDiscoveryFailed`] when the list is
    /// empty or holds no valid version, or the API error of the request.
    pub async fn latest_version(&self) -> Result<String> {
        let stacks = self.client.list_stack_versions().await?;
        let version = select_latest(&stacks)?;
        info!("Using latest stack version {version}");
        Ok(version)
    }
}

/// Validates the parameters of an Elasticsearch payload.
///
/// # Errors
///
/// Returns every problem found.
pub fn validate_elasticsearch(spec: &SimpleSpec) -> std::result::Result<(), MultiError<ValidationError>> {
    let mut errors = MultiError::new();
    if spec.region.is_empty() {
        errors.push(ValidationError::MissingField { field: "region" });
    }
    for element in &spec.topology {
        element.validate(&mut errors);
    }
    errors.into_result()
}

/// Validates the parameters of a stateless payload.
///
/// # Errors
///
/// Returns every problem found.
pub fn validate_stateless(
    kind: ResourceKind,
    spec: &SimpleSpec,
) -> std::result::Result<(), MultiError<ValidationError>> {
    let mut errors = MultiError::new();
    if !kind.is_stateless() {
        errors.push(ValidationError::UnsupportedKind {
            operation: String::from("stateless payload"),
            kind,
        });
    }
    if let Err(e) = DeploymentId::parse(spec.deployment_id().unwrap_or_default()) {
        errors.push(e);
    }
    if spec.region.is_empty() {
        errors.push(ValidationError::MissingField { field: "region" });
    }
    errors.into_result()
}

/// Matches requested elements to template topology elements.
///
/// Requested elements are walked in order. Each template element whose node
/// type serves the requested role is emitted as a copy, with a non-zero size
/// and zone count replacing the template values. Template elements no request
/// matches are dropped.
///
/// # Errors
///
/// Returns [`ValidationError::TopologyUnsatisfiable`] when nothing matches.
pub fn match_topology(
    requested: &[TopologyElement],
    template: &[TopologySlot],
    template_id: &str,
) -> std::result::Result<Vec<TopologySlot>, ValidationError> {
    let mut topology = Vec::new();
    for element in requested {
        let Some(role) = element.role() else {
            continue;
        };
        for slot in template {
            if !slot.node_type.as_ref().is_some_and(|node_type| role.matches(node_type)) {
                continue;
            }
            debug!("Template element {:?} serves {}", slot.instance_configuration_id, element.name);
            let mut slot = slot.clone();
            overlay(&mut slot, element.size, element.zone_count);
            topology.push(slot);
        }
    }

    if topology.is_empty() {
        let names: Vec<&str> = requested.iter().map(|e| e.name.as_str()).collect();
        return Err(ValidationError::TopologyUnsatisfiable {
            requested: names.join(", "),
            template_id: template_id.to_string(),
        });
    }
    Ok(topology)
}

/// Returns the first topology element of the template's section for `kind`,
/// with the requested capacity applied.
///
/// # Errors
///
/// Returns [`ValidationError::TemplateKindMissing`] if the template has no
/// such section or the section has no topology.
pub fn stateless_topology(
    kind: ResourceKind,
    template: &DeploymentTemplateInfo,
    spec: &SimpleSpec,
    template_id: &str,
) -> std::result::Result<TopologySlot, ValidationError> {
    let mut slot = template
        .deployment_template
        .resources
        .of(kind)
        .first()
        .and_then(|section| section.plan.cluster_topology.first())
        .cloned()
        .ok_or_else(|| ValidationError::TemplateKindMissing {
            kind,
            template_id: template_id.to_string(),
        })?;
    overlay(&mut slot, spec.size, spec.zone_count);
    Ok(slot)
}

/// Picks the highest semantic version, ignoring deleted and unparsable
/// entries.
///
/// # Errors
///
/// Returns [`DiscoveryError::VersionDiscoveryFailed`] when nothing is left.
pub fn select_latest(stacks: &StackVersionList) -> std::result::Result<String, DiscoveryError> {
    if stacks.stacks.is_empty() {
        return Err(DiscoveryError::VersionDiscoveryFailed {
            reason: String::from("the platform reported no stack versions"),
        });
    }
    stacks
        .stacks
        .iter()
        .filter(|stack| !stack.deleted)
        .filter_map(|stack| Version::parse(&stack.version).ok().map(|v| (v, &stack.version)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw.clone())
        .ok_or_else(|| DiscoveryError::VersionDiscoveryFailed {
            reason: String::from("no valid stack version available"),
        })
}

fn overlay(slot: &mut TopologySlot, size: u32, zone_count: u32) {
    if size > 0 {
        slot.set_size(size);
    }
    if zone_count > 0 {
        slot.zone_count = Some(zone_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{NodeType, StackVersion};
    use crate::deployment::spec::TopologyRole;
    use crate::error::EceError;
    use crate::test_support::{
        deployment_json, mock_client, mount_deployment, mount_template, DEPLOYMENT_ID,
    };
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn template_slots() -> Vec<TopologySlot> {
        let template: DeploymentTemplateInfo =
            serde_json::from_value(crate::test_support::template_json()).unwrap();
        template.deployment_template.resources.elasticsearch[0]
            .plan
            .cluster_topology
            .clone()
    }

    fn stacks(versions: &[&str]) -> StackVersionList {
        StackVersionList {
            stacks: versions
                .iter()
                .map(|v| StackVersion {
                    version: (*v).to_string(),
                    deleted: false,
                })
                .collect(),
        }
    }

    #[test]
    fn test_match_topology_overlays_capacity() {
        let requested = vec![
            TopologyElement::new("data", 4096, 2),
            TopologyElement::new("master", 1024, 0),
        ];
        let topology = match_topology(&requested, &template_slots(), "default").unwrap();

        assert_eq!(topology.len(), 2);
        assert_eq!(topology[0].size_value(), Some(4096));
        assert_eq!(topology[0].zone_count, Some(2));
        assert_eq!(topology[1].instance_configuration_id.as_deref(), Some("master"));
        assert_eq!(topology[1].size_value(), Some(1024));
        assert_eq!(topology[1].zone_count, Some(1));
    }

    #[test]
    fn test_match_topology_follows_request_order() {
        let requested = vec![
            TopologyElement::new("ml", 4096, 1),
            TopologyElement::new("data", 2048, 2),
        ];
        let topology = match_topology(&requested, &template_slots(), "default").unwrap();

        assert_eq!(topology.len(), 2);
        assert_eq!(topology[0].instance_configuration_id.as_deref(), Some("ml"));
        assert_eq!(topology[0].size_value(), Some(4096));
        assert_eq!(topology[1].instance_configuration_id.as_deref(), Some("data.default"));
        assert_eq!(topology[1].size_value(), Some(2048));
    }

    #[test]
    fn test_match_topology_keeps_repeated_roles() {
        let requested = vec![
            TopologyElement::new("data", 2048, 1),
            TopologyElement::new("data", 8192, 3),
        ];
        let topology = match_topology(&requested, &template_slots(), "default").unwrap();

        assert_eq!(topology.len(), 2);
        assert_eq!(topology[0].size_value(), Some(2048));
        assert_eq!(topology[1].size_value(), Some(8192));
        assert_eq!(topology[1].zone_count, Some(3));
    }

    #[test]
    fn test_match_topology_unsatisfiable() {
        let template = vec![TopologySlot {
            node_type: Some(NodeType {
                data: Some(true),
                ..NodeType::default()
            }),
            ..TopologySlot::default()
        }];
        let err = match_topology(&[TopologyElement::new("ml", 1024, 1)], &template, "default")
            .unwrap_err();
        assert!(matches!(err, ValidationError::TopologyUnsatisfiable { .. }));
    }

    #[test]
    fn test_zero_size_keeps_template_value() {
        let topology =
            match_topology(&[TopologyElement::new("data", 0, 0)], &template_slots(), "default")
                .unwrap();
        assert_eq!(topology[0].size_value(), Some(1024));
        assert_eq!(topology[0].zone_count, Some(1));
    }

    #[test]
    fn test_select_latest_uses_semver() {
        assert_eq!(select_latest(&stacks(&["7.9.3", "7.10.0", "6.8.0"])).unwrap(), "7.10.0");
        assert_eq!(select_latest(&stacks(&["garbage", "7.4.2"])).unwrap(), "7.4.2");
        assert!(select_latest(&stacks(&[])).is_err());
        assert!(select_latest(&stacks(&["latest"])).is_err());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let spec = SimpleSpec::new("").with_topology(vec![TopologyElement::new("coordinating", 0, 1)]);
        let errors = validate_elasticsearch(&spec).unwrap_err();
        assert_eq!(errors.len(), 3);

        let errors = validate_stateless(ResourceKind::Apm, &SimpleSpec::new("")).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[tokio::test]
    async fn test_elasticsearch_payload_with_explicit_version() {
        let server = MockServer::start().await;
        mount_template(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/platform/configuration/stacks"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let spec = SimpleSpec::new("ece-region")
            .with_version("7.4.2")
            .with_capacity(4096, 1);
        let payload = PayloadBuilder::new(&client).build_elasticsearch(&spec).await.unwrap();

        assert_eq!(payload.ref_id, "main-elasticsearch");
        assert_eq!(payload.plan.version(ResourceKind::Elasticsearch), Some("7.4.2"));
        assert_eq!(payload.plan.template_id(), Some("default"));
        assert_eq!(payload.plan.cluster_topology.len(), 1);
        assert_eq!(payload.plan.cluster_topology[0].size_value(), Some(4096));
    }

    #[tokio::test]
    async fn test_elasticsearch_payload_from_raw_topology() {
        let server = MockServer::start().await;
        mount_template(&server).await;

        let raws = [
            r#"{"name":"data","size":2048,"zone_count":2}"#,
            r#"{"name":"ml","size":4096,"zone_count":1}"#,
            r#"{"name":"master","size":1024,"zone_count":1}"#,
        ];
        let topology = TopologyElement::parse_all(&raws[..]).unwrap();
        let client = mock_client(&server);
        let spec = SimpleSpec::new("ece-region")
            .with_version("7.4.2")
            .with_topology(topology);
        let payload = PayloadBuilder::new(&client).build_elasticsearch(&spec).await.unwrap();

        let slots = &payload.plan.cluster_topology;
        assert_eq!(slots.len(), 3);
        let expected = [
            (TopologyRole::Data, 2048, 2),
            (TopologyRole::Ml, 4096, 1),
            (TopologyRole::Master, 1024, 1),
        ];
        for (slot, (role, size, zones)) in slots.iter().zip(expected) {
            let node_type = slot.node_type.clone().unwrap_or_default();
            assert!(role.matches(&node_type));
            assert_eq!(slot.size_value(), Some(size));
            assert_eq!(slot.zone_count, Some(zones));
        }
    }

    #[tokio::test]
    async fn test_apm_payload_with_capacity() {
        let server = MockServer::start().await;
        mount_deployment(&server, deployment_json(Some("default"))).await;
        mount_template(&server).await;

        let client = mock_client(&server);
        let spec = SimpleSpec::new("ece-region")
            .with_deployment_id(DEPLOYMENT_ID)
            .with_version("7.4.2")
            .with_capacity(512, 1);
        let payload = PayloadBuilder::new(&client)
            .build_stateless(ResourceKind::Apm, &spec)
            .await
            .unwrap();

        assert_eq!(payload.ref_id, "main-apm");
        assert_eq!(payload.region, "ece-region");
        assert_eq!(payload.elasticsearch_cluster_ref_id.as_deref(), Some("main-elasticsearch"));
        assert_eq!(payload.plan.cluster_topology.len(), 1);
        assert_eq!(payload.plan.cluster_topology[0].size_value(), Some(512));
        assert_eq!(payload.plan.cluster_topology[0].zone_count, Some(1));
        assert_eq!(payload.plan.version(ResourceKind::Apm), Some("7.4.2"));
    }

    #[tokio::test]
    async fn test_elasticsearch_payload_discovers_version() {
        let server = MockServer::start().await;
        mount_template(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/platform/configuration/stacks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "stacks": [{"version": "7.3.0"}, {"version": "7.4.2"}]
            })))
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let payload = PayloadBuilder::new(&client)
            .build_elasticsearch(&SimpleSpec::new("ece-region"))
            .await
            .unwrap();
        assert_eq!(payload.plan.version(ResourceKind::Elasticsearch), Some("7.4.2"));
    }

    #[tokio::test]
    async fn test_apm_payload_resolves_template() {
        let server = MockServer::start().await;
        mount_deployment(&server, deployment_json(Some("default"))).await;
        mount_template(&server).await;

        let client = mock_client(&server);
        let spec = SimpleSpec::new("ece-region").with_deployment_id(DEPLOYMENT_ID);
        let payload = PayloadBuilder::new(&client)
            .build_stateless(ResourceKind::Apm, &spec)
            .await
            .unwrap();

        assert_eq!(payload.ref_id, "main-apm");
        assert_eq!(payload.elasticsearch_cluster_ref_id.as_deref(), Some("main-elasticsearch"));
        assert_eq!(payload.plan.cluster_topology.len(), 1);
        assert_eq!(payload.plan.cluster_topology[0].size_value(), Some(1024));
        assert_eq!(payload.plan.cluster_topology[0].zone_count, Some(1));
        assert!(payload.plan.apm.is_some());
        assert_eq!(payload.plan.version(ResourceKind::Apm), None);
    }

    #[tokio::test]
    async fn test_stateless_rejects_elasticsearch() {
        let server = MockServer::start().await;
        let client = mock_client(&server);
        let spec = SimpleSpec::new("ece-region").with_deployment_id(DEPLOYMENT_ID);
        let err = PayloadBuilder::new(&client)
            .build_stateless(ResourceKind::Elasticsearch, &spec)
            .await
            .unwrap_err();
        assert!(matches!(
            err.validation_errors(),
            Some([ValidationError::UnsupportedKind { .. }])
        ));
    }

    #[tokio::test]
    async fn test_template_kind_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/platform/configuration/templates/observability"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Observability",
                "deployment_template": {"resources": {"elasticsearch": []}}
            })))
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let spec = SimpleSpec::new("ece-region")
            .with_deployment_id(DEPLOYMENT_ID)
            .with_template_id("observability")
            .with_elasticsearch_ref_id("main-elasticsearch");
        let err = PayloadBuilder::new(&client)
            .build_stateless(ResourceKind::Kibana, &spec)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EceError::Validation(ref errors)
                if matches!(errors.as_slice(), [ValidationError::TemplateKindMissing { .. }])
        ));
    }
}
