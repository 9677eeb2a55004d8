//! Fixtures shared by the unit tests.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::api::EceClient;
use crate::config::ClientConfig;

pub(crate) const DEPLOYMENT_ID: &str = "d324608c97154bdba2dff97511d40368";
pub(crate) const ES_ID: &str = "1238f19957874af69306787dca662154";
pub(crate) const KIBANA_ID: &str = "2c221bd86b7f48959a59ee3128d5c5e8";
pub(crate) const APM_ID: &str = "3531aaf988594efa87c1aabb7caed337";
pub(crate) const APPSEARCH_ID: &str = "4d1fc1d1b6c14e1c9b7f8e3a7b4d1c27";

/// A client pointed at `server` with fast retries.
pub(crate) fn mock_client(server: &MockServer) -> EceClient {
    EceClient::new(&ClientConfig::with_api_key(server.uri(), "test-key"))
        .unwrap()
        .with_retry_delay(Duration::from_millis(1))
}

/// A deployment created from `template_id` with Elasticsearch, Kibana and
/// APM resources.
pub(crate) fn deployment_json(template_id: Option<&str>) -> Value {
    let mut plan = json!({
        "cluster_topology": [],
        "elasticsearch": {"version": "7.4.2"}
    });
    if let Some(id) = template_id {
        plan["deployment_template"] = json!({"id": id});
    }
    json!({
        "id": DEPLOYMENT_ID,
        "name": "logs",
        "healthy": true,
        "resources": {
            "elasticsearch": [{
                "id": ES_ID,
                "ref_id": "main-elasticsearch",
                "region": "ece-region",
                "info": {
                    "status": "started",
                    "healthy": true,
                    "plan_info": {"current": {"plan": plan}, "history": []}
                }
            }],
            "kibana": [{
                "id": KIBANA_ID,
                "ref_id": "main-kibana",
                "elasticsearch_cluster_ref_id": "main-elasticsearch",
                "region": "ece-region",
                "info": {"status": "started", "healthy": true}
            }],
            "apm": [{
                "id": APM_ID,
                "ref_id": "main-apm",
                "elasticsearch_cluster_ref_id": "main-elasticsearch",
                "region": "ece-region",
                "info": {"status": "started", "healthy": true}
            }],
            "appsearch": []
        }
    })
}

/// The default template: data, master and ml Elasticsearch elements plus
/// one element for each stateless kind.
pub(crate) fn template_json() -> Value {
    let stateless = |instance: &str| {
        json!([{
            "ref_id": "main",
            "plan": {
                "cluster_topology": [{
                    "instance_configuration_id": instance,
                    "size": {"resource": "memory", "value": 1024},
                    "zone_count": 1
                }]
            }
        }])
    };
    json!({
        "id": "default",
        "name": "Default",
        "deployment_template": {
            "resources": {
                "elasticsearch": [{
                    "ref_id": "es-ref-id",
                    "plan": {
                        "cluster_topology": [
                            {
                                "node_type": {"data": true, "master": true, "ingest": true},
                                "instance_configuration_id": "data.default",
                                "size": {"resource": "memory", "value": 1024},
                                "zone_count": 1
                            },
                            {
                                "node_type": {"data": false, "master": true, "ingest": false},
                                "instance_configuration_id": "master",
                                "size": {"resource": "memory", "value": 0},
                                "zone_count": 1
                            },
                            {
                                "node_type": {"data": false, "master": false, "ml": true},
                                "instance_configuration_id": "ml",
                                "size": {"resource": "memory", "value": 0},
                                "zone_count": 1
                            }
                        ],
                        "elasticsearch": {}
                    }
                }],
                "kibana": stateless("kibana"),
                "apm": stateless("apm"),
                "appsearch": stateless("appsearch")
            }
        }
    })
}

/// Plan activity whose latest history attempt holds `plan`.
pub(crate) fn activity_json(plan: &Value) -> Value {
    json!({
        "current": {"plan": plan},
        "history": [
            {"plan_attempt_id": "old", "plan": {"cluster_topology": []}, "healthy": true},
            {
                "plan_attempt_id": "latest",
                "healthy": true,
                "plan": plan,
                "attempt_start_time": "2019-10-01T10:00:00Z",
                "attempt_end_time": "2019-10-01T10:02:00Z",
                "plan_attempt_log": [
                    {"step_id": "plan-completed", "status": "success", "stage": "completed"}
                ]
            }
        ]
    })
}

/// Mounts the default template.
pub(crate) async fn mount_template(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/platform/configuration/templates/default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(template_json()))
        .mount(server)
        .await;
}

/// Mounts the deployment read.
pub(crate) async fn mount_deployment(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/deployments/{DEPLOYMENT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
