//! Plan reapply.
//!
//! The latest attempt of a resource's plan history is submitted again with
//! its transient block reset: the snapshot restore is dropped, the plan
//! configuration is rebuilt from explicit values and the change strategy is
//! replaced when one was selected.

use std::sync::Arc;

use tracing::info;

use crate::api::{
    ClusterCrudResponse, EceClient, PlanConfiguration, PlanStrategy, Transient, GROUP_BY_ALL,
    GROUP_BY_NAME,
};
use crate::cancel::CancelToken;
use crate::config::TrackConfig;
use crate::error::{DiscoveryError, MultiError, Result, ValidationError};
use crate::sink::OutputSink;

use super::kind::{ResourceKind, ResourceRef};
use super::tracker::{ChangeTracker, Submission, TrackTask};

/// A change strategy the caller can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStrategy {
    /// Let the server pick.
    Default,
    /// One instance at a time, by name.
    Rolling,
    /// Every instance at once.
    RollingAll,
    /// Create new instances, then retire the old ones.
    GrowAndShrink,
    /// Grow and shrink one instance at a time.
    RollingGrowAndShrink,
}

impl ChangeStrategy {
    /// Flag name of the strategy.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Rolling => "rolling",
            Self::RollingAll => "rolling-all",
            Self::GrowAndShrink => "grow-and-shrink",
            Self::RollingGrowAndShrink => "rolling-grow-and-shrink",
        }
    }

    /// The wire representation.
    #[must_use]
    pub fn plan_strategy(self) -> PlanStrategy {
        match self {
            Self::Default => PlanStrategy::autodetect(),
            Self::Rolling => PlanStrategy::rolling(GROUP_BY_NAME),
            Self::RollingAll => PlanStrategy::rolling(GROUP_BY_ALL),
            Self::GrowAndShrink => PlanStrategy::grow_and_shrink(),
            Self::RollingGrowAndShrink => PlanStrategy::rolling_grow_and_shrink(),
        }
    }
}

/// Caller overrides for a plan reapply.
///
/// The `skip_*` flags are three-valued: `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapplyOverrides {
    /// Do not print the plan before submitting it.
    pub hide_plan: bool,
    /// Let the server choose the strategy.
    pub default: bool,
    /// Rolling strategy by instance name.
    pub rolling: bool,
    /// Grow and shrink strategy.
    pub grow_and_shrink: bool,
    /// Rolling grow and shrink strategy.
    pub rolling_grow_and_shrink: bool,
    /// Apply to every instance at once.
    pub rolling_all: bool,
    /// Move instances to new allocators.
    pub reallocate: bool,
    /// Keep instances in maintenance mode for the whole plan.
    pub extended_maintenance: bool,
    /// Apply even if the plan would normally be refused.
    pub override_failsafe: bool,
    /// Skip the pre-change snapshot.
    pub skip_snapshot: Option<bool>,
    /// Skip shard migration off retired instances.
    pub skip_data_migration: Option<bool>,
    /// Skip post upgrade steps.
    pub skip_post_upgrade_steps: Option<bool>,
    /// Skip upgrade compatibility checks.
    pub skip_upgrade_checker: Option<bool>,
}

impl ReapplyOverrides {
    /// Returns every selected strategy.
    #[must_use]
    pub fn selected_strategies(&self) -> Vec<ChangeStrategy> {
        [
            (self.default, ChangeStrategy::Default),
            (self.rolling, ChangeStrategy::Rolling),
            (self.rolling_all, ChangeStrategy::RollingAll),
            (self.grow_and_shrink, ChangeStrategy::GrowAndShrink),
            (self.rolling_grow_and_shrink, ChangeStrategy::RollingGrowAndShrink),
        ]
        .into_iter()
        .filter_map(|(selected, strategy)| selected.then_some(strategy))
        .collect()
    }

    /// Returns the selected strategy, if exactly one is selected.
    #[must_use]
    pub fn strategy(&self) -> Option<ChangeStrategy> {
        match self.selected_strategies().as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    fn data_flags(&self) -> [(&'static str, Option<bool>); 4] {
        [
            ("skip_snapshot", self.skip_snapshot),
            ("skip_data_migration", self.skip_data_migration),
            ("skip_post_upgrade_steps", self.skip_post_upgrade_steps),
            ("skip_upgrade_checker", self.skip_upgrade_checker),
        ]
    }

    /// Checks the overrides against each other and against `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MixedStrategies`] when more than one
    /// strategy is selected and [`ValidationError::InvalidTransient`] for
    /// flag combinations that are not allowed.
    pub fn validate(&self, kind: ResourceKind) -> std::result::Result<(), MultiError<ValidationError>> {
        let mut errors = MultiError::new();

        let selected = self.selected_strategies();
        if selected.len() > 1 {
            errors.push(ValidationError::MixedStrategies {
                strategies: selected.iter().map(|s| s.name().to_string()).collect(),
            });
        }

        if self.reallocate && self.skip_data_migration == Some(true) {
            errors.push(ValidationError::InvalidTransient {
                message: String::from(
                    "skip_data_migration cannot be combined with reallocate: data on retired instances would be lost",
                ),
            });
        }

        if !kind.supports_data_flags() {
            for (name, value) in self.data_flags() {
                if value.is_some() {
                    errors.push(ValidationError::InvalidTransient {
                        message: format!("{name} only applies to elasticsearch resources, not {kind}"),
                    });
                }
            }
        }

        errors.into_result()
    }

    /// Builds the plan configuration: every applicable field is set, to
    /// `false` unless overridden.
    #[must_use]
    pub fn plan_configuration(&self, kind: ResourceKind) -> PlanConfiguration {
        let mut config = PlanConfiguration {
            reallocate_instances: Some(self.reallocate),
            extended_maintenance: Some(self.extended_maintenance),
            override_failsafe: Some(self.override_failsafe),
            ..PlanConfiguration::default()
        };
        if kind.supports_data_flags() {
            config.skip_snapshot = Some(self.skip_snapshot.unwrap_or(false));
            config.skip_data_migration = Some(self.skip_data_migration.unwrap_or(false));
            config.skip_post_upgrade_steps = Some(self.skip_post_upgrade_steps.unwrap_or(false));
            config.skip_upgrade_checker = Some(self.skip_upgrade_checker.unwrap_or(false));
        }
        config
    }
}

/// Rewrites a transient block for resubmission.
///
/// The snapshot restore is always cleared. The strategy is replaced only
/// when one was selected. Other unknown transient fields are kept.
#[must_use]
pub fn compute_transient(
    existing: Option<Transient>,
    overrides: &ReapplyOverrides,
    kind: ResourceKind,
) -> Transient {
    let mut transient = existing.unwrap_or_default();
    transient.restore_snapshot = None;
    if let Some(strategy) = overrides.strategy() {
        transient.strategy = Some(strategy.plan_strategy());
    }
    transient.plan_configuration = Some(overrides.plan_configuration(kind));
    transient
}

/// Resubmits the latest plan attempt of a resource.
#[derive(Debug)]
pub struct PlanReapplier<'a> {
    client: &'a EceClient,
    output: OutputSink,
    track_config: TrackConfig,
    cancel: CancelToken,
}

impl<'a> PlanReapplier<'a> {
    /// Creates a reapplier printing to `output`.
    #[must_use]
    pub fn new(client: &'a EceClient, output: OutputSink) -> Self {
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

    /// Reapplies the latest plan of `resource`.
    ///
    /// Overrides are validated before any request. Unless `hide_plan` is set,
    /// the rewritten plan is printed before it is submitted. With `track`,
    /// returns once the change finished or failed.
    ///
    /// # Errors
    ///
    /// Returns validation errors, [`DiscoveryError::NoLatestAttempt`] when
    /// the history is empty, or the API error of a request.
    pub async fn reapply(
        &self,
        resource: &ResourceRef,
        overrides: &ReapplyOverrides,
        track: bool,
    ) -> Result<Submission<ClusterCrudResponse>> {
        overrides.validate(resource.kind)?;

        let activity = self
            .client
            .get_plan_activity(resource.kind, &resource.id, true, false)
            .await?;
        let mut plan = activity
            .latest_attempt()
            .and_then(|attempt| attempt.plan.clone())
            .ok_or_else(|| DiscoveryError::NoLatestAttempt {
                kind: resource.kind,
                resource_id: resource.id.clone(),
            })?;

        plan.transient = Some(compute_transient(plan.transient.take(), overrides, resource.kind));

        if !overrides.hide_plan {
            self.output.write_json(&plan)?;
        }

        info!("Reapplying latest plan of {resource}");
        let response = self
            .client
            .submit_plan(resource.kind, &resource.id, &plan, false)
            .await?;

        if !track {
            return Ok(Submission::untracked(response));
        }

        let tracking = ChangeTracker::new(Arc::new(self.client.clone()), self.output.clone())
            .with_config(self.track_config)
            .with_cancel(self.cancel.clone())
            .track(vec![TrackTask::live(resource.kind, resource.id.clone())])
            .await
            .err();
        Ok(Submission { response, tracking })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EceError;
    use crate::sink::SharedBuffer;
    use crate::test_support::{activity_json, mock_client, ES_ID};
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn es_plan_with_restore() -> Value {
        json!({
            "cluster_topology": [{"node_type": {"data": true}, "size": {"resource": "memory", "value": 1024}}],
            "elasticsearch": {"version": "7.4.2"},
            "transient": {
                "restore_snapshot": {"snapshot_name": "__latest_success__", "source_cluster_id": "x"},
                "strategy": {"grow_and_shrink": {}},
                "plan_configuration": {"timeout": 4096, "skip_snapshot": true}
            }
        })
    }

    async fn mount_activity(server: &MockServer, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/clusters/elasticsearch/{ES_ID}/plan/activity")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_default_with_rolling_is_mixed() {
        let overrides = ReapplyOverrides {
            default: true,
            rolling: true,
            ..ReapplyOverrides::default()
        };
        let errors = overrides.validate(ResourceKind::Elasticsearch).unwrap_err();
        assert_eq!(
            errors.as_slice(),
            &[ValidationError::MixedStrategies {
                strategies: vec![String::from("default"), String::from("rolling")]
            }]
        );
    }

    #[test]
    fn test_default_with_non_strategy_override() {
        let overrides = ReapplyOverrides {
            default: true,
            reallocate: true,
            extended_maintenance: true,
            ..ReapplyOverrides::default()
        };
        assert!(overrides.validate(ResourceKind::Elasticsearch).is_ok());
        assert_eq!(overrides.strategy(), Some(ChangeStrategy::Default));
    }

    #[test]
    fn test_rolling_all_is_exclusive() {
        let overrides = ReapplyOverrides {
            rolling_all: true,
            grow_and_shrink: true,
            ..ReapplyOverrides::default()
        };
        assert!(overrides.validate(ResourceKind::Kibana).is_err());
    }

    #[test]
    fn test_data_loss_guard() {
        let overrides = ReapplyOverrides {
            reallocate: true,
            skip_data_migration: Some(true),
            ..ReapplyOverrides::default()
        };
        let errors = overrides.validate(ResourceKind::Elasticsearch).unwrap_err();
        assert!(matches!(errors.as_slice(), [ValidationError::InvalidTransient { .. }]));
    }

    #[test]
    fn test_data_flags_rejected_for_stateless() {
        let overrides = ReapplyOverrides {
            skip_snapshot: Some(true),
            ..ReapplyOverrides::default()
        };
        assert!(overrides.validate(ResourceKind::Elasticsearch).is_ok());
        assert!(overrides.validate(ResourceKind::Apm).is_err());
    }

    #[test]
    fn test_transient_is_reset_explicitly() {
        let existing: Transient = serde_json::from_value(json!({
            "restore_snapshot": {"snapshot_name": "s"},
            "strategy": {"grow_and_shrink": {}},
            "plan_configuration": {"skip_snapshot": true, "timeout": 10}
        }))
        .unwrap();

        let overrides = ReapplyOverrides {
            reallocate: true,
            ..ReapplyOverrides::default()
        };
        let transient = compute_transient(Some(existing), &overrides, ResourceKind::Elasticsearch);

        assert_eq!(
            serde_json::to_value(&transient).unwrap(),
            json!({
                "strategy": {"grow_and_shrink": {}},
                "plan_configuration": {
                    "reallocate_instances": true,
                    "extended_maintenance": false,
                    "override_failsafe": false,
                    "skip_snapshot": false,
                    "skip_data_migration": false,
                    "skip_post_upgrade_steps": false,
                    "skip_upgrade_checker": false
                }
            })
        );
    }

    #[test]
    fn test_unselected_strategy_is_kept_whole() {
        let existing: Transient = serde_json::from_value(json!({
            "strategy": {
                "rolling": {"group_by": "__zone__", "shard_init_wait_time": 600, "skip_synced_flush": true}
            }
        }))
        .unwrap();
        let transient =
            compute_transient(Some(existing), &ReapplyOverrides::default(), ResourceKind::Elasticsearch);

        let value = serde_json::to_value(&transient).unwrap();
        assert_eq!(
            value["strategy"],
            json!({"rolling": {"group_by": "__zone__", "shard_init_wait_time": 600, "skip_synced_flush": true}})
        );
    }

    #[test]
    fn test_compute_transient_is_deterministic() {
        let overrides = ReapplyOverrides {
            rolling_all: true,
            skip_upgrade_checker: Some(true),
            ..ReapplyOverrides::default()
        };
        let first = compute_transient(None, &overrides, ResourceKind::Elasticsearch);
        let second = compute_transient(Some(first.clone()), &overrides, ResourceKind::Elasticsearch);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(first.strategy, Some(PlanStrategy::rolling(GROUP_BY_ALL)));
    }

    #[test]
    fn test_stateless_configuration_omits_data_flags() {
        let config = ReapplyOverrides::default().plan_configuration(ResourceKind::Kibana);
        assert_eq!(
            serde_json::to_value(config).unwrap(),
            json!({
                "reallocate_instances": false,
                "extended_maintenance": false,
                "override_failsafe": false
            })
        );
    }

    #[tokio::test]
    async fn test_mixed_strategies_make_no_request() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let overrides = ReapplyOverrides {
            default: true,
            rolling: true,
            ..ReapplyOverrides::default()
        };
        let err = PlanReapplier::new(&client, OutputSink::discard())
            .reapply(&ResourceRef::new(ResourceKind::Elasticsearch, ES_ID), &overrides, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err.validation_errors(),
            Some([ValidationError::MixedStrategies { .. }])
        ));
    }

    #[tokio::test]
    async fn test_empty_history_submits_nothing() {
        let server = MockServer::start().await;
        mount_activity(&server, json!({"history": []})).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(202))
            .expect(0)
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let err = PlanReapplier::new(&client, OutputSink::discard())
            .reapply(
                &ResourceRef::new(ResourceKind::Elasticsearch, ES_ID),
                &ReapplyOverrides::default(),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EceError::Discovery(DiscoveryError::NoLatestAttempt { .. })
        ));
    }

    #[tokio::test]
    async fn test_reapply_submits_reset_plan() {
        let server = MockServer::start().await;
        mount_activity(&server, activity_json(&es_plan_with_restore())).await;
        Mock::given(method("PUT"))
            .and(path(format!("/api/v1/clusters/elasticsearch/{ES_ID}/plan")))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(json!({"elasticsearch_cluster_id": ES_ID})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let buffer = SharedBuffer::default();
        let client = mock_client(&server);
        let overrides = ReapplyOverrides {
            rolling: true,
            ..ReapplyOverrides::default()
        };
        let submission = PlanReapplier::new(&client, buffer.sink())
            .reapply(&ResourceRef::new(ResourceKind::Elasticsearch, ES_ID), &overrides, false)
            .await
            .unwrap();
        assert_eq!(submission.response.elasticsearch_cluster_id.as_deref(), Some(ES_ID));
        assert!(submission.tracking.is_none());

        let requests = server.received_requests().await.unwrap();
        let activity = requests
            .iter()
            .find(|r| r.method.to_string() == "GET")
            .unwrap();
        assert!(activity.url.query().unwrap_or_default().contains("show_plan_defaults=true"));
        let put = requests
            .iter()
            .find(|r| r.method.to_string() == "PUT")
            .unwrap();
        let sent: Value = serde_json::from_slice(&put.body).unwrap();
        let transient = &sent["transient"];
        assert!(transient.get("restore_snapshot").is_none());
        assert_eq!(transient["strategy"], json!({"rolling": {"group_by": "__name__"}}));
        assert_eq!(transient["plan_configuration"]["skip_snapshot"], json!(false));
        assert_eq!(sent["elasticsearch"]["version"], json!("7.4.2"));

        let printed: Value = serde_json::from_str(&buffer.contents()).unwrap();
        assert_eq!(printed, sent);
    }

    #[tokio::test]
    async fn test_reapply_with_tracking() {
        let server = MockServer::start().await;
        mount_activity(&server, activity_json(&es_plan_with_restore())).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let overrides = ReapplyOverrides {
            hide_plan: true,
            ..ReapplyOverrides::default()
        };
        let config = TrackConfig::default()
            .with_poll_interval(Duration::from_millis(5))
            .with_max_retries(1);
        let buffer = SharedBuffer::default();
        let submission = PlanReapplier::new(&client, buffer.sink())
            .with_track_config(config)
            .reapply(&ResourceRef::new(ResourceKind::Elasticsearch, ES_ID), &overrides, true)
            .await
            .unwrap();

        assert!(submission.tracking.is_none());
        assert!(buffer.contents().contains("finished running all the plan steps"));
        assert!(!buffer.contents().contains("\"transient\""));
    }
}
