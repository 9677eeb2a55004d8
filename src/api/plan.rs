//! Plan, topology and plan activity types.
//!
//! Plans are round-tripped: a plan fetched from the history is modified and
//! submitted again, so every struct keeps the fields it does not model in an
//! `extra` map. Optional booleans stay `Option<bool>` because the server
//! treats an absent flag differently from an explicit `false`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::deployment::ResourceKind;

/// Size resource used for every topology element.
pub const MEMORY_RESOURCE: &str = "memory";

/// Rolling strategy group that restarts every instance at once.
pub const GROUP_BY_ALL: &str = "__all__";

/// Rolling strategy group that restarts one instance at a time.
pub const GROUP_BY_NAME: &str = "__name__";

/// The declarative description of a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Topology elements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_topology: Vec<TopologySlot>,
    /// Elasticsearch configuration block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<KindConfiguration>,
    /// Kibana configuration block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kibana: Option<KindConfiguration>,
    /// APM configuration block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apm: Option<KindConfiguration>,
    /// App Search configuration block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appsearch: Option<KindConfiguration>,
    /// Template the plan was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_template: Option<TemplateReference>,
    /// Settings controlling how the plan is applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transient: Option<Transient>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kind-specific configuration block of a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindConfiguration {
    /// Stack version. Absent means "inherit from Elasticsearch".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference to a deployment template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateReference {
    /// Template identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One element of a cluster topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySlot {
    /// Elasticsearch node roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    /// Instance configuration backing the element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_configuration_id: Option<String>,
    /// Capacity per zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<TopologySize>,
    /// Number of availability zones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_count: Option<u32>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Elasticsearch node role flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeType {
    /// Data role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<bool>,
    /// Master eligible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<bool>,
    /// Machine learning role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml: Option<bool>,
    /// Ingest role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingest: Option<bool>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Capacity of a topology element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySize {
    /// Resource type, always `memory` for topology sizes.
    pub resource: String,
    /// Amount in MB.
    pub value: u32,
}

/// The ephemeral part of a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transient {
    /// How the change is rolled out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<PlanStrategy>,
    /// Plan execution flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_configuration: Option<PlanConfiguration>,
    /// Snapshot to restore as part of the plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_snapshot: Option<Value>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Change strategy, serialized as `{"<name>": {...}}`.
///
/// Each strategy is an optional field: the server may return an empty object
/// or a strategy this crate does not know, and both must survive a resubmit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStrategy {
    /// Let the server choose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autodetect: Option<StrategyOptions>,
    /// Rolling restart grouped by `group_by`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling: Option<RollingStrategy>,
    /// Create new instances, migrate, then retire the old ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grow_and_shrink: Option<StrategyOptions>,
    /// Grow and shrink one instance at a time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_grow_and_shrink: Option<StrategyOptions>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Options of strategies without modelled parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyOptions {
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Options of the rolling strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingStrategy {
    /// Grouping attribute: `__name__`, `__zone__` or `__all__`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    /// Whether instances may be resized in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_inline_resize: Option<bool>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Flags controlling plan execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfiguration {
    /// Move every instance to a new allocator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reallocate_instances: Option<bool>,
    /// Keep instances in maintenance mode for the whole plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_maintenance: Option<bool>,
    /// Apply even if the plan would normally be refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_failsafe: Option<bool>,
    /// Skip the snapshot taken before the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_snapshot: Option<bool>,
    /// Skip migrating shards off retired instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_data_migration: Option<bool>,
    /// Skip the steps run after a major upgrade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_post_upgrade_steps: Option<bool>,
    /// Skip the upgrade compatibility checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_upgrade_checker: Option<bool>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Plan activity of a resource: current, pending and past attempts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanActivity {
    /// The plan currently applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<PlanAttempt>,
    /// The plan being applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PlanAttempt>,
    /// Past attempts, oldest first.
    #[serde(default)]
    pub history: Vec<PlanAttempt>,
    /// Whether the plans are healthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,
}

/// A single attempt to apply a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanAttempt {
    /// Attempt identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_attempt_id: Option<String>,
    /// Attempt name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_attempt_name: Option<String>,
    /// Whether the attempt succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,
    /// When the attempt started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_start_time: Option<DateTime<Utc>>,
    /// When the attempt ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_end_time: Option<DateTime<Utc>>,
    /// The plan that was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    /// Executed steps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_attempt_log: Vec<PlanStep>,
}

/// One step of a plan attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step identifier.
    pub step_id: String,
    /// Outcome of the step.
    #[serde(default)]
    pub status: StepStatus,
    /// Stage of the step.
    #[serde(default)]
    pub stage: StepStage,
    /// When the step started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    /// When the step completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    /// Step duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_millis: Option<u64>,
    /// Step log messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info_log: Vec<StepLogMessage>,
}

/// Outcome of a plan step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step succeeded.
    Success,
    /// Step succeeded with warnings.
    Warning,
    /// Step failed.
    Error,
    /// Step has not finished.
    Pending,
    /// Unrecognised status.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Execution stage of a plan step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStage {
    /// Step is starting.
    Starting,
    /// Step is running.
    InProgress,
    /// Step is done.
    Completed,
    /// Unrecognised stage.
    #[default]
    #[serde(other)]
    Unknown,
}

/// A log line of a plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLogMessage {
    /// Message text.
    #[serde(default)]
    pub message: String,
    /// When the message was logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Plan {
    /// Creates a plan whose configuration block for `kind` carries `version`.
    #[must_use]
    pub fn for_kind(kind: ResourceKind, version: Option<String>) -> Self {
        let mut plan = Self::default();
        *plan.configuration_mut(kind) = Some(KindConfiguration {
            version,
            extra: Map::new(),
        });
        plan
    }

    /// Returns the configuration block for `kind`.
    #[must_use]
    pub const fn configuration(&self, kind: ResourceKind) -> Option<&KindConfiguration> {
        match kind {
            ResourceKind::Elasticsearch => self.elasticsearch.as_ref(),
            ResourceKind::Kibana => self.kibana.as_ref(),
            ResourceKind::Apm => self.apm.as_ref(),
            ResourceKind::Appsearch => self.appsearch.as_ref(),
        }
    }

    /// Returns the configuration block slot for `kind`.
    pub fn configuration_mut(&mut self, kind: ResourceKind) -> &mut Option<KindConfiguration> {
        match kind {
            ResourceKind::Elasticsearch => &mut self.elasticsearch,
            ResourceKind::Kibana => &mut self.kibana,
            ResourceKind::Apm => &mut self.apm,
            ResourceKind::Appsearch => &mut self.appsearch,
        }
    }

    /// Returns the version configured for `kind`, if any.
    #[must_use]
    pub fn version(&self, kind: ResourceKind) -> Option<&str> {
        self.configuration(kind).and_then(|c| c.version.as_deref())
    }

    /// Returns the template id the plan references.
    #[must_use]
    pub fn template_id(&self) -> Option<&str> {
        self.deployment_template.as_ref().and_then(|t| t.id.as_deref())
    }
}

impl TemplateReference {
    /// Creates a reference to the given template.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            extra: Map::new(),
        }
    }
}

impl TopologySlot {
    /// Returns the configured memory size in MB.
    #[must_use]
    pub fn size_value(&self) -> Option<u32> {
        self.size.as_ref().map(|s| s.value)
    }

    /// Sets the memory size in MB.
    pub fn set_size(&mut self, value: u32) {
        match &mut self.size {
            Some(size) => size.value = value,
            None => self.size = Some(TopologySize::memory(value)),
        }
    }
}

impl TopologySize {
    /// Creates a memory size.
    #[must_use]
    pub fn memory(value: u32) -> Self {
        Self {
            resource: String::from(MEMORY_RESOURCE),
            value,
        }
    }
}

impl PlanStrategy {
    /// Server-chosen strategy.
    #[must_use]
    pub fn autodetect() -> Self {
        Self {
            autodetect: Some(StrategyOptions::default()),
            ..Self::default()
        }
    }

    /// Rolling strategy with the given grouping.
    #[must_use]
    pub fn rolling(group_by: &str) -> Self {
        Self {
            rolling: Some(RollingStrategy {
                group_by: Some(group_by.to_string()),
                ..RollingStrategy::default()
            }),
            ..Self::default()
        }
    }

    /// Grow and shrink strategy.
    #[must_use]
    pub fn grow_and_shrink() -> Self {
        Self {
            grow_and_shrink: Some(StrategyOptions::default()),
            ..Self::default()
        }
    }

    /// Rolling grow and shrink strategy.
    #[must_use]
    pub fn rolling_grow_and_shrink() -> Self {
        Self {
            rolling_grow_and_shrink: Some(StrategyOptions::default()),
            ..Self::default()
        }
    }
}

impl PlanActivity {
    /// Returns the most recent attempt of the history.
    #[must_use]
    pub fn latest_attempt(&self) -> Option<&PlanAttempt> {
        self.history.last()
    }
}

impl PlanAttempt {
    /// Returns the last logged step.
    #[must_use]
    pub fn last_step(&self) -> Option<&PlanStep> {
        self.plan_attempt_log.last()
    }

    /// Returns the first step that ended in error.
    #[must_use]
    pub fn failed_step(&self) -> Option<&PlanStep> {
        self.plan_attempt_log
            .iter()
            .find(|step| step.status == StepStatus::Error)
    }

    /// Returns the attempt duration, when both ends are known.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.attempt_start_time, self.attempt_end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

impl PlanStep {
    /// Returns the last message logged by the step.
    #[must_use]
    pub fn last_message(&self) -> Option<&str> {
        self.info_log.last().map(|m| m.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strategy_wire_shape() {
        let rolling = serde_json::to_value(PlanStrategy::rolling(GROUP_BY_NAME)).unwrap();
        assert_eq!(rolling, json!({"rolling": {"group_by": "__name__"}}));

        let grow = serde_json::to_value(PlanStrategy::grow_and_shrink()).unwrap();
        assert_eq!(grow, json!({"grow_and_shrink": {}}));

        let parsed: PlanStrategy =
            serde_json::from_value(json!({"rolling_grow_and_shrink": {}})).unwrap();
        assert_eq!(parsed, PlanStrategy::rolling_grow_and_shrink());
    }

    #[test]
    fn test_strategy_keeps_server_fields() {
        let raw = json!({
            "rolling": {
                "group_by": "__zone__",
                "shard_init_wait_time": 600,
                "skip_synced_flush": true
            }
        });
        let strategy: PlanStrategy = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(
            strategy.rolling.as_ref().and_then(|r| r.group_by.as_deref()),
            Some("__zone__")
        );
        assert_eq!(serde_json::to_value(&strategy).unwrap(), raw);

        let unknown = json!({"instance_swap": {"batch": 2}});
        let strategy: PlanStrategy = serde_json::from_value(unknown.clone()).unwrap();
        assert_eq!(serde_json::to_value(&strategy).unwrap(), unknown);
    }

    #[test]
    fn test_empty_strategy_parses() {
        let transient: Transient = serde_json::from_value(json!({"strategy": {}})).unwrap();
        assert_eq!(transient.strategy, Some(PlanStrategy::default()));
        assert_eq!(serde_json::to_value(&transient).unwrap(), json!({"strategy": {}}));
    }

    #[test]
    fn test_node_type_keeps_server_fields() {
        let raw = json!({"data": true, "master": false, "voting_only": true});
        let node_type: NodeType = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(node_type.data, Some(true));
        assert_eq!(serde_json::to_value(&node_type).unwrap(), raw);
    }

    #[test]
    fn test_plan_keeps_unknown_fields() {
        let raw = json!({
            "cluster_topology": [{
                "node_type": {"data": true},
                "size": {"resource": "memory", "value": 1024},
                "zone_count": 1,
                "elasticsearch": {"user_settings_yaml": "a: b"}
            }],
            "elasticsearch": {"version": "7.4.2", "system_settings": {"scripting": {}}},
            "tiebreaker_topology": {"memory_per_node": 1024}
        });
        let plan: Plan = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(plan.version(ResourceKind::Elasticsearch), Some("7.4.2"));
        assert_eq!(serde_json::to_value(&plan).unwrap(), raw);
    }

    #[test]
    fn test_absent_flags_are_not_false() {
        let config = PlanConfiguration {
            skip_snapshot: Some(false),
            ..PlanConfiguration::default()
        };
        assert_eq!(serde_json::to_value(&config).unwrap(), json!({"skip_snapshot": false}));
    }

    #[test]
    fn test_unknown_step_status() {
        let step: PlanStep = serde_json::from_value(json!({
            "step_id": "plan-completed",
            "status": "something-new",
            "stage": "completed"
        }))
        .unwrap();
        assert_eq!(step.status, StepStatus::Unknown);
        assert_eq!(step.stage, StepStage::Completed);
    }
}
