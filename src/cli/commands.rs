//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::api::{InstanceSelection, ShowParams};
use crate::config::ClientConfig;
use crate::deployment::{ReapplyOverrides, ResourceKind, SimpleSpec, TopologyElement};
use crate::error::Result;

/// Default Elasticsearch memory per zone, in MB.
pub const DEFAULT_ES_SIZE: u32 = 4096;

/// Default Elasticsearch zone count.
pub const DEFAULT_ES_ZONES: u32 = 1;

/// Number of system alerts shown with `--alerts`.
pub const SYSTEM_ALERTS: u32 = 5;

/// ecectl - Manage Elastic Cloud Enterprise deployments.
#[derive(Parser, Debug)]
#[command(name = "ecectl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "ECECTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// API host, overriding the configuration.
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// API key, overriding the configuration.
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// User for basic authentication.
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Password for basic authentication.
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Region of new resources.
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage deployments.
    Deployment {
        /// Deployment subcommand.
        #[command(subcommand)]
        command: DeploymentCommands,
    },

    /// Manage one resource of a deployment.
    Resource {
        /// Resource kind.
        #[arg(value_enum)]
        kind: ResourceKind,

        /// Resource subcommand.
        #[command(subcommand)]
        command: ResourceCommands,
    },
}

/// Deployment subcommands.
#[derive(Subcommand, Debug)]
pub enum DeploymentCommands {
    /// Create a deployment with one Elasticsearch resource.
    Create {
        /// Resource parameters.
        #[command(flatten)]
        spec: SpecArgs,

        /// Print the request instead of sending it.
        #[arg(long)]
        generate_payload: bool,

        /// Follow the change until it completes.
        #[arg(short, long)]
        track: bool,
    },

    /// Update a deployment from a JSON request file.
    Update {
        /// Deployment id.
        id: String,

        /// File holding the update request.
        #[arg(short, long)]
        file: PathBuf,

        /// Shut down resources missing from the request.
        #[arg(long)]
        prune_orphans: bool,

        /// Skip the snapshot of shut down resources.
        #[arg(long)]
        skip_snapshot: bool,

        /// Hide shut down resources.
        #[arg(long)]
        hide_pruned_orphans: bool,

        /// Only validate the request.
        #[arg(long)]
        validate_only: bool,

        /// Follow the change until it completes.
        #[arg(short, long)]
        track: bool,
    },

    /// Show a deployment.
    Show {
        /// Deployment id.
        id: String,

        /// Read flags.
        #[command(flatten)]
        show: ShowArgs,
    },

    /// Delete a deployment whose resources are stopped.
    Delete {
        /// Deployment id.
        id: String,
    },

    /// Shut every resource of a deployment down.
    Shutdown {
        /// Deployment id.
        id: String,

        /// Skip the final snapshot.
        #[arg(long)]
        skip_snapshot: bool,

        /// Hide the deployment once stopped.
        #[arg(long)]
        hide: bool,
    },

    /// Restore a shut down deployment.
    Restore {
        /// Deployment id.
        id: String,

        /// Restore the latest snapshot.
        #[arg(long)]
        restore_snapshot: bool,
    },

    /// Resynchronize the search index of deployments.
    Resync {
        /// Deployment id.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,

        /// Resynchronize every deployment.
        #[arg(long)]
        all: bool,
    },
}

/// Resource subcommands.
#[derive(Subcommand, Debug)]
pub enum ResourceCommands {
    /// Add a resource to an existing deployment.
    Create {
        /// Deployment id.
        deployment_id: String,

        /// Resource parameters.
        #[command(flatten)]
        spec: SpecArgs,

        /// Ref id of the Elasticsearch resource to attach to.
        #[arg(long)]
        elasticsearch_ref_id: Option<String>,

        /// Print the payload instead of sending it.
        #[arg(long)]
        generate_payload: bool,

        /// Follow the change until it completes.
        #[arg(short, long)]
        track: bool,
    },

    /// Show a resource.
    Show {
        /// Resource address.
        #[command(flatten)]
        target: TargetArgs,

        /// Read flags.
        #[command(flatten)]
        show: ShowArgs,
    },

    /// Shut a resource down.
    Shutdown {
        /// Resource address.
        #[command(flatten)]
        target: TargetArgs,

        /// Skip the final snapshot.
        #[arg(long)]
        skip_snapshot: bool,

        /// Hide the resource once stopped.
        #[arg(long)]
        hide: bool,
    },

    /// Restore a shut down resource.
    Restore {
        /// Resource address.
        #[command(flatten)]
        target: TargetArgs,

        /// Restore the latest snapshot.
        #[arg(long)]
        restore_snapshot: bool,
    },

    /// Upgrade a resource to the version of its Elasticsearch resource.
    Upgrade {
        /// Resource address.
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Stop instances of a resource.
    Stop {
        /// Resource address.
        #[command(flatten)]
        target: TargetArgs,

        /// Instances to stop.
        #[command(flatten)]
        instances: InstanceArgs,
    },

    /// Start instances of a resource.
    Start {
        /// Resource address.
        #[command(flatten)]
        target: TargetArgs,

        /// Instances to start.
        #[command(flatten)]
        instances: InstanceArgs,
    },

    /// Move instances in or out of maintenance mode.
    Maintenance {
        /// Resource address.
        #[command(flatten)]
        target: TargetArgs,

        /// Target mode.
        #[arg(value_enum)]
        mode: MaintenanceMode,

        /// Instances to change.
        #[command(flatten)]
        instances: InstanceArgs,
    },

    /// Delete a stopped resource.
    Delete {
        /// Resource address.
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Resynchronize the search index of a resource.
    Resync {
        /// Resource id.
        resource_id: String,
    },

    /// Manage resource plans.
    Plan {
        /// Plan subcommand.
        #[command(subcommand)]
        command: PlanCommands,
    },
}

/// Plan subcommands, addressed by resource id.
#[derive(Subcommand, Debug)]
pub enum PlanCommands {
    /// Resubmit the latest plan attempt.
    Reapply {
        /// Resource id.
        resource_id: String,

        /// Overrides.
        #[command(flatten)]
        flags: ReapplyFlags,

        /// Follow the change until it completes.
        #[arg(short, long)]
        track: bool,
    },

    /// Cancel the pending plan.
    Cancel {
        /// Resource id.
        resource_id: String,
    },

    /// List plan attempts.
    History {
        /// Resource id.
        resource_id: String,

        /// Include step logs.
        #[arg(long)]
        logs: bool,
    },
}

/// Parameters of a new resource.
#[derive(Args, Debug, Clone, Default)]
pub struct SpecArgs {
    /// Display name.
    #[arg(long)]
    pub name: Option<String>,

    /// Stack version; the latest one when omitted.
    #[arg(long)]
    pub stack_version: Option<String>,

    /// Deployment template id.
    #[arg(long)]
    pub template_id: Option<String>,

    /// Ref id of the new resource.
    #[arg(long)]
    pub ref_id: Option<String>,

    /// Memory per zone in MB.
    #[arg(long)]
    pub size: Option<u32>,

    /// Number of zones.
    #[arg(long)]
    pub zones: Option<u32>,

    /// Elasticsearch topology element as JSON, e.g.
    /// `{"name":"data","size":2048,"zone_count":2}`. Repeatable.
    #[arg(long = "topology")]
    pub topology: Vec<String>,
}

impl SpecArgs {
    /// Builds a [`SimpleSpec`] in `region`.
    ///
    /// Omitted capacity falls back to `default_capacity`.
    ///
    /// # Errors
    ///
    /// Returns every topology element that failed to decode.
    pub fn to_spec(&self, region: &str, default_capacity: (u32, u32)) -> Result<SimpleSpec> {
        let topology = TopologyElement::parse_all(self.topology.as_slice())?;
        let mut spec = SimpleSpec::new(region)
            .with_capacity(
                self.size.unwrap_or(default_capacity.0),
                self.zones.unwrap_or(default_capacity.1),
            )
            .with_topology(topology);
        if let Some(name) = &self.name {
            spec = spec.with_name(name.as_str());
        }
        if let Some(version) = &self.stack_version {
            spec = spec.with_version(version.as_str());
        }
        if let Some(template_id) = &self.template_id {
            spec = spec.with_template_id(template_id.as_str());
        }
        if let Some(ref_id) = &self.ref_id {
            spec = spec.with_ref_id(ref_id.as_str());
        }
        Ok(spec)
    }
}

/// Address of a resource within a deployment.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Deployment id.
    pub deployment_id: String,

    /// Ref id; the first resource of the kind when omitted.
    #[arg(long)]
    pub ref_id: Option<String>,
}

/// Read flags of show commands.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ShowArgs {
    /// Include current and pending plans.
    #[arg(long)]
    pub plans: bool,

    /// Include plan step logs.
    #[arg(long)]
    pub plan_logs: bool,

    /// Include the plan history.
    #[arg(long)]
    pub plan_history: bool,

    /// Include server-side plan defaults.
    #[arg(long)]
    pub plan_defaults: bool,

    /// Include metadata.
    #[arg(long)]
    pub metadata: bool,

    /// Include settings.
    #[arg(long)]
    pub settings: bool,

    /// Include recent system alerts.
    #[arg(long)]
    pub alerts: bool,
}

impl From<ShowArgs> for ShowParams {
    fn from(args: ShowArgs) -> Self {
        Self {
            show_plans: args.plans,
            show_plan_logs: args.plan_logs,
            show_plan_history: args.plan_history,
            show_plan_defaults: args.plan_defaults,
            show_metadata: args.metadata,
            show_settings: args.settings,
            show_system_alerts: if args.alerts { SYSTEM_ALERTS } else { 0 },
            ..Self::default()
        }
    }
}

/// Instance selection of stop, start and maintenance commands.
#[derive(Args, Debug, Clone, Default)]
pub struct InstanceArgs {
    /// Instance id; every instance when omitted. Repeatable.
    #[arg(long = "instance")]
    pub instances: Vec<String>,

    /// Do not fail on unknown instance ids.
    #[arg(long, requires = "instances")]
    pub ignore_missing: bool,
}

impl From<InstanceArgs> for InstanceSelection {
    fn from(args: InstanceArgs) -> Self {
        if args.instances.is_empty() {
            Self::All
        } else {
            Self::Only {
                ids: args.instances,
                ignore_missing: args.ignore_missing,
            }
        }
    }
}

/// Maintenance mode target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MaintenanceMode {
    /// Enter maintenance mode.
    On,
    /// Leave maintenance mode.
    Off,
}

/// Flags of `plan reapply`.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ReapplyFlags {
    /// Do not print the plan before submitting it.
    #[arg(long)]
    pub hide_plan: bool,

    /// Let the server choose the change strategy.
    #[arg(long)]
    pub default: bool,

    /// Change one instance at a time.
    #[arg(long)]
    pub rolling: bool,

    /// Create new instances before retiring the old ones.
    #[arg(long)]
    pub grow_and_shrink: bool,

    /// Grow and shrink one instance at a time.
    #[arg(long)]
    pub rolling_grow_and_shrink: bool,

    /// Change every instance at once.
    #[arg(long)]
    pub rolling_all: bool,

    /// Move instances to new allocators.
    #[arg(long)]
    pub reallocate: bool,

    /// Keep instances in maintenance mode for the whole plan.
    #[arg(long)]
    pub extended_maintenance: bool,

    /// Apply even if the plan would normally be refused.
    #[arg(long)]
    pub override_failsafe: bool,

    /// Skip the snapshot taken before the change (Elasticsearch only).
    #[arg(long)]
    pub skip_snapshot: bool,

    /// Skip migrating data off retired instances (Elasticsearch only).
    #[arg(long)]
    pub skip_data_migration: bool,

    /// Skip post upgrade steps (Elasticsearch only).
    #[arg(long)]
    pub skip_post_upgrade_steps: bool,

    /// Skip upgrade compatibility checks (Elasticsearch only).
    #[arg(long)]
    pub skip_upgrade_checker: bool,
}

impl From<ReapplyFlags> for ReapplyOverrides {
    fn from(flags: ReapplyFlags) -> Self {
        Self {
            hide_plan: flags.hide_plan,
            default: flags.default,
            rolling: flags.rolling,
            grow_and_shrink: flags.grow_and_shrink,
            rolling_grow_and_shrink: flags.rolling_grow_and_shrink,
            rolling_all: flags.rolling_all,
            reallocate: flags.reallocate,
            extended_maintenance: flags.extended_maintenance,
            override_failsafe: flags.override_failsafe,
            skip_snapshot: flags.skip_snapshot.then_some(true),
            skip_data_migration: flags.skip_data_migration.then_some(true),
            skip_post_upgrade_steps: flags.skip_post_upgrade_steps.then_some(true),
            skip_upgrade_checker: flags.skip_upgrade_checker.then_some(true),
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Applies the connection flags over `config`.
    pub fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(user) = &self.user {
            config.user = Some(user.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(region) = &self.region {
            config.region = Some(region.clone());
        }
        if self.insecure {
            config.insecure = true;
        }
    }
}
