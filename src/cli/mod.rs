//! Command-line interface of `ecectl`.

mod commands;
mod output;

pub use commands::{
    Cli, Commands, DeploymentCommands, InstanceArgs, MaintenanceMode, OutputFormat, PlanCommands,
    ReapplyFlags, ResourceCommands, ShowArgs, SpecArgs, TargetArgs, DEFAULT_ES_SIZE,
    DEFAULT_ES_ZONES, SYSTEM_ALERTS,
};
pub use output::OutputFormatter;
