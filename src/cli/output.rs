//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::api::{DeploymentGetResponse, PlanActivity, PlanAttempt, ResourceInfo, ResourceStatus};
use crate::deployment::ResourceKind;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Resource row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Ref ID")]
    ref_id: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Version")]
    version: String,
}

/// Plan attempt row for table display.
#[derive(Tabled)]
struct AttemptRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Attempt")]
    attempt: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns true when output is JSON.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Formats any response as pretty JSON.
    #[must_use]
    pub fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_default()
    }

    /// Formats a deployment for display.
    #[must_use]
    pub fn format_deployment(&self, deployment: &DeploymentGetResponse) -> String {
        match self.format {
            OutputFormat::Json => Self::format_json(deployment),
            OutputFormat::Text => Self::format_deployment_text(deployment),
        }
    }

    fn format_deployment_text(deployment: &DeploymentGetResponse) -> String {
        let mut output = String::new();
        let _ = writeln!(
            output,
            "\nDeployment: {} ({})\n",
            deployment.name.bold(),
            deployment.id
        );

        let rows: Vec<ResourceRow> = deployment
            .resources
            .iter()
            .map(|(kind, resource)| Self::resource_row(kind, resource))
            .collect();
        if rows.is_empty() {
            output.push_str("   No resources.\n");
            return output;
        }

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let health = if deployment.healthy {
            "healthy".green()
        } else {
            "unhealthy".red()
        };
        let _ = writeln!(output, "\nHealth: {health}");
        output
    }

    /// Formats a single resource for display.
    #[must_use]
    pub fn format_resource(&self, kind: ResourceKind, resource: &ResourceInfo) -> String {
        match self.format {
            OutputFormat::Json => Self::format_json(resource),
            OutputFormat::Text => {
                let mut output = Table::new([Self::resource_row(kind, resource)]).to_string();
                output.push('\n');
                output
            }
        }
    }

    fn resource_row(kind: ResourceKind, resource: &ResourceInfo) -> ResourceRow {
        let version = resource
            .info
            .plan_info
            .current
            .as_ref()
            .and_then(|attempt| attempt.plan.as_ref())
            .and_then(|plan| plan.version(kind))
            .unwrap_or("-")
            .to_string();
        ResourceRow {
            kind: kind.display_name().to_string(),
            ref_id: resource.ref_id.clone(),
            id: resource.id.clone(),
            status: Self::format_status(resource.info.status, resource.info.healthy),
            version,
        }
    }

    fn format_status(status: ResourceStatus, healthy: bool) -> String {
        let text = status.to_string();
        match status {
            ResourceStatus::Started if healthy => text.green().to_string(),
            ResourceStatus::Started => text.yellow().to_string(),
            ResourceStatus::Stopped | ResourceStatus::Stopping => text.dimmed().to_string(),
            ResourceStatus::Unknown => text.red().to_string(),
            _ => text.cyan().to_string(),
        }
    }

    /// Formats the plan history of a resource.
    #[must_use]
    pub fn format_history(&self, activity: &PlanActivity) -> String {
        match self.format {
            OutputFormat::Json => Self::format_json(activity),
            OutputFormat::Text => Self::format_history_text(activity),
        }
    }

    fn format_history_text(activity: &PlanActivity) -> String {
        let mut output = String::new();
        let rows: Vec<AttemptRow> = activity
            .history
            .iter()
            .enumerate()
            .map(|(i, attempt)| Self::attempt_row(i + 1, attempt))
            .collect();

        if rows.is_empty() {
            output.push_str("No plan attempts.\n");
        } else {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if let Some(pending) = &activity.pending {
            let step = pending
                .last_step()
                .map_or("starting", |step| step.step_id.as_str());
            let _ = writeln!(output, "\n{} pending plan at step {step}", "→".cyan());
        }
        output
    }

    fn attempt_row(index: usize, attempt: &PlanAttempt) -> AttemptRow {
        let result = match (attempt.failed_step(), attempt.healthy) {
            (Some(step), _) => format!("{} ({})", "failed".red(), step.step_id),
            (None, Some(false)) => "unhealthy".red().to_string(),
            (None, _) => "success".green().to_string(),
        };
        AttemptRow {
            index,
            attempt: attempt
                .plan_attempt_name
                .clone()
                .or_else(|| attempt.plan_attempt_id.clone())
                .unwrap_or_else(|| String::from("-")),
            started: attempt
                .attempt_start_time
                .map_or_else(|| String::from("-"), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            duration: attempt
                .duration()
                .map_or_else(|| String::from("-"), |d| format!("{}s", d.num_seconds())),
            result,
        }
    }

    /// Formats a success line.
    #[must_use]
    pub fn success(message: &str) -> String {
        format!("{} {message}", "✓".green())
    }

    /// Formats a failure line.
    #[must_use]
    pub fn failure(message: &str) -> String {
        format!("{} {message}", "✗".red())
    }
}
