//! ecectl CLI entrypoint.

use std::path::Path;
use std::process::ExitCode;

use ecectl::api::{
    DeploymentUpdateRequest, EceClient, InstanceSelection, ShutdownParams, UpdateParams,
};
use ecectl::cancel::{CancelHandle, CancelToken};
use ecectl::cli::{
    Cli, Commands, DeploymentCommands, MaintenanceMode, OutputFormatter, PlanCommands,
    ResourceCommands, TargetArgs, DEFAULT_ES_SIZE, DEFAULT_ES_ZONES,
};
use ecectl::config::{ConfigParser, TrackConfig};
use ecectl::deployment::{
    DeploymentId, DeploymentManager, PayloadBuilder, ResourceKind, ResourceManager, ResourceRef,
    ResourceSelector, Submission,
};
use ecectl::error::{EceError, Result};
use ecectl::sink::OutputSink;

use clap::Parser;
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Exit code of a run interrupted by the user.
const EXIT_INTERRUPTED: u8 = 130;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if is_interrupted(&e) {
                ExitCode::from(EXIT_INTERRUPTED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Initializes the logging system. Logs go to stderr.
fn init_logging(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn is_interrupted(error: &EceError) -> bool {
    match error {
        EceError::Api(ecectl::error::ApiError::Cancelled) => true,
        EceError::Tracking(errors) => errors.as_slice().iter().any(|e| e.is_cancelled()),
        _ => false,
    }
}

/// Everything a command needs.
struct Context {
    client: EceClient,
    region: String,
    track: TrackConfig,
    cancel: CancelToken,
    output: OutputSink,
    formatter: OutputFormatter,
}

impl Context {
    fn load(cli: &Cli, cancel: CancelToken) -> Result<Self> {
        let parser = ConfigParser::new().with_base_path(".");
        let mut config = parser.load(cli.config.as_deref())?;
        cli.apply_overrides(&mut config);
        debug!("Using API host {}", config.host);

        let client = EceClient::new(&config)?.with_cancel(cancel.clone());
        Ok(Self {
            client,
            region: config.region.clone().unwrap_or_default(),
            track: TrackConfig::from(config.track),
            cancel,
            output: OutputSink::stdout(),
            formatter: OutputFormatter::new(cli.output),
        })
    }

    fn deployments(&self) -> DeploymentManager {
        DeploymentManager::new(self.client.clone(), self.output.clone())
            .with_track_config(self.track)
            .with_cancel(self.cancel.clone())
    }

    fn resources(&self) -> ResourceManager {
        ResourceManager::new(self.client.clone(), self.output.clone())
            .with_track_config(self.track)
            .with_cancel(self.cancel.clone())
    }

    fn print(&self, text: &str) -> Result<()> {
        self.output.write_line(text.trim_end())?;
        Ok(())
    }

    /// Prints a response as JSON, or a one-line summary in text mode.
    fn report<T: Serialize>(&self, summary: &str, value: &T) -> Result<()> {
        if self.formatter.is_json() {
            self.output.write_json(value)
        } else {
            self.print(&OutputFormatter::success(summary))
        }
    }

    /// Prints the response of a submitted change, then surfaces tracking
    /// failures.
    fn finish<T: Serialize>(&self, summary: &str, submission: Submission<T>) -> Result<()> {
        self.report(summary, &submission.response)?;
        if let Some(errors) = &submission.tracking {
            for error in errors.as_slice() {
                self.print(&OutputFormatter::failure(&error.to_string()))?;
            }
        }
        submission.into_result().map(|_| ())
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let handle = CancelHandle::new();
    let context = Context::load(&cli, handle.token())?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, cancelling");
                handle.cancel();
            }
            Err(e) => warn!("Cannot listen for interrupts: {e}"),
        }
    });

    match cli.command {
        Commands::Deployment { command } => cmd_deployment(&context, command).await,
        Commands::Resource { kind, command } => cmd_resource(&context, kind, command).await,
    }
}

async fn cmd_deployment(ctx: &Context, command: DeploymentCommands) -> Result<()> {
    let manager = ctx.deployments();
    match command {
        DeploymentCommands::Create {
            spec,
            generate_payload,
            track,
        } => {
            let spec = spec.to_spec(&ctx.region, (DEFAULT_ES_SIZE, DEFAULT_ES_ZONES))?;
            let request = manager.create_request(&spec).await?;
            if generate_payload {
                return ctx.output.write_json(&request);
            }
            let submission = manager.create(&request, track).await?;
            let summary = format!("Created deployment {}", submission.response.id);
            ctx.finish(&summary, submission)
        }
        DeploymentCommands::Update {
            id,
            file,
            prune_orphans,
            skip_snapshot,
            hide_pruned_orphans,
            validate_only,
            track,
        } => {
            let id = DeploymentId::parse(id)?;
            let mut request = read_update_request(&file)?;
            request.prune_orphans = prune_orphans;
            let params = UpdateParams {
                skip_snapshot,
                hide_pruned_orphans,
                validate_only,
            };
            let submission = manager.update(&id, &request, &params, track).await?;
            ctx.finish(&format!("Updated deployment {id}"), submission)
        }
        DeploymentCommands::Show { id, show } => {
            let deployment = manager.show(&DeploymentId::parse(id)?, &show.into()).await?;
            ctx.print(&ctx.formatter.format_deployment(&deployment))
        }
        DeploymentCommands::Delete { id } => {
            let id = DeploymentId::parse(id)?;
            let response = manager.delete(&id).await?;
            ctx.report(&format!("Deleted deployment {id}"), &response)
        }
        DeploymentCommands::Shutdown {
            id,
            skip_snapshot,
            hide,
        } => {
            let id = DeploymentId::parse(id)?;
            let params = ShutdownParams { skip_snapshot, hide };
            let response = manager.shutdown(&id, &params).await?;
            ctx.report(&format!("Shutting down deployment {id}"), &response)
        }
        DeploymentCommands::Restore {
            id,
            restore_snapshot,
        } => {
            let id = DeploymentId::parse(id)?;
            let response = manager.restore(&id, restore_snapshot).await?;
            ctx.report(&format!("Restoring deployment {id}"), &response)
        }
        DeploymentCommands::Resync { id, all } => match id {
            Some(id) if !all => {
                let id = DeploymentId::parse(id)?;
                let response = manager.resync(&id).await?;
                ctx.report(&format!("Resynchronized deployment {id}"), &response)
            }
            _ => {
                let results = manager.resync_all().await?;
                let summary = format!(
                    "Resynchronized {} deployments ({} retried, {} failed)",
                    results.total_synchronized,
                    results.retried,
                    results.errors.len()
                );
                ctx.report(&summary, &results)
            }
        },
    }
}

async fn cmd_resource(ctx: &Context, kind: ResourceKind, command: ResourceCommands) -> Result<()> {
    let manager = ctx.resources();
    match command {
        ResourceCommands::Create {
            deployment_id,
            spec,
            elasticsearch_ref_id,
            generate_payload,
            track,
        } => {
            let defaults = if kind.is_stateless() {
                (0, 0)
            } else {
                (DEFAULT_ES_SIZE, DEFAULT_ES_ZONES)
            };
            let mut spec = spec
                .to_spec(&ctx.region, defaults)?
                .with_deployment_id(deployment_id);
            if let Some(ref_id) = elasticsearch_ref_id {
                spec = spec.with_elasticsearch_ref_id(ref_id);
            }

            if generate_payload {
                let builder = PayloadBuilder::new(&ctx.client);
                let payload = if kind.is_stateless() {
                    builder.build_stateless(kind, &spec).await?
                } else {
                    builder.build_elasticsearch(&spec).await?
                };
                return ctx.output.write_json(&payload);
            }

            let submission = manager.create(kind, &spec, track).await?;
            let summary = format!("Added {} to deployment {}", kind.display_name(), submission.response.id);
            ctx.finish(&summary, submission)
        }
        ResourceCommands::Show { target, show } => {
            let info = manager.show(&selector(kind, target)?, &show.into()).await?;
            ctx.print(&ctx.formatter.format_resource(kind, &info))
        }
        ResourceCommands::Shutdown {
            target,
            skip_snapshot,
            hide,
        } => {
            let params = ShutdownParams { skip_snapshot, hide };
            let response = manager.shutdown(&selector(kind, target)?, &params).await?;
            ctx.report(&format!("Shutting down {}", kind.display_name()), &response)
        }
        ResourceCommands::Restore {
            target,
            restore_snapshot,
        } => {
            let response = manager
                .restore(&selector(kind, target)?, restore_snapshot)
                .await?;
            ctx.report(&format!("Restoring {}", kind.display_name()), &response)
        }
        ResourceCommands::Upgrade { target } => {
            let response = manager.upgrade(&selector(kind, target)?).await?;
            ctx.report(&format!("Upgrading {} {}", kind.display_name(), response.resource_id), &response)
        }
        ResourceCommands::Stop { target, instances } => {
            let selection = InstanceSelection::from(instances);
            let response = manager.stop(&selector(kind, target)?, &selection).await?;
            ctx.report(&format!("Stopping {} instances", kind.display_name()), &response)
        }
        ResourceCommands::Start { target, instances } => {
            let selection = InstanceSelection::from(instances);
            let response = manager.start(&selector(kind, target)?, &selection).await?;
            ctx.report(&format!("Starting {} instances", kind.display_name()), &response)
        }
        ResourceCommands::Maintenance {
            target,
            mode,
            instances,
        } => {
            let enabled = mode == MaintenanceMode::On;
            let selection = InstanceSelection::from(instances);
            let response = manager
                .maintenance(&selector(kind, target)?, &selection, enabled)
                .await?;
            let verb = if enabled { "Entering" } else { "Leaving" };
            ctx.report(&format!("{verb} maintenance mode on {}", kind.display_name()), &response)
        }
        ResourceCommands::Delete { target } => {
            let response = manager.delete(&selector(kind, target)?).await?;
            ctx.report(&format!("Deleted {}", kind.display_name()), &response)
        }
        ResourceCommands::Resync { resource_id } => {
            let resource = ResourceRef::new(kind, resource_id);
            let response = manager.resync(&resource).await?;
            ctx.report(&format!("Resynchronized {resource}"), &response)
        }
        ResourceCommands::Plan { command } => cmd_plan(ctx, &manager, kind, command).await,
    }
}

async fn cmd_plan(
    ctx: &Context,
    manager: &ResourceManager,
    kind: ResourceKind,
    command: PlanCommands,
) -> Result<()> {
    match command {
        PlanCommands::Reapply {
            resource_id,
            flags,
            track,
        } => {
            let resource = ResourceRef::new(kind, resource_id);
            let submission = manager.reapply(&resource, &flags.into(), track).await?;
            ctx.finish(&format!("Reapplied the latest plan of {resource}"), submission)
        }
        PlanCommands::Cancel { resource_id } => {
            let resource = ResourceRef::new(kind, resource_id);
            let response = manager.cancel_pending_plan(&resource).await?;
            ctx.report(&format!("Cancelled the pending plan of {resource}"), &response)
        }
        PlanCommands::History { resource_id, logs } => {
            let resource = ResourceRef::new(kind, resource_id);
            let activity = manager.plan_activity(&resource, logs).await?;
            ctx.print(&ctx.formatter.format_history(&activity))
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn selector(kind: ResourceKind, target: TargetArgs) -> Result<ResourceSelector> {
    let selector = ResourceSelector::new(DeploymentId::parse(target.deployment_id)?, kind);
    Ok(match target.ref_id {
        Some(ref_id) => selector.with_ref_id(ref_id),
        None => selector,
    })
}

/// Reads a deployment update request from a JSON file.
fn read_update_request(path: &Path) -> Result<DeploymentUpdateRequest> {
    debug!("Reading update request from: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
