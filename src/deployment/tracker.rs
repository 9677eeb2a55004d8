//! Change tracking.
//!
//! After a change is submitted, one worker per affected resource polls the
//! resource's plan activity until the plan finished or failed. Workers run
//! concurrently and report to a collector over a channel; the collector
//! returns every failure at once.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::api::{DeploymentResource, EceClient, Orphaned, PlanActivity, PlanAttempt, StepStatus};
use crate::cancel::CancelToken;
use crate::config::TrackConfig;
use crate::error::{ApiError, EceError, MultiError, Result, TrackError};
use crate::sink::OutputSink;

use super::kind::{ResourceKind, ResourceRef};

/// Source of plan activity for a resource.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Reads the plan activity of a resource.
    async fn plan_activity(&self, kind: ResourceKind, resource_id: &str) -> Result<PlanActivity>;
}

#[async_trait]
impl ActivitySource for EceClient {
    async fn plan_activity(&self, kind: ResourceKind, resource_id: &str) -> Result<PlanActivity> {
        self.poll_plan_activity(kind, resource_id).await
    }
}

/// One resource to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTask {
    /// The resource.
    pub resource: ResourceRef,
    /// Whether the resource is being shut down by the change.
    pub orphaned: bool,
}

impl TrackTask {
    /// A resource kept by the change.
    #[must_use]
    pub fn live(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            resource: ResourceRef::new(kind, id),
            orphaned: false,
        }
    }

    /// A resource removed by the change.
    #[must_use]
    pub fn orphaned(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            resource: ResourceRef::new(kind, id),
            orphaned: true,
        }
    }

    /// Builds the worklist of a create or update response: every live
    /// resource, then every orphaned one.
    #[must_use]
    pub fn from_response(resources: &[DeploymentResource], orphaned: Option<&Orphaned>) -> Vec<Self> {
        let mut tasks: Vec<Self> = resources
            .iter()
            .filter_map(|resource| match resource.resource_kind() {
                Some(kind) => Some(Self::live(kind, resource.id.clone())),
                None => {
                    warn!("Not tracking resource {} of unknown kind {}", resource.id, resource.kind);
                    None
                }
            })
            .collect();
        if let Some(orphaned) = orphaned {
            tasks.extend(
                orphaned
                    .ids()
                    .into_iter()
                    .map(|(kind, id)| Self::orphaned(kind, id)),
            );
        }
        tasks
    }
}

/// The result of a submitted change.
#[derive(Debug)]
pub struct Submission<T> {
    /// The server response to the submission.
    pub response: T,
    /// Tracking failures, when tracking was requested and failed.
    pub tracking: Option<MultiError<TrackError>>,
}

impl<T> Submission<T> {
    /// A submission that was not tracked.
    #[must_use]
    pub const fn untracked(response: T) -> Self {
        Self {
            response,
            tracking: None,
        }
    }

    /// Returns the response, or the tracking failures.
    ///
    /// # Errors
    ///
    /// Returns [`EceError::Tracking`] if tracking failed.
    pub fn into_result(self) -> Result<T> {
        match self.tracking {
            Some(errors) => Err(errors.into()),
            None => Ok(self.response),
        }
    }
}

/// Follows plan changes of many resources concurrently.
#[derive(Clone)]
pub struct ChangeTracker {
    source: Arc<dyn ActivitySource>,
    output: OutputSink,
    config: TrackConfig,
    cancel: CancelToken,
}

impl std::fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What the latest plan activity says.
#[derive(Debug, PartialEq)]
enum Progress<'a> {
    Running(&'a PlanAttempt),
    Finished(&'a PlanAttempt),
    Failed { step: String, message: String },
    Idle,
}

fn assess(activity: &PlanActivity) -> Progress<'_> {
    if let Some(pending) = &activity.pending {
        return Progress::Running(pending);
    }
    let Some(attempt) = activity.latest_attempt() else {
        return Progress::Idle;
    };
    match attempt.failed_step() {
        Some(step) => Progress::Failed {
            step: step.step_id.clone(),
            message: step
                .last_message()
                .unwrap_or("the step reported an error")
                .to_string(),
        },
        None if attempt.healthy == Some(false) => Progress::Failed {
            step: attempt
                .last_step()
                .map_or_else(|| String::from("unknown"), |s| s.step_id.clone()),
            message: String::from("the plan attempt is unhealthy"),
        },
        None => Progress::Finished(attempt),
    }
}

impl ChangeTracker {
    /// Creates a tracker with the default configuration.
    #[must_use]
    pub fn new(source: Arc<dyn ActivitySource>, output: OutputSink) -> Self {
        Self {
            source,
            output,
            config: TrackConfig::default(),
            cancel: CancelToken::never(),
        }
    }

    /// Sets the polling parameters.
    #[must_use]
    pub const fn with_config(mut self, config: TrackConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Tracks every task to completion.
    ///
    /// # Errors
    ///
    /// Returns one entry per failed resource. Cancellation is reported once.
    pub async fn track(&self, tasks: Vec<TrackTask>) -> std::result::Result<(), MultiError<TrackError>> {
        if tasks.is_empty() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::channel(tasks.len());
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let worker = self.clone();
            let tx = tx.clone();
            let resource = task.resource.clone();
            let handle = tokio::spawn(async move {
                let result = worker.follow(&task).await;
                if tx.send(result).await.is_err() {
                    debug!("Collector gone before {} reported", task.resource);
                }
            });
            handles.push((resource, handle));
        }
        drop(tx);

        let mut errors = MultiError::new();
        let mut cancelled = false;
        while let Some(result) = rx.recv().await {
            match result {
                Ok(()) => {}
                Err(TrackError::Cancelled) => {
                    if !cancelled {
                        cancelled = true;
                        errors.push(TrackError::Cancelled);
                    }
                }
                Err(e) => errors.push(e),
            }
        }

        // A worker that panicked never sent its result.
        for (resource, handle) in handles {
            if let Err(e) = handle.await {
                error!("Tracking worker for {resource} failed: {e}");
                errors.push(TrackError::WorkerFailed {
                    resource_id: resource.id,
                    kind: resource.kind,
                    message: e.to_string(),
                });
            }
        }

        errors.into_result()
    }

    /// Polls one resource until its plan finished or failed.
    async fn follow(&self, task: &TrackTask) -> std::result::Result<(), TrackError> {
        let ResourceRef { kind, id } = &task.resource;
        let kind = *kind;
        if !kind.supports_tracking() {
            return Err(TrackError::UnsupportedTracking {
                resource_id: id.clone(),
                kind,
            });
        }

        let started = Instant::now();
        let mut failures = 0_u32;
        let mut idle_polls = 0_u32;
        let mut seen_pending = false;
        let mut last_step: Option<String> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(TrackError::Cancelled);
            }
            if let Some(limit) = self.config.timeout {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    return Err(TrackError::Timeout {
                        resource_id: id.clone(),
                        kind,
                        elapsed,
                    });
                }
            }

            match self.source.plan_activity(kind, id).await {
                Ok(activity) => {
                    failures = 0;
                    // A finished attempt seen before any pending plan may be
                    // the previous change; it only counts after the grace polls.
                    let settled = seen_pending || idle_polls >= self.config.max_retries;
                    match assess(&activity) {
                        Progress::Running(attempt) => {
                            seen_pending = true;
                            self.report_step(&task.resource, attempt, &mut last_step);
                        }
                        Progress::Finished(attempt) if settled => {
                            self.report_finished(&task.resource, attempt);
                            return Ok(());
                        }
                        Progress::Idle if settled => {
                            self.report(&format!("{}: no plan changes to track", task.resource));
                            return Ok(());
                        }
                        Progress::Failed { step, message } if settled => {
                            return Err(TrackError::PlanFailed {
                                resource_id: id.clone(),
                                kind,
                                step,
                                message,
                            });
                        }
                        Progress::Finished(_) | Progress::Idle | Progress::Failed { .. } => {
                            idle_polls += 1;
                        }
                    }
                }
                Err(err) if task.orphaned && err.is_not_found() => {
                    self.report(&format!("{}: resource removed", task.resource));
                    return Ok(());
                }
                Err(EceError::Api(ApiError::Cancelled)) => return Err(TrackError::Cancelled),
                Err(err) if err.is_retryable() => {
                    failures += 1;
                    if failures > self.config.max_retries {
                        return Err(TrackError::RetriesExhausted {
                            resource_id: id.clone(),
                            kind,
                            attempts: failures,
                            last: err.to_string(),
                        });
                    }
                    warn!("{}: poll failed ({failures}/{}): {err}", task.resource, self.config.max_retries);
                }
                Err(EceError::Api(source)) => {
                    return Err(TrackError::Remote {
                        resource_id: id.clone(),
                        kind,
                        source,
                    });
                }
                Err(other) => {
                    return Err(TrackError::Remote {
                        resource_id: id.clone(),
                        kind,
                        source: ApiError::InvalidResponse {
                            message: other.to_string(),
                        },
                    });
                }
            }

            self.pause().await?;
        }
    }

    async fn pause(&self) -> std::result::Result<(), TrackError> {
        tokio::select! {
            () = tokio::time::sleep(self.config.poll_interval) => Ok(()),
            () = self.cancel.cancelled() => Err(TrackError::Cancelled),
        }
    }

    fn report_step(&self, resource: &ResourceRef, attempt: &PlanAttempt, last_step: &mut Option<String>) {
        let Some(step) = attempt.last_step() else {
            if last_step.is_none() {
                *last_step = Some(String::new());
                self.report(&format!("{resource}: plan attempt started"));
            }
            return;
        };
        if last_step.as_deref() == Some(step.step_id.as_str()) {
            return;
        }
        *last_step = Some(step.step_id.clone());
        let line = if step.status == StepStatus::Error {
            format!("{resource}: step \"{}\" reported an error, retrying", step.step_id)
        } else {
            format!("{resource}: running step \"{}\"", step.step_id)
        };
        self.report(&line);
    }

    fn report_finished(&self, resource: &ResourceRef, attempt: &PlanAttempt) {
        let line = match attempt.duration().and_then(|d| d.to_std().ok()) {
            Some(took) => format!(
                "{resource}: finished running all the plan steps (total running time {}s)",
                took.as_secs()
            ),
            None => format!("{resource}: finished running all the plan steps"),
        };
        self.report(&line);
    }

    fn report(&self, line: &str) {
        if let Err(e) = self.output.write_line(line) {
            warn!("Failed to write tracking output: {e}");
        }
    }
}
