//! Error types for the deployment control tool.
//!
//! Errors are grouped by concern: configuration, parameter validation, the
//! remote API, discovery of missing values, preconditions, and change
//! tracking. Validation and tracking faults are reported as composites so a
//! caller sees every problem at once.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::deployment::ResourceKind;

/// The main error type.
#[derive(Debug, Error)]
pub enum EceError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// One or more invalid parameters.
    #[error("{0}")]
    Validation(MultiError<ValidationError>),

    /// Remote API errors.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// A value that should have been discovered could not be.
    #[error("{0}")]
    Discovery(#[from] DiscoveryError),

    /// The remote state does not allow the operation.
    #[error("{0}")]
    Precondition(#[from] PreconditionError),

    /// One or more resources could not be tracked to completion.
    #[error("{0}")]
    Tracking(MultiError<TrackError>),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A configuration value is out of range or malformed.
    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Description of the problem.
        message: String,
    },
}

/// Parameter validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No API endpoint or credentials were supplied.
    #[error("an API client is required: set a host and credentials")]
    MissingApi,

    /// The deployment identifier does not have the expected length.
    #[error("invalid deployment id \"{id}\": must be {expected} characters long")]
    InvalidDeploymentId {
        /// The rejected identifier.
        id: String,
        /// Required length.
        expected: usize,
    },

    /// A resource ref id was given but is empty.
    #[error("{kind} ref id cannot be empty")]
    EmptyRefId {
        /// Kind the ref id belongs to.
        kind: ResourceKind,
    },

    /// The operation is not available for this resource kind.
    #[error("{operation} is not supported for {kind} resources")]
    UnsupportedKind {
        /// Operation name.
        operation: String,
        /// Rejected kind.
        kind: ResourceKind,
    },

    /// A transient plan setting combination is not allowed.
    #[error("invalid transient settings: {message}")]
    InvalidTransient {
        /// Description of the conflict.
        message: String,
    },

    /// More than one change strategy was selected.
    #[error("only one change strategy can be selected, got: {}", strategies.join(", "))]
    MixedStrategies {
        /// The selected strategies.
        strategies: Vec<String>,
    },

    /// No template topology element matched the requested roles.
    #[error("deployment template \"{template_id}\" has no topology matching {requested}")]
    TopologyUnsatisfiable {
        /// Requested role names.
        requested: String,
        /// Template that was searched.
        template_id: String,
    },

    /// The template has no section for the requested kind.
    #[error("deployment template \"{template_id}\" does not define a {kind} resource")]
    TemplateKindMissing {
        /// Requested kind.
        kind: ResourceKind,
        /// Template that was searched.
        template_id: String,
    },

    /// A required field is empty.
    #[error("{field} cannot be empty")]
    MissingField {
        /// Field name.
        field: &'static str,
    },

    /// A raw topology element could not be decoded.
    #[error("invalid topology element {input}: {reason}")]
    InvalidTopologyElement {
        /// The raw input.
        input: String,
        /// Decoder message.
        reason: String,
    },

    /// A topology element names an unknown role.
    #[error("topology element name \"{name}\" is not one of data, master, ml")]
    InvalidTopologyName {
        /// The rejected name.
        name: String,
    },

    /// A topology element has no size.
    #[error("topology element \"{name}\" must have a size greater than 0")]
    InvalidTopologySize {
        /// Element name.
        name: String,
    },
}

/// Remote API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("API request failed with status {status}: {body}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response body, unchanged.
        body: String,
    },

    /// Network error.
    #[error("Network error communicating with the API: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// Rate limited.
    #[error("API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Invalid response from API.
    #[error("Invalid response from the API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
}

/// Errors raised when a missing value could not be derived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// No Elasticsearch resource carries a deployment template reference.
    #[error("unable to obtain a deployment template id from deployment {deployment_id}")]
    TemplateUnavailable {
        /// Deployment that was inspected.
        deployment_id: String,
    },

    /// The latest stack version could not be determined.
    #[error("unable to discover the latest stack version: {reason}")]
    VersionDiscoveryFailed {
        /// Why discovery failed.
        reason: String,
    },

    /// The plan history of a resource is empty.
    #[error("{kind} resource {resource_id} has no plan attempts to reapply")]
    NoLatestAttempt {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource identifier.
        resource_id: String,
    },

    /// The deployment has no resource of the kind to take a ref id from.
    #[error("deployment {deployment_id} has no {kind} resource")]
    RefIdUnavailable {
        /// Resource kind.
        kind: ResourceKind,
        /// Deployment that was inspected.
        deployment_id: String,
    },
}

/// Errors raised when the remote state does not allow an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// The resource or deployment must be stopped first.
    #[error("{operation}: deployment must be stopped")]
    NotStopped {
        /// Operation that was refused, e.g. `apm delete`.
        operation: String,
    },
}

/// Per-resource tracking errors.
#[derive(Debug, Error)]
pub enum TrackError {
    /// The kind cannot be tracked.
    #[error("{kind} resource {resource_id}: change tracking is not supported")]
    UnsupportedTracking {
        /// Resource identifier.
        resource_id: String,
        /// Resource kind.
        kind: ResourceKind,
    },

    /// The resource did not finish in time.
    #[error("{kind} resource {resource_id}: tracking timed out after {}s", elapsed.as_secs())]
    Timeout {
        /// Resource identifier.
        resource_id: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Time spent tracking.
        elapsed: Duration,
    },

    /// Tracking was cancelled by the caller.
    #[error("change tracking cancelled")]
    Cancelled,

    /// The plan reached a terminal error stage.
    #[error("{kind} resource {resource_id}: plan failed at step \"{step}\": {message}")]
    PlanFailed {
        /// Resource identifier.
        resource_id: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Failing step.
        step: String,
        /// Last log message of the failing step.
        message: String,
    },

    /// The retry budget for transient errors was spent.
    #[error("{kind} resource {resource_id}: giving up after {attempts} failed polls: {last}")]
    RetriesExhausted {
        /// Resource identifier.
        resource_id: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Failed attempts.
        attempts: u32,
        /// Last error seen.
        last: String,
    },

    /// A non-retryable API error.
    #[error("{kind} resource {resource_id}: {source}")]
    Remote {
        /// Resource identifier.
        resource_id: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Underlying error.
        source: ApiError,
    },

    /// The worker following the resource stopped without reporting.
    #[error("{kind} resource {resource_id}: tracking worker failed: {message}")]
    WorkerFailed {
        /// Resource identifier.
        resource_id: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Why the worker stopped.
        message: String,
    },
}

/// An ordered collection of errors reported together.
#[derive(Debug)]
pub struct MultiError<E> {
    errors: Vec<E>,
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, EceError>;

/// Structured view of an API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorReply {
    /// Individual errors.
    #[serde(default)]
    pub errors: Vec<ErrorReplyItem>,
}

/// A single error returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorReplyItem {
    /// Machine readable error code.
    #[serde(default)]
    pub code: String,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
    /// Offending request fields.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl EceError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wraps a single validation error.
    #[must_use]
    pub fn invalid(error: ValidationError) -> Self {
        Self::Validation(MultiError::from(vec![error]))
    }

    /// Returns the validation errors, if this is a validation failure.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            Self::Validation(errors) => Some(errors.as_slice()),
            _ => None,
        }
    }

    /// Returns the tracking errors, if this is a tracking failure.
    #[must_use]
    pub fn tracking_errors(&self) -> Option<&[TrackError]> {
        match self {
            Self::Tracking(errors) => Some(errors.as_slice()),
            _ => None,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if the server answered 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(ApiError::Remote { status: 404, .. }))
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Api(ApiError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Api(ApiError::Network { .. } | ApiError::Remote { .. }) => Some(1),
            _ => None,
        }
    }
}

impl From<ValidationError> for EceError {
    fn from(error: ValidationError) -> Self {
        Self::invalid(error)
    }
}

impl From<MultiError<ValidationError>> for EceError {
    fn from(errors: MultiError<ValidationError>) -> Self {
        Self::Validation(errors)
    }
}

impl From<MultiError<TrackError>> for EceError {
    fn from(errors: MultiError<TrackError>) -> Self {
        Self::Tracking(errors)
    }
}

impl ApiError {
    /// Creates a remote error, keeping the body as received.
    #[must_use]
    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        Self::Remote {
            status,
            body: body.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Returns true for failures worth another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited { .. } => true,
            Self::Remote { status, .. } => *status >= 500,
            Self::InvalidResponse { .. } | Self::Cancelled => false,
        }
    }

    /// Parses the body of a remote error, if it has the API's error shape.
    #[must_use]
    pub fn reply(&self) -> Option<ErrorReply> {
        match self {
            Self::Remote { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}

impl TrackError {
    /// Returns true if this error records a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl<E> MultiError<E> {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Appends an error.
    pub fn push(&mut self, error: E) {
        self.errors.push(error);
    }

    /// Returns true if no errors were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns the errors as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[E] {
        &self.errors
    }

    /// Consumes the collection and returns the errors.
    #[must_use]
    pub fn into_inner(self) -> Vec<E> {
        self.errors
    }

    /// Returns `Ok(())` when empty, otherwise the collection as an error.
    ///
    /// # Errors
    ///
    /// Returns the collection itself when it holds at least one error.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl<E> Default for MultiError<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> From<Vec<E>> for MultiError<E> {
    fn from(errors: Vec<E>) -> Self {
        Self { errors }
    }
}

impl<E> Extend<E> for MultiError<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl<E: fmt::Display> fmt::Display for MultiError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no errors"),
            [single] => write!(f, "{single}"),
            many => {
                write!(f, "{} errors occurred:", many.len())?;
                for error in many {
                    write!(f, "\n\t* {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for MultiError<E> {}
