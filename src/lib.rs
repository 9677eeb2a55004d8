// ============================================================================
// Linting
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # ecectl
//!
//! Control tool for Elasticsearch deployments hosted on an Elastic Cloud
//! Enterprise platform.
//!
//! ## Overview
//!
//! A deployment groups one Elasticsearch resource with stateless resources
//! (Kibana, APM, App Search) attached to it. This crate:
//!
//! - Builds resource payloads from a deployment template and a few sizing
//!   parameters
//! - Discovers missing values (template id, Elasticsearch ref id, stack
//!   version) from the platform
//! - Resubmits the latest plan of a resource with a chosen change strategy
//! - Follows submitted changes to completion, many resources at once
//!
//! ## Modules
//!
//! - [`config`]: Client settings and their sources
//! - [`api`]: REST client and wire types
//! - [`deployment`]: Resolution, payload building, plan reapply and tracking
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # ~/.ecectl/config.yaml
//! host: https://ece.example.com:12443
//! api_key: "..."
//! region: ece-region
//! track:
//!   poll_interval_secs: 2
//!   max_retries: 3
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod api;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod deployment;
pub mod error;
pub mod sink;

#[cfg(test)]
mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::EceClient;
pub use cancel::{CancelHandle, CancelToken};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ClientConfig, ConfigParser, TrackConfig};
pub use deployment::{
    ChangeTracker, DeploymentId, DeploymentManager, PayloadBuilder, PlanReapplier,
    ReapplyOverrides, ResourceKind, ResourceManager, SimpleSpec, TemplateResolver,
};
pub use error::{EceError, Result};
pub use sink::OutputSink;
