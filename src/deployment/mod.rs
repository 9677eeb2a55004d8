//! Deployment and resource operations.
//!
//! - [`TemplateResolver`] fills the template id and Elasticsearch ref id of
//!   a request from the target deployment.
//! - [`PayloadBuilder`] turns a [`SimpleSpec`] into a resource payload.
//! - [`PlanReapplier`] resubmits the latest plan of a resource.
//! - [`ChangeTracker`] follows submitted changes to completion.

mod ids;
mod kind;
mod lifecycle;
mod payload;
mod reapply;
mod resource;
mod spec;
mod template;
mod tracker;

pub use ids::{DeploymentId, ID_LENGTH};
pub use kind::{ResourceKind, ResourceRef};
pub use lifecycle::DeploymentManager;
pub use payload::{
    match_topology, select_latest, stateless_topology, validate_elasticsearch, validate_stateless,
    PayloadBuilder,
};
pub use reapply::{compute_transient, ChangeStrategy, PlanReapplier, ReapplyOverrides};
pub use resource::{ResourceManager, ResourceSelector};
pub use spec::{SimpleSpec, TopologyElement, TopologyRole, DEFAULT_TEMPLATE_ID, TOPOLOGY_ROLES};
pub use template::{find_origin, TemplateOrigin, TemplateResolver};
pub use tracker::{ActivitySource, ChangeTracker, Submission, TrackTask};
