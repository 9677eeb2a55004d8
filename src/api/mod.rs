//! Deployment platform API integration.
//!
//! This module provides:
//! - The HTTP client for the REST API
//! - Request and response types for deployments and resources
//! - Plan, topology and plan activity types
//! - Deployment template and stack version types

mod client;
mod plan;
mod template;
mod types;

pub use client::{EceClient, InstanceSelection, ShowParams, ShutdownParams, UpdateParams};
pub use plan::{
    KindConfiguration, NodeType, Plan, PlanActivity, PlanAttempt, PlanConfiguration, PlanStep,
    PlanStrategy, RollingStrategy, StepLogMessage, StepStage, StepStatus, StrategyOptions,
    TemplateReference, TopologySize, TopologySlot, Transient, GROUP_BY_ALL, GROUP_BY_NAME,
    MEMORY_RESOURCE,
};
pub use template::{DeploymentTemplateInfo, StackVersion, StackVersionList, TemplateBody, TemplateResource};
pub use types::{
    ClusterCrudResponse, Credentials, DeploymentCommandResponse, DeploymentCreateRequest,
    DeploymentCreateResponse, DeploymentDeleteResponse, DeploymentGetResponse, DeploymentResource,
    DeploymentUpdateRequest, DeploymentUpdateResponse, IndexSyncResults, Orphaned,
    OrphanedElasticsearch, PerKind, ResourceClusterInfo, ResourceCommandResponse, ResourceInfo,
    ResourcePayload, ResourceStatus, ResourceUpgradeResponse,
};
