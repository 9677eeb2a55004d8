//! Deployment template and stack version types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::plan::Plan;
use super::types::PerKind;

/// A deployment template as returned by
/// `GET /platform/configuration/templates/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentTemplateInfo {
    /// Template identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Template name.
    #[serde(default)]
    pub name: String,
    /// The deployment the template describes.
    #[serde(default)]
    pub deployment_template: TemplateBody,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The deployment definition carried by a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateBody {
    /// Resources by kind.
    #[serde(default)]
    pub resources: PerKind<TemplateResource>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One resource section of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateResource {
    /// Ref id suggested by the template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    /// Default plan.
    #[serde(default)]
    pub plan: Plan,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `GET /platform/configuration/stacks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackVersionList {
    /// Available stack versions.
    #[serde(default)]
    pub stacks: Vec<StackVersion>,
}

/// An available stack version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackVersion {
    /// Version string.
    pub version: String,
    /// Whether the version was removed.
    #[serde(default)]
    pub deleted: bool,
}
