//! User-supplied description of a resource to create.

use serde::{Deserialize, Serialize};

use crate::api::NodeType;
use crate::error::{MultiError, ValidationError};

use super::kind::ResourceKind;

/// Template used when none is given.
pub const DEFAULT_TEMPLATE_ID: &str = "default";

/// Role names a topology element may use.
pub const TOPOLOGY_ROLES: [&str; 3] = ["data", "master", "ml"];

/// Elasticsearch node role a topology element asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyRole {
    /// Data nodes.
    Data,
    /// Dedicated master nodes.
    Master,
    /// Dedicated machine learning nodes.
    Ml,
}

impl TopologyRole {
    /// Parses a role name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "data" => Some(Self::Data),
            "master" => Some(Self::Master),
            "ml" => Some(Self::Ml),
            _ => None,
        }
    }

    /// Returns true if a template element with `node_type` serves this role.
    ///
    /// Master and ml elements only match when they do not also hold data.
    #[must_use]
    pub fn matches(self, node_type: &NodeType) -> bool {
        let data = node_type.data == Some(true);
        match self {
            Self::Data => data,
            Self::Master => !data && node_type.master == Some(true),
            Self::Ml => !data && node_type.ml == Some(true),
        }
    }
}

/// One requested topology element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyElement {
    /// Role name: `data`, `master` or `ml`.
    pub name: String,
    /// Memory per zone in MB.
    #[serde(default)]
    pub size: u32,
    /// Number of zones. Zero keeps the template value.
    #[serde(default)]
    pub zone_count: u32,
}

impl TopologyElement {
    /// Creates an element.
    #[must_use]
    pub fn new(name: impl Into<String>, size: u32, zone_count: u32) -> Self {
        Self {
            name: name.into(),
            size,
            zone_count,
        }
    }

    /// Decodes an element from its JSON form, e.g.
    /// `{"name":"data","size":2048,"zone_count":2}`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTopologyElement`] if the input is
    /// not a valid element.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(raw).map_err(|e| ValidationError::InvalidTopologyElement {
            input: raw.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decodes every element, reporting all failures together.
    ///
    /// # Errors
    ///
    /// Returns every element that failed to decode.
    pub fn parse_all<S: AsRef<str>>(raws: &[S]) -> Result<Vec<Self>, MultiError<ValidationError>> {
        let mut elements = Vec::with_capacity(raws.len());
        let mut errors = MultiError::new();
        for raw in raws {
            match Self::parse(raw.as_ref()) {
                Ok(element) => elements.push(element),
                Err(e) => errors.push(e),
            }
        }
        errors.into_result().map(|()| elements)
    }

    /// Returns the role, if the name is known.
    #[must_use]
    pub fn role(&self) -> Option<TopologyRole> {
        TopologyRole::from_name(&self.name)
    }

    /// Checks the name and size.
    pub(crate) fn validate(&self, errors: &mut MultiError<ValidationError>) {
        if self.role().is_none() {
            errors.push(ValidationError::InvalidTopologyName {
                name: self.name.clone(),
            });
        }
        if self.size == 0 {
            errors.push(ValidationError::InvalidTopologySize {
                name: self.name.clone(),
            });
        }
    }
}

/// Parameters for building a resource payload.
///
/// Empty strings are treated the same as absent values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleSpec {
    /// Deployment the resource belongs to.
    pub deployment_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Stack version.
    pub version: Option<String>,
    /// Region.
    pub region: String,
    /// Deployment template.
    pub template_id: Option<String>,
    /// Ref id of the new resource.
    pub ref_id: Option<String>,
    /// Ref id of the Elasticsearch resource to attach to.
    pub elasticsearch_ref_id: Option<String>,
    /// Memory per zone in MB. Zero keeps the template value.
    pub size: u32,
    /// Number of zones. Zero keeps the template value.
    pub zone_count: u32,
    /// Elasticsearch topology. Empty means a single data element.
    pub topology: Vec<TopologyElement>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

impl SimpleSpec {
    /// Creates a spec for `region`.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    /// Sets the deployment.
    #[must_use]
    pub fn with_deployment_id(mut self, id: impl Into<String>) -> Self {
        self.deployment_id = Some(id.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the stack version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the template.
    #[must_use]
    pub fn with_template_id(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    /// Sets the ref id.
    #[must_use]
    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }

    /// Sets the Elasticsearch ref id.
    #[must_use]
    pub fn with_elasticsearch_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.elasticsearch_ref_id = Some(ref_id.into());
        self
    }

    /// Sets size and zone count.
    #[must_use]
    pub const fn with_capacity(mut self, size: u32, zone_count: u32) -> Self {
        self.size = size;
        self.zone_count = zone_count;
        self
    }

    /// Sets the topology.
    #[must_use]
    pub fn with_topology(mut self, topology: Vec<TopologyElement>) -> Self {
        self.topology = topology;
        self
    }

    /// Returns the deployment id, if set.
    #[must_use]
    pub fn deployment_id(&self) -> Option<&str> {
        non_empty(self.deployment_id.as_ref())
    }

    /// Returns the version, if set.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        non_empty(self.version.as_ref())
    }

    /// Returns the template id, if set.
    #[must_use]
    pub fn template_id(&self) -> Option<&str> {
        non_empty(self.template_id.as_ref())
    }

    /// Returns the Elasticsearch ref id, if set.
    #[must_use]
    pub fn elasticsearch_ref_id(&self) -> Option<&str> {
        non_empty(self.elasticsearch_ref_id.as_ref())
    }

    /// Returns the template id, falling back to [`DEFAULT_TEMPLATE_ID`].
    #[must_use]
    pub fn template_id_or_default(&self) -> &str {
        self.template_id().unwrap_or(DEFAULT_TEMPLATE_ID)
    }

    /// Returns the ref id, falling back to the default of `kind`.
    #[must_use]
    pub fn ref_id_or_default(&self, kind: ResourceKind) -> String {
        non_empty(self.ref_id.as_ref())
            .unwrap_or_else(|| kind.default_ref_id())
            .to_string()
    }

    /// Returns the topology to build, adding the default data element when
    /// none was requested.
    #[must_use]
    pub fn requested_topology(&self) -> Vec<TopologyElement> {
        if self.topology.is_empty() {
            vec![TopologyElement::new("data", self.size, self.zone_count)]
        } else {
            self.topology.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_element() {
        let element = TopologyElement::parse(r#"{"name":"data","size":2048,"zone_count":2}"#).unwrap();
        assert_eq!(element, TopologyElement::new("data", 2048, 2));
        assert_eq!(element.role(), Some(TopologyRole::Data));
    }

    #[test]
    fn test_parse_all_collects_every_failure() {
        let raws = [
            r#"{"name":"data","size":1024}"#,
            "not json",
            r#"{"size":1024}"#,
        ];
        let errors = TopologyElement::parse_all(&raws[..]).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .as_slice()
            .iter()
            .all(|e| matches!(e, ValidationError::InvalidTopologyElement { .. })));
    }

    #[test]
    fn test_validate_element() {
        let mut errors = MultiError::new();
        TopologyElement::new("coordinating", 0, 1).validate(&mut errors);
        assert_eq!(
            errors.into_inner(),
            vec![
                ValidationError::InvalidTopologyName {
                    name: String::from("coordinating")
                },
                ValidationError::InvalidTopologySize {
                    name: String::from("coordinating")
                },
            ]
        );
    }

    #[test]
    fn test_role_matching() {
        let data_master = NodeType {
            data: Some(true),
            master: Some(true),
            ..NodeType::default()
        };
        let master = NodeType {
            data: Some(false),
            master: Some(true),
            ..NodeType::default()
        };
        let ml = NodeType {
            ml: Some(true),
            ..NodeType::default()
        };

        assert!(TopologyRole::Data.matches(&data_master));
        assert!(!TopologyRole::Master.matches(&data_master));
        assert!(TopologyRole::Master.matches(&master));
        assert!(TopologyRole::Ml.matches(&ml));
        assert!(!TopologyRole::Data.matches(&ml));
    }

    #[test]
    fn test_defaults() {
        let spec = SimpleSpec::new("us-east-1").with_ref_id("");
        assert_eq!(spec.ref_id_or_default(ResourceKind::Kibana), "main-kibana");
        assert_eq!(spec.template_id_or_default(), DEFAULT_TEMPLATE_ID);
        assert_eq!(
            spec.with_capacity(4096, 1).requested_topology(),
            vec![TopologyElement::new("data", 4096, 1)]
        );
    }
}
