//! Resource kinds and their per-kind API conventions.
//!
//! Every kind-specific difference (paths, default ref ids, which plan flags
//! apply) lives in this table so that the operations themselves are written
//! once and dispatch on [`ResourceKind`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A kind of deployment resource.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Elasticsearch cluster.
    Elasticsearch,
    /// Kibana instance.
    Kibana,
    /// APM server.
    Apm,
    /// App Search.
    Appsearch,
}

impl ResourceKind {
    /// All kinds, in payload order.
    pub const ALL: [Self; 4] = [Self::Elasticsearch, Self::Kibana, Self::Apm, Self::Appsearch];

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Elasticsearch => "elasticsearch",
            Self::Kibana => "kibana",
            Self::Apm => "apm",
            Self::Appsearch => "appsearch",
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Elasticsearch => "Elasticsearch",
            Self::Kibana => "Kibana",
            Self::Apm => "APM",
            Self::Appsearch => "App Search",
        }
    }

    /// Ref id used when the caller does not provide one.
    #[must_use]
    pub const fn default_ref_id(self) -> &'static str {
        match self {
            Self::Elasticsearch => "main-elasticsearch",
            Self::Kibana => "main-kibana",
            Self::Apm => "main-apm",
            Self::Appsearch => "main-appsearch",
        }
    }

    /// Path segment of the resource-id addressed cluster endpoints.
    #[must_use]
    pub const fn cluster_path(self) -> &'static str {
        match self {
            Self::Elasticsearch => "clusters/elasticsearch",
            Self::Kibana => "clusters/kibana",
            Self::Apm => "clusters/apm",
            Self::Appsearch => "clusters/appsearch",
        }
    }

    /// Returns true for kinds that attach to an Elasticsearch resource.
    #[must_use]
    pub const fn is_stateless(self) -> bool {
        !matches!(self, Self::Elasticsearch)
    }

    /// Returns true if plan progress can be followed for this kind.
    #[must_use]
    pub const fn supports_tracking(self) -> bool {
        !matches!(self, Self::Appsearch)
    }

    /// Returns true if plan submission accepts `validate_only`.
    #[must_use]
    pub const fn supports_validate_only(self) -> bool {
        matches!(self, Self::Elasticsearch)
    }

    /// Returns true if the transient plan configuration carries the
    /// snapshot, data migration and upgrade skip flags.
    #[must_use]
    pub const fn supports_data_flags(self) -> bool {
        matches!(self, Self::Elasticsearch)
    }
}

/// A resource addressed by kind and resource id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource identifier.
    pub id: String,
}

impl ResourceRef {
    /// Creates a reference.
    #[must_use]
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.kind.display_name(), self.id)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown resource kind: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ref_ids() {
        assert_eq!(ResourceKind::Elasticsearch.default_ref_id(), "main-elasticsearch");
        assert_eq!(ResourceKind::Kibana.default_ref_id(), "main-kibana");
        assert_eq!(ResourceKind::Apm.default_ref_id(), "main-apm");
        assert_eq!(ResourceKind::Appsearch.default_ref_id(), "main-appsearch");
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("APM".parse::<ResourceKind>(), Ok(ResourceKind::Apm));
        assert_eq!("appsearch".parse::<ResourceKind>(), Ok(ResourceKind::Appsearch));
        assert!("enterprise_search".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_tracking_support() {
        assert!(ResourceKind::Elasticsearch.supports_tracking());
        assert!(ResourceKind::Kibana.supports_tracking());
        assert!(!ResourceKind::Appsearch.supports_tracking());
    }
}
