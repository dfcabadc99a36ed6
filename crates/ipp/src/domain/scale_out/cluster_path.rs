use std::fmt;
use std::str::FromStr;

use error_stack::Report;

use super::DriverError;

/// Fully qualified GKE cluster name, `projects/{p}/locations/{l}/clusters/{c}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPath {
    pub project: String,
    pub location: String,
    pub cluster: String,
}

impl ClusterPath {
    /// Fully qualified name of `node_pool` in this cluster
    pub fn node_pool_name(&self, node_pool: &str) -> String {
        format!("{self}/nodePools/{node_pool}")
    }

    /// Fully qualified name of an operation in this cluster's location.
    ///
    /// Operations are returned with a short name; names that are already
    /// qualified are kept as they are.
    pub fn operation_name(&self, operation: &str) -> String {
        if operation.starts_with("projects/") {
            return operation.to_string();
        }
        format!(
            "projects/{}/locations/{}/operations/{operation}",
            self.project, self.location
        )
    }
}

impl FromStr for ClusterPath {
    type Err = Report<DriverError>;

    fn from_str(parent: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            Report::new(DriverError::InvalidParent {
                parent: parent.to_string(),
            })
        };
        let segments: Vec<&str> = parent.trim_matches('/').split('/').collect();
        let ["projects", project, "locations", location, "clusters", cluster] = segments[..]
        else {
            return Err(invalid());
        };
        if [project, location, cluster].iter().any(|s| s.is_empty()) {
            return Err(invalid());
        }
        Ok(Self {
            project: project.to_string(),
            location: location.to_string(),
            cluster: cluster.to_string(),
        })
    }
}

impl fmt::Display for ClusterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/locations/{}/clusters/{}",
            self.project, self.location, self.cluster
        )
    }
}
