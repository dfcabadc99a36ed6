use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::domain::labels::NODE_POOL_RESERVED_METADATA_KEY;
use crate::domain::labels::TRUE;

/// Node pool as returned by the GKE API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<NodeConfig>,
    #[serde(default)]
    pub initial_node_count: i32,
}

impl NodePool {
    /// Whether the pool is reserved for instance-per-pod scale-out
    pub fn is_reserved(&self) -> bool {
        self.config
            .as_ref()
            .and_then(|config| config.metadata.get(NODE_POOL_RESERVED_METADATA_KEY))
            .is_some_and(|value| value == TRUE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNodePoolsResponse {
    #[serde(default)]
    pub node_pools: Vec<NodePool>,
}

/// Long-running GKE operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub status_message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
    Aborting,
    #[default]
    #[serde(other)]
    StatusUnspecified,
}

/// Outcome of one completed scale-out sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleOutReport {
    pub node_pool: String,
    pub previous_node_count: usize,
    pub requested_node_count: usize,
    /// Nodes that appeared during the resize and were labeled
    pub labeled_nodes: Vec<String>,
}

impl fmt::Display for ScaleOutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node pool {} resized {}->{}, labeled {:?}",
            self.node_pool, self.previous_node_count, self.requested_node_count, self.labeled_nodes
        )
    }
}

/// Names in `after` that are missing from `before`, in `after` order
pub fn diff_node_sets(before: &[String], after: &[String]) -> Vec<String> {
    let before: HashSet<&str> = before.iter().map(String::as_str).collect();
    after
        .iter()
        .filter(|name| !before.contains(name.as_str()))
        .cloned()
        .collect()
}
