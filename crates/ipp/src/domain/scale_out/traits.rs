use async_trait::async_trait;
use error_stack::Report;
use json_patch::Patch;

use super::types::NodePool;
use super::types::Operation;
use crate::infrastructure::gke::CloudError;
use crate::infrastructure::k8s::KubernetesError;

/// Cloud node pool management API
#[async_trait]
pub trait NodePoolApi: Send + Sync {
    /// Lists the node pools of the cluster `parent`.
    async fn list_node_pools(&self, parent: &str) -> Result<Vec<NodePool>, Report<CloudError>>;

    /// Requests `node_pool` (fully qualified) to be resized to `node_count`.
    async fn set_node_pool_size(
        &self,
        node_pool: &str,
        node_count: usize,
    ) -> Result<Operation, Report<CloudError>>;

    /// Fetches the operation `name` (fully qualified).
    async fn get_operation(&self, name: &str) -> Result<Operation, Report<CloudError>>;
}

/// Node access through the cluster API
#[async_trait]
pub trait ClusterNodes: Send + Sync {
    /// Names of the nodes matching `label_selector`
    async fn list_node_names(&self, label_selector: &str)
        -> Result<Vec<String>, Report<KubernetesError>>;

    /// Applies a JSON Patch to the node `name`.
    async fn patch_node(&self, name: &str, patch: Patch) -> Result<(), Report<KubernetesError>>;
}
