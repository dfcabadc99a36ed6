use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::api::PatchParams;
use kube::Api;
use kube::Client;
use tracing::debug;

use super::types::KubernetesError;
use crate::domain::scale_out::ClusterNodes;

/// Cluster nodes reached through the Kubernetes API
#[derive(Clone)]
pub struct KubeNodes {
    api: Api<Node>,
}

impl KubeNodes {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl ClusterNodes for KubeNodes {
    async fn list_node_names(
        &self,
        label_selector: &str,
    ) -> Result<Vec<String>, Report<KubernetesError>> {
        let nodes = self
            .api
            .list(&ListParams::default().labels(label_selector))
            .await
            .change_context_lazy(|| KubernetesError::ListFailed {
                selector: label_selector.to_string(),
            })?;
        let names: Vec<String> = nodes
            .items
            .into_iter()
            .filter_map(|node| node.metadata.name)
            .collect();
        debug!(label_selector, count = names.len(), "Listed nodes");
        Ok(names)
    }

    async fn patch_node(
        &self,
        name: &str,
        patch: json_patch::Patch,
    ) -> Result<(), Report<KubernetesError>> {
        self.api
            .patch(
                name,
                &PatchParams::default(),
                &kube::api::Patch::Json::<()>(patch),
            )
            .await
            .change_context_lazy(|| KubernetesError::PatchFailed {
                name: name.to_string(),
            })?;
        Ok(())
    }
}
