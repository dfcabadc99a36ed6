use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Pod;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::cluster_path::ClusterPath;
use super::names::generate_name;
use super::traits::ClusterNodes;
use super::traits::NodePoolApi;
use super::types::diff_node_sets;
use super::types::NodePool;
use super::types::Operation;
use super::types::OperationStatus;
use super::types::ScaleOutReport;
use super::DriverError;
use crate::domain::labels::LabelKeyValue;
use crate::domain::labels::GKE_NODE_POOL_LABEL_KEY;
use crate::domain::labels::NODE_LABEL_KEY;
use crate::domain::labels::NODE_LABEL_VALUE_PREFIX;
use crate::domain::mutation::patch::label_patch;
use crate::domain::mutation::strategy::pod_ref;
use crate::domain::mutation::PodScheduler;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Scale-out driver settings
#[derive(Debug, Clone)]
pub struct ScaleOutConfig {
    pub parent: ClusterPath,
    /// Delay between two operation status fetches
    pub poll_interval: Duration,
    /// Upper bound for one resize operation
    pub operation_timeout: Duration,
    /// Nodes added per scheduled pod
    pub delta: usize,
}

impl ScaleOutConfig {
    pub fn new(parent: ClusterPath) -> Self {
        Self {
            parent,
            poll_interval: DEFAULT_POLL_INTERVAL,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            delta: 1,
        }
    }
}

/// Label reserved for a pod, plus the background scale-out backing it
#[derive(Debug)]
pub struct ScheduledPod {
    pub label: LabelKeyValue,
    pub node_pool: String,
    pub scale_out: ScaleOutHandle,
}

/// Awaitable outcome of a background scale-out.
///
/// Dropping the handle detaches the task; it still runs to completion and
/// logs its outcome.
#[derive(Debug)]
pub struct ScaleOutHandle {
    handle: JoinHandle<Result<ScaleOutReport, Report<DriverError>>>,
}

impl ScaleOutHandle {
    pub async fn wait(self) -> Result<ScaleOutReport, Report<DriverError>> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(Report::new(DriverError::TaskFailed {
                message: e.to_string(),
            })),
        }
    }
}

/// Grows a reserved GKE node pool on demand, one sequence at a time.
///
/// Cloud API calls are serialized by the client lock. Whole scale-out
/// sequences (list, resize, wait, re-list, label) are serialized by a second,
/// independent lock, so at most one resize is in flight per driver.
#[derive(Clone)]
pub struct ScaleOutDriver {
    inner: Arc<DriverInner>,
}

struct DriverInner {
    config: ScaleOutConfig,
    cloud: Mutex<Arc<dyn NodePoolApi>>,
    nodes: Arc<dyn ClusterNodes>,
    /// Reserved pools, discovered once at start
    node_pools: Vec<String>,
    extend_lock: Mutex<()>,
    tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl ScaleOutDriver {
    /// Discovers the reserved node pools of the cluster and returns a driver
    /// ready to schedule pods.
    pub async fn start(
        config: ScaleOutConfig,
        cloud: Arc<dyn NodePoolApi>,
        nodes: Arc<dyn ClusterNodes>,
    ) -> Result<Self, Report<DriverError>> {
        let parent = config.parent.to_string();
        info!(parent, "Getting node pools");
        let pools = cloud
            .list_node_pools(&parent)
            .await
            .change_context_lazy(|| DriverError::ListNodePools {
                parent: parent.clone(),
            })?;

        let node_pools: Vec<String> = pools
            .into_iter()
            .filter(NodePool::is_reserved)
            .map(|pool| {
                info!(node_pool = %pool.name, "Found node pool with ipp-reserved metadata");
                pool.name
            })
            .collect();
        if node_pools.is_empty() {
            warn!(parent, "No node pool with ipp-reserved metadata, pods cannot be scheduled");
        }

        Ok(Self {
            inner: Arc::new(DriverInner {
                config,
                cloud: Mutex::new(cloud),
                nodes,
                node_pools,
                extend_lock: Mutex::new(()),
                tracker: TaskTracker::new(),
                cancellation_token: CancellationToken::new(),
            }),
        })
    }

    pub fn node_pools(&self) -> &[String] {
        &self.inner.node_pools
    }

    /// Reserves a unique node label for `pod` and grows the node pool in the
    /// background.
    ///
    /// Returns as soon as the label is generated; the returned handle
    /// resolves once the new node is labeled.
    pub fn schedule_pod(&self, pod: &Pod) -> Result<ScheduledPod, Report<DriverError>> {
        let label = LabelKeyValue::new(NODE_LABEL_KEY, generate_name(NODE_LABEL_VALUE_PREFIX));
        let node_pool = self.choose_node_pool()?;
        if self.inner.tracker.is_closed() {
            return Err(Report::new(DriverError::ShuttingDown));
        }
        info!(pod = pod_ref(pod), %label, node_pool, "Scheduling pod");

        let inner = self.inner.clone();
        let task_pool = node_pool.clone();
        let task_label = label.clone();
        let handle = self.inner.tracker.spawn(async move {
            let result = inner.serialized_extend(&task_pool, &task_label).await;
            match &result {
                Ok(report) => info!(%report, "Scale-out completed"),
                Err(e) => error!("Scale-out for label {task_label} failed: {e:?}"),
            }
            result
        });

        Ok(ScheduledPod {
            label,
            node_pool,
            scale_out: ScaleOutHandle { handle },
        })
    }

    fn choose_node_pool(&self) -> Result<String, Report<DriverError>> {
        let pools = &self.inner.node_pools;
        if pools.len() != 1 {
            warn!(
                count = pools.len(),
                "Only a single node pool is supported, using the first one"
            );
        }
        pools.first().cloned().ok_or_else(|| {
            Report::new(DriverError::NoEligibleNodePool {
                parent: self.inner.config.parent.to_string(),
            })
        })
    }

    /// Stops accepting pods, cancels in-flight operation polling and waits
    /// for background tasks to finish.
    pub async fn shutdown(&self) {
        info!("Shutting down scale-out driver");
        self.inner.tracker.close();
        self.inner.cancellation_token.cancel();
        self.inner.tracker.wait().await;
        info!("Scale-out driver stopped");
    }
}

impl PodScheduler for ScaleOutDriver {
    fn schedule(&self, pod: &Pod) -> Result<LabelKeyValue, Report<DriverError>> {
        self.schedule_pod(pod).map(|scheduled| scheduled.label)
    }
}

impl DriverInner {
    async fn serialized_extend(
        &self,
        node_pool: &str,
        label: &LabelKeyValue,
    ) -> Result<ScaleOutReport, Report<DriverError>> {
        let _guard = tokio::select! {
            guard = self.extend_lock.lock() => guard,
            _ = self.cancellation_token.cancelled() => {
                return Err(Report::new(DriverError::Cancelled {
                    name: node_pool.to_string(),
                }));
            }
        };
        self.extend_node_pool(node_pool, label).await
    }

    async fn extend_node_pool(
        &self,
        node_pool: &str,
        label: &LabelKeyValue,
    ) -> Result<ScaleOutReport, Report<DriverError>> {
        let delta = self.config.delta;
        let before = self.node_names(node_pool).await?;
        let node_count = before.len() + delta;
        info!(node_pool, from = before.len(), to = node_count, "Resizing node pool");

        let pool_name = self.config.parent.node_pool_name(node_pool);
        let operation = {
            let cloud = self.cloud.lock().await;
            cloud.set_node_pool_size(&pool_name, node_count).await
        }
        .change_context_lazy(|| DriverError::Resize {
            node_pool: pool_name.clone(),
            node_count,
        })?;

        self.wait_operation(operation).await?;
        info!(node_pool, "Node pool resize operation done");

        let after = self.node_names(node_pool).await?;
        let new_nodes = diff_node_sets(&before, &after);
        if new_nodes.len() != delta {
            warn!(
                node_pool,
                expected = delta,
                found = new_nodes.len(),
                "Unexpected number of new nodes"
            );
        }

        info!(%label, ?new_nodes, "Adding label to new nodes");
        for node in &new_nodes {
            self.nodes
                .patch_node(node, label_patch(label))
                .await
                .change_context_lazy(|| DriverError::LabelNode { node: node.clone() })?;
        }

        Ok(ScaleOutReport {
            node_pool: node_pool.to_string(),
            previous_node_count: before.len(),
            requested_node_count: node_count,
            labeled_nodes: new_nodes,
        })
    }

    async fn node_names(&self, node_pool: &str) -> Result<Vec<String>, Report<DriverError>> {
        let selector = format!("{GKE_NODE_POOL_LABEL_KEY}={node_pool}");
        self.nodes
            .list_node_names(&selector)
            .await
            .change_context_lazy(|| DriverError::ListNodes {
                node_pool: node_pool.to_string(),
            })
    }

    async fn wait_operation(&self, operation: Operation) -> Result<(), Report<DriverError>> {
        let name = self.config.parent.operation_name(&operation.name);
        let timeout = self.config.operation_timeout;
        match tokio::time::timeout(timeout, self.poll_operation(&name, operation)).await {
            Ok(result) => result,
            Err(_) => Err(Report::new(DriverError::OperationTimeout {
                name,
                timeout_secs: timeout.as_secs(),
            })),
        }
    }

    /// Polls until the operation is done or aborting. A failed fetch is
    /// logged and retried at the next tick.
    async fn poll_operation(
        &self,
        name: &str,
        operation: Operation,
    ) -> Result<(), Report<DriverError>> {
        let mut current = Some(operation);
        loop {
            if let Some(operation) = &current {
                match operation.status {
                    OperationStatus::Done => return Ok(()),
                    OperationStatus::Aborting => {
                        return Err(Report::new(DriverError::OperationAborted {
                            name: name.to_string(),
                            detail: operation.detail.clone(),
                            status_message: operation.status_message.clone(),
                        }));
                    }
                    status => debug!(name, ?status, "Waiting for operation"),
                }
            }

            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    return Err(Report::new(DriverError::Cancelled {
                        name: name.to_string(),
                    }));
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            let fetched = {
                let cloud = self.cloud.lock().await;
                cloud.get_operation(name).await
            };
            current = match fetched {
                Ok(operation) => Some(operation),
                Err(e) => {
                    error!(name, "Failed to get operation: {e:?}");
                    None
                }
            };
        }
    }
}
