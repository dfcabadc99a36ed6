//! Node pool scale-out.
//!
//! The [`ScaleOutDriver`] hands out a fresh node label per pod and grows the
//! reserved node pool by one node in the background. Once the resize
//! operation completes, the nodes that appeared are labeled so the pod's node
//! selector can match.

use core::error::Error;

mod cluster_path;
mod driver;
mod names;
mod traits;
mod types;

pub use cluster_path::ClusterPath;
pub use driver::ScaleOutConfig;
pub use driver::ScaleOutDriver;
pub use driver::ScaleOutHandle;
pub use driver::ScheduledPod;
pub use names::generate_name;
pub use traits::ClusterNodes;
pub use traits::NodePoolApi;
pub use types::diff_node_sets;
pub use types::ListNodePoolsResponse;
pub use types::NodeConfig;
pub use types::NodePool;
pub use types::Operation;
pub use types::OperationStatus;
pub use types::ScaleOutReport;

/// Errors raised by the scale-out driver.
#[derive(Debug, derive_more::Display)]
pub enum DriverError {
    #[display("invalid cluster parent {parent:?}, expected projects/*/locations/*/clusters/*")]
    InvalidParent { parent: String },
    #[display("no node pool with ipp-reserved metadata in {parent}")]
    NoEligibleNodePool { parent: String },
    #[display("failed to list node pools of {parent}")]
    ListNodePools { parent: String },
    #[display("failed to list nodes of node pool {node_pool}")]
    ListNodes { node_pool: String },
    #[display("failed to resize node pool {node_pool} to {node_count}")]
    Resize { node_pool: String, node_count: usize },
    #[display("operation {name} aborting: detail={detail:?}, status_message={status_message:?}")]
    OperationAborted {
        name: String,
        detail: String,
        status_message: String,
    },
    #[display("operation {name} did not complete within {timeout_secs}s")]
    OperationTimeout { name: String, timeout_secs: u64 },
    #[display("scale-out {name} cancelled")]
    Cancelled { name: String },
    #[display("failed to label node {node}")]
    LabelNode { node: String },
    #[display("scale-out task failed: {message}")]
    TaskFailed { message: String },
    #[display("scale-out driver is shutting down")]
    ShuttingDown,
}

impl Error for DriverError {}
