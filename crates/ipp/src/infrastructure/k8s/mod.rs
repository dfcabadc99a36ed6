//! Kubernetes API access: client construction and node operations.

pub mod nodes;
pub mod types;

pub use nodes::KubeNodes;
pub use types::KubernetesError;
