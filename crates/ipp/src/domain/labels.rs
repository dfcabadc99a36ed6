//! Well-known label, annotation and metadata keys.

use std::fmt;

/// Node label key that binds a dynamically provisioned pod to its node
pub const NODE_LABEL_KEY: &str = "instance-per-pod.io/node";
/// Prefix of generated node label values
pub const NODE_LABEL_VALUE_PREFIX: &str = "ipp-";
/// Marker label stamped on pods mutated by the dynamic strategy
pub const MUTATED_LABEL_KEY: &str = "instance-per-pod.io/mutated";
/// Pod annotation opting a pod out of the dynamic strategy
pub const IGNORE_ANNOTATION_KEY: &str = "instance-per-pod.io/ignore";
/// Pod label grouping replicas of one ReplicaSet
pub const REPLICA_SET_UID_LABEL_KEY: &str = "ipp-rs-uid";
/// Topology domain used for anti-affinity terms
pub const HOSTNAME_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";
/// Namespaces with this suffix are never mutated by the dynamic strategy
pub const SYSTEM_NAMESPACE_SUFFIX: &str = "-system";

/// Node label carrying the GKE node pool name
pub const GKE_NODE_POOL_LABEL_KEY: &str = "cloud.google.com/gke-nodepool";
/// Node pool config metadata key marking a pool as eligible for scale-out
pub const NODE_POOL_RESERVED_METADATA_KEY: &str = "ipp-reserved";

pub const TRUE: &str = "true";

/// A label key and value pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelKeyValue {
    pub key: String,
    pub value: String,
}

impl LabelKeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for LabelKeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
