//! Placement strategies.
//!
//! A strategy answers two questions about a pod: should it be left alone, and
//! if not, which patch places it on a node of its own. Two strategies exist
//! and exactly one is active per process:
//!
//! - [`dynamic::DynamicProvisioning`]: opt-out. Every pod is in policy unless
//!   excluded; each one gets a fresh node label and the node pool grows by one.
//! - [`static_affinity::StaticAffinity`]: opt-in. Only pods carrying the class
//!   label are in policy; they get tolerations and affinity terms for a
//!   dedicated, autoscaled pool.

use api_types::AdmissionRequest;
use error_stack::Report;
use json_patch::Patch;
use k8s_openapi::api::core::v1::Pod;

use super::MutationError;

pub mod dynamic;
pub mod static_affinity;

pub(crate) const DAEMON_SET_KIND: &str = "DaemonSet";
pub(crate) const REPLICA_SET_KIND: &str = "ReplicaSet";

/// Why a pod was left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum IgnoreReason {
    #[display("dry run")]
    DryRun,
    #[display("system namespace")]
    SystemNamespace,
    #[display("ignore annotation")]
    IgnoreAnnotation,
    #[display("owned by DaemonSet")]
    DaemonSetOwned,
    #[display("already mutated")]
    AlreadyMutated,
    #[display("missing class label")]
    MissingClassLabel,
}

/// Per-pod placement decision
pub trait PlacementStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Returns the reason to leave `pod` alone, or `None` when it is in policy.
    fn ignore_reason(&self, request: &AdmissionRequest, pod: &Pod) -> Option<IgnoreReason>;

    /// Builds the placement patch for an in-policy pod.
    fn build_patch(&self, pod: &Pod) -> Result<Patch, Report<MutationError>>;
}

pub(crate) fn owner_uid<'a>(pod: &'a Pod, kind: &str) -> Option<&'a str> {
    pod.metadata
        .owner_references
        .as_ref()?
        .iter()
        .find(|owner| owner.kind == kind)
        .map(|owner| owner.uid.as_str())
}

pub(crate) fn is_owned_by(pod: &Pod, kind: &str) -> bool {
    owner_uid(pod, kind).is_some()
}

pub(crate) fn pod_label<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    pod.metadata.labels.as_ref()?.get(key).map(String::as_str)
}

pub(crate) fn pod_annotation<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    pod.metadata.annotations.as_ref()?.get(key).map(String::as_str)
}

pub(crate) fn has_labels(pod: &Pod) -> bool {
    pod.metadata.labels.is_some()
}

/// `namespace/name` for logs; pods created by controllers only carry a
/// generate-name at admission time.
pub(crate) fn pod_ref(pod: &Pod) -> String {
    let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
    let name = pod
        .metadata
        .name
        .as_deref()
        .or(pod.metadata.generate_name.as_deref())
        .unwrap_or_default();
    format!("{namespace}/{name}")
}
