//! Static affinity: route labeled pods to a dedicated, tainted node pool and
//! keep replicas apart with required anti-affinity.
//!
//! The cluster autoscaler only honors *required* anti-affinity when choosing
//! which node group to grow, so every term emitted here is required.

use api_types::AdmissionRequest;
use error_stack::Report;
use json_patch::Patch;
use k8s_openapi::api::core::v1::Affinity;
use k8s_openapi::api::core::v1::NodeAffinity;
use k8s_openapi::api::core::v1::NodeSelector;
use k8s_openapi::api::core::v1::NodeSelectorRequirement;
use k8s_openapi::api::core::v1::NodeSelectorTerm;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::core::v1::PodAffinityTerm;
use k8s_openapi::api::core::v1::PodAntiAffinity;
use k8s_openapi::api::core::v1::Toleration;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;

use super::is_owned_by;
use super::owner_uid;
use super::pod_label;
use super::IgnoreReason;
use super::PlacementStrategy;
use super::DAEMON_SET_KIND;
use super::REPLICA_SET_KIND;
use crate::domain::labels::LabelKeyValue;
use crate::domain::labels::HOSTNAME_TOPOLOGY_KEY;
use crate::domain::labels::REPLICA_SET_UID_LABEL_KEY;
use crate::domain::labels::TRUE;
use crate::domain::mutation::patch::PatchBuilder;
use crate::domain::mutation::MutationError;

const OPERATOR_IN: &str = "In";
const OPERATOR_EQUAL: &str = "Equal";
const EFFECT_NO_SCHEDULE: &str = "NoSchedule";

/// Keys the static strategy matches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAffinityConfig {
    /// Node label marking dedicated nodes, required to be `"true"`
    pub node_label_key: String,
    /// Taint carried by dedicated nodes, tolerated with value `"true"`
    pub node_taint_key: String,
    /// Pod label opting a pod in; its value names the exclusivity class
    pub class_label_key: String,
}

/// Opt-in strategy for a statically configured, autoscaled node pool
pub struct StaticAffinity {
    config: StaticAffinityConfig,
}

impl StaticAffinity {
    pub fn new(config: StaticAffinityConfig) -> Self {
        Self { config }
    }

    fn toleration(&self) -> Toleration {
        Toleration {
            key: Some(self.config.node_taint_key.clone()),
            operator: Some(OPERATOR_EQUAL.to_string()),
            value: Some(TRUE.to_string()),
            effect: Some(EFFECT_NO_SCHEDULE.to_string()),
            ..Default::default()
        }
    }

    fn affinity(&self, class: &str, replica_set_uid: Option<&str>) -> Affinity {
        let node_affinity = NodeAffinity {
            required_during_scheduling_ignored_during_execution: Some(NodeSelector {
                node_selector_terms: vec![NodeSelectorTerm {
                    match_expressions: Some(vec![NodeSelectorRequirement {
                        key: self.config.node_label_key.clone(),
                        operator: OPERATOR_IN.to_string(),
                        values: Some(vec![TRUE.to_string()]),
                    }]),
                    ..Default::default()
                }],
            }),
            ..Default::default()
        };

        let mut anti_affinity_terms = vec![host_exclusive_term(&self.config.class_label_key, class)];
        if let Some(uid) = replica_set_uid {
            anti_affinity_terms.push(host_exclusive_term(REPLICA_SET_UID_LABEL_KEY, uid));
        }

        Affinity {
            node_affinity: Some(node_affinity),
            pod_anti_affinity: Some(PodAntiAffinity {
                required_during_scheduling_ignored_during_execution: Some(anti_affinity_terms),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Required anti-affinity term keeping pods with `key=value` off the same host
fn host_exclusive_term(key: &str, value: &str) -> PodAffinityTerm {
    PodAffinityTerm {
        label_selector: Some(LabelSelector {
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: key.to_string(),
                operator: OPERATOR_IN.to_string(),
                values: Some(vec![value.to_string()]),
            }]),
            ..Default::default()
        }),
        topology_key: HOSTNAME_TOPOLOGY_KEY.to_string(),
        ..Default::default()
    }
}

impl PlacementStrategy for StaticAffinity {
    fn name(&self) -> &'static str {
        "static-affinity"
    }

    fn ignore_reason(&self, request: &AdmissionRequest, pod: &Pod) -> Option<IgnoreReason> {
        if request.is_dry_run() {
            return Some(IgnoreReason::DryRun);
        }
        if is_owned_by(pod, DAEMON_SET_KIND) {
            return Some(IgnoreReason::DaemonSetOwned);
        }
        if pod_label(pod, &self.config.class_label_key).is_none() {
            return Some(IgnoreReason::MissingClassLabel);
        }
        None
    }

    fn build_patch(&self, pod: &Pod) -> Result<Patch, Report<MutationError>> {
        let Some(class) = pod_label(pod, &self.config.class_label_key) else {
            return Ok(Patch(Vec::new()));
        };
        let replica_set_uid = owner_uid(pod, REPLICA_SET_KIND);

        let to_patch_error = |e: serde_json::Error| {
            Report::new(MutationError::PatchBuild {
                message: e.to_string(),
            })
        };
        let mut builder = PatchBuilder::new()
            .add_serialized("/spec/tolerations", &vec![self.toleration()])
            .map_err(to_patch_error)?
            .add_serialized("/spec/affinity", &self.affinity(class, replica_set_uid))
            .map_err(to_patch_error)?;

        if let Some(uid) = replica_set_uid {
            // the class label is present, so the label map exists
            builder = builder.add_label(true, &LabelKeyValue::new(REPLICA_SET_UID_LABEL_KEY, uid));
        }
        Ok(builder.build())
    }
}
