//! Dynamic provisioning: one freshly labeled node per pod.

use std::collections::BTreeMap;
use std::sync::Arc;

use api_types::AdmissionRequest;
use error_stack::Report;
use error_stack::ResultExt;
use json_patch::Patch;
use k8s_openapi::api::core::v1::Pod;

use super::has_labels;
use super::is_owned_by;
use super::pod_annotation;
use super::pod_label;
use super::pod_ref;
use super::IgnoreReason;
use super::PlacementStrategy;
use super::DAEMON_SET_KIND;
use crate::domain::labels::LabelKeyValue;
use crate::domain::labels::IGNORE_ANNOTATION_KEY;
use crate::domain::labels::MUTATED_LABEL_KEY;
use crate::domain::labels::SYSTEM_NAMESPACE_SUFFIX;
use crate::domain::labels::TRUE;
use crate::domain::mutation::patch::PatchBuilder;
use crate::domain::mutation::MutationError;
use crate::domain::scale_out::DriverError;

/// Reserves a node for a pod.
///
/// Implementations return the label the reserved node will carry without
/// waiting for the node to exist.
pub trait PodScheduler: Send + Sync {
    fn schedule(&self, pod: &Pod) -> Result<LabelKeyValue, Report<DriverError>>;
}

/// Opt-out strategy backed by on-demand node pool growth
pub struct DynamicProvisioning {
    scheduler: Arc<dyn PodScheduler>,
}

impl DynamicProvisioning {
    pub fn new(scheduler: Arc<dyn PodScheduler>) -> Self {
        Self { scheduler }
    }
}

impl PlacementStrategy for DynamicProvisioning {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn ignore_reason(&self, request: &AdmissionRequest, pod: &Pod) -> Option<IgnoreReason> {
        if request.is_dry_run() {
            return Some(IgnoreReason::DryRun);
        }
        let namespace = pod
            .metadata
            .namespace
            .as_deref()
            .or(request.namespace.as_deref())
            .unwrap_or_default();
        if namespace.ends_with(SYSTEM_NAMESPACE_SUFFIX) {
            return Some(IgnoreReason::SystemNamespace);
        }
        if pod_annotation(pod, IGNORE_ANNOTATION_KEY) == Some(TRUE) {
            return Some(IgnoreReason::IgnoreAnnotation);
        }
        if is_owned_by(pod, DAEMON_SET_KIND) {
            return Some(IgnoreReason::DaemonSetOwned);
        }
        if pod_label(pod, MUTATED_LABEL_KEY) == Some(TRUE) {
            return Some(IgnoreReason::AlreadyMutated);
        }
        None
    }

    fn build_patch(&self, pod: &Pod) -> Result<Patch, Report<MutationError>> {
        let node_label = self
            .scheduler
            .schedule(pod)
            .change_context_lazy(|| MutationError::Schedule { pod: pod_ref(pod) })?;

        let node_selector = BTreeMap::from([(node_label.key, node_label.value)]);
        let patch = PatchBuilder::new()
            .add_serialized("/spec/nodeSelector", &node_selector)
            .map_err(|e| {
                Report::new(MutationError::PatchBuild {
                    message: e.to_string(),
                })
            })?
            .add_label(has_labels(pod), &LabelKeyValue::new(MUTATED_LABEL_KEY, TRUE))
            .build();
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::domain::labels::NODE_LABEL_KEY;
    use crate::domain::mutation::strategy::test_pods::*;

    #[derive(Default)]
    struct RecordingScheduler {
        scheduled: Mutex<Vec<String>>,
        fail: bool,
    }

    impl PodScheduler for RecordingScheduler {
        fn schedule(&self, pod: &Pod) -> Result<LabelKeyValue, Report<DriverError>> {
            if self.fail {
                return Err(Report::new(DriverError::NoEligibleNodePool {
                    parent: "projects/p/locations/l/clusters/c".to_string(),
                }));
            }
            self.scheduled.lock().unwrap().push(pod_ref(pod));
            Ok(LabelKeyValue::new(NODE_LABEL_KEY, "ipp-x7k2q"))
        }
    }

    fn strategy(scheduler: Arc<RecordingScheduler>) -> DynamicProvisioning {
        DynamicProvisioning::new(scheduler)
    }

    fn request() -> AdmissionRequest {
        AdmissionRequest {
            uid: "uid-1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn ignores_dry_run() {
        let strategy = strategy(Arc::default());
        let request = AdmissionRequest {
            dry_run: Some(true),
            ..request()
        };

        assert_eq!(
            strategy.ignore_reason(&request, &pod("default", "web-0")),
            Some(IgnoreReason::DryRun)
        );
    }

    #[test]
    fn ignores_system_namespaces() {
        let strategy = strategy(Arc::default());

        assert_eq!(
            strategy.ignore_reason(&request(), &pod("kube-system", "dns-0")),
            Some(IgnoreReason::SystemNamespace)
        );
    }

    #[test]
    fn system_namespace_falls_back_to_request_namespace() {
        let strategy = strategy(Arc::default());
        let mut pod = pod("", "dns-0");
        pod.metadata.namespace = None;
        let request = AdmissionRequest {
            namespace: Some("gke-system".to_string()),
            ..request()
        };

        assert_eq!(
            strategy.ignore_reason(&request, &pod),
            Some(IgnoreReason::SystemNamespace)
        );
    }

    #[test]
    fn ignore_annotation_must_be_true() {
        let strategy = strategy(Arc::default());
        let opted_out = with_annotation(pod("default", "a"), IGNORE_ANNOTATION_KEY, "true");
        let not_opted_out = with_annotation(pod("default", "b"), IGNORE_ANNOTATION_KEY, "false");

        assert_eq!(
            strategy.ignore_reason(&request(), &opted_out),
            Some(IgnoreReason::IgnoreAnnotation)
        );
        assert_eq!(strategy.ignore_reason(&request(), &not_opted_out), None);
    }

    #[test]
    fn ignores_daemon_set_pods() {
        let strategy = strategy(Arc::default());
        let pod = with_owner(pod("default", "agent-x"), DAEMON_SET_KIND, "ds-1");

        assert_eq!(
            strategy.ignore_reason(&request(), &pod),
            Some(IgnoreReason::DaemonSetOwned)
        );
    }

    #[test]
    fn ignores_already_mutated_pods() {
        let strategy = strategy(Arc::default());
        let pod = with_label(pod("default", "web-0"), MUTATED_LABEL_KEY, "true");

        assert_eq!(
            strategy.ignore_reason(&request(), &pod),
            Some(IgnoreReason::AlreadyMutated)
        );
    }

    #[test]
    fn patch_binds_pod_to_reserved_node() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let strategy = strategy(scheduler.clone());
        let pod = with_label(pod("default", "web-0"), "app", "web");

        let patch = strategy.build_patch(&pod).expect("patch should be built");

        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([
                {
                    "op": "add",
                    "path": "/spec/nodeSelector",
                    "value": {"instance-per-pod.io/node": "ipp-x7k2q"}
                },
                {
                    "op": "add",
                    "path": "/metadata/labels/instance-per-pod.io~1mutated",
                    "value": "true"
                }
            ])
        );
        assert_eq!(*scheduler.scheduled.lock().unwrap(), vec!["default/web-0".to_string()]);
    }

    #[test]
    fn patch_adds_label_map_for_unlabeled_pod() {
        let strategy = strategy(Arc::default());

        let patch = strategy
            .build_patch(&pod("default", "web-0"))
            .expect("patch should be built");

        assert_eq!(
            serde_json::to_value(&patch).unwrap()[1],
            json!({
                "op": "add",
                "path": "/metadata/labels",
                "value": {"instance-per-pod.io/mutated": "true"}
            })
        );
    }

    #[test]
    fn scheduling_failure_is_reported() {
        let strategy = strategy(Arc::new(RecordingScheduler {
            fail: true,
            ..Default::default()
        }));

        let report = strategy
            .build_patch(&pod("default", "web-0"))
            .expect_err("scheduling should fail");

        assert!(matches!(
            report.current_context(),
            MutationError::Schedule { pod } if pod == "default/web-0"
        ));
    }
}
