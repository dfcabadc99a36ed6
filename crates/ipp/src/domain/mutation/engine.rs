use std::sync::Arc;

use api_types::AdmissionRequest;
use api_types::AdmissionResponse;
use error_stack::Report;
use k8s_openapi::api::core::v1::Pod;
use tracing::error;
use tracing::info;

use super::strategy::PlacementStrategy;
use super::MutationError;

/// Turns an admission request into an admission response.
///
/// `None` means no response could be produced at all; the gateway answers it
/// with an internal error.
pub trait Mutator: Send + Sync {
    fn mutate(&self, request: &AdmissionRequest) -> Option<AdmissionResponse>;
}

/// Fail-open mutator driven by a [`PlacementStrategy`]
pub struct MutationEngine {
    strategy: Arc<dyn PlacementStrategy>,
}

impl MutationEngine {
    pub fn new(strategy: Arc<dyn PlacementStrategy>) -> Self {
        Self { strategy }
    }

    fn decode_pod(request: &AdmissionRequest) -> Result<Pod, Report<MutationError>> {
        let object = request.object.clone().unwrap_or_default();
        serde_json::from_value(object).map_err(|e| {
            Report::new(MutationError::PodDecode {
                message: e.to_string(),
            })
        })
    }

    fn patch_bytes(&self, pod: &Pod) -> Result<Option<Vec<u8>>, Report<MutationError>> {
        let patch = self.strategy.build_patch(pod)?;
        if patch.0.is_empty() {
            return Ok(None);
        }
        let bytes = serde_json::to_vec(&patch).map_err(|e| {
            Report::new(MutationError::PatchSerialize {
                message: e.to_string(),
            })
        })?;
        Ok(Some(bytes))
    }
}

/// Allowed response reporting `report` in its status
fn error_response(report: &Report<MutationError>) -> AdmissionResponse {
    error!("error while mutating: {report:?}");
    AdmissionResponse::allowed_with_message(report.current_context().to_string())
}

impl Mutator for MutationEngine {
    fn mutate(&self, request: &AdmissionRequest) -> Option<AdmissionResponse> {
        let pod = match Self::decode_pod(request) {
            Ok(pod) => pod,
            Err(report) => return Some(error_response(&report)),
        };

        let meta = &pod.metadata;
        let namespace = meta.namespace.as_deref().unwrap_or_default();
        let name = meta.name.as_deref().unwrap_or_default();
        let generate_name = meta.generate_name.as_deref().unwrap_or_default();
        let pod_uid = meta.uid.as_deref().unwrap_or_default();
        info!(
            strategy = self.strategy.name(),
            namespace, name, generate_name, pod_uid, "Mutating pod"
        );

        if let Some(reason) = self.strategy.ignore_reason(request, &pod) {
            info!(%reason, namespace, name, generate_name, pod_uid, "Ignoring pod");
            return Some(AdmissionResponse::allowed());
        }

        match self.patch_bytes(&pod) {
            Ok(None) => Some(AdmissionResponse::allowed()),
            Ok(Some(bytes)) => {
                info!(
                    namespace,
                    name,
                    patch = %String::from_utf8_lossy(&bytes),
                    "Patching pod"
                );
                Some(AdmissionResponse::allowed_with_patch(bytes))
            }
            Err(report) => Some(error_response(&report)),
        }
    }
}
