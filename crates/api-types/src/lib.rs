//! Shared API type definitions
//!
//! This crate contains the admission-review wire types exchanged between the
//! Kubernetes API server and the instance-per-pod mutating webhook. Only the
//! fields the webhook reads or writes are modelled; unknown fields are ignored
//! on input.

use serde::Deserialize;
use serde::Serialize;

/// API version used when the inbound review does not carry one
pub const DEFAULT_ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
/// Kind of the review envelope
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

/// Admission review envelope, used for both the request and the reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    /// Builds the reply envelope for `self`, echoing its type metadata and
    /// copying the request UID into `response`.
    pub fn reply(&self, mut response: AdmissionResponse) -> AdmissionReview {
        if let Some(request) = &self.request {
            response.uid = request.uid.clone();
        }
        AdmissionReview {
            api_version: Some(
                self.api_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ADMISSION_API_VERSION.to_string()),
            ),
            kind: Some(
                self.kind
                    .clone()
                    .unwrap_or_else(|| ADMISSION_REVIEW_KIND.to_string()),
            ),
            request: None,
            response: Some(response),
        }
    }
}

/// Group/version/kind triple of the reviewed object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

/// The request half of an admission review
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    /// Correlation identifier, copied verbatim into the response
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<GroupVersionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Raw object under review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl AdmissionRequest {
    pub fn is_dry_run(&self) -> bool {
        self.dry_run.unwrap_or(false)
    }
}

/// Patch encodings understood by the API server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    JsonPatch,
}

/// Status attached to a response, used to surface error text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// The response half of an admission review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// JSON Patch document, base64 encoded on the wire
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub patch: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,
}

impl AdmissionResponse {
    /// Allowed response without a patch
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            ..Default::default()
        }
    }

    /// Allowed response carrying `message` in its status
    pub fn allowed_with_message(message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            status: Some(Status {
                message: message.into(),
            }),
            ..Default::default()
        }
    }

    /// Allowed response carrying a serialized JSON Patch
    pub fn allowed_with_patch(patch: Vec<u8>) -> Self {
        Self {
            allowed: true,
            patch: Some(patch),
            patch_type: Some(PatchType::JsonPatch),
            ..Default::default()
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Option::<String>::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_v1_review() {
        let json = r#"{
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": {"group": "", "version": "v1", "kind": "Pod"},
                "resource": {"group": "", "version": "v1", "resource": "pods"},
                "namespace": "default",
                "operation": "CREATE",
                "userInfo": {"username": "admin"},
                "object": {"metadata": {"name": "web-0"}},
                "dryRun": true
            }
        }"#;

        let review: AdmissionReview =
            serde_json::from_str(json).expect("should decode admission review");
        let request = review.request.expect("request should be present");

        assert_eq!(request.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(request.namespace.as_deref(), Some("default"));
        assert!(request.is_dry_run());
        assert_eq!(
            request.kind.map(|k| k.kind),
            Some("Pod".to_string()),
            "kind should be decoded"
        );
    }

    #[test]
    fn missing_dry_run_is_not_dry_run() {
        let request: AdmissionRequest =
            serde_json::from_str(r#"{"uid": "abc"}"#).expect("should decode request");
        assert!(!request.is_dry_run());
        assert!(request.object.is_none());
    }

    #[test]
    fn reply_copies_uid_and_type_meta() {
        let review = AdmissionReview {
            api_version: Some("admission.k8s.io/v1beta1".to_string()),
            kind: None,
            request: Some(AdmissionRequest {
                uid: "req-1".to_string(),
                ..Default::default()
            }),
            response: None,
        };

        let reply = review.reply(AdmissionResponse::allowed());

        assert_eq!(reply.api_version.as_deref(), Some("admission.k8s.io/v1beta1"));
        assert_eq!(reply.kind.as_deref(), Some(ADMISSION_REVIEW_KIND));
        assert!(reply.request.is_none());
        let response = reply.response.expect("response should be set");
        assert_eq!(response.uid, "req-1");
        assert!(response.allowed);
    }

    #[test]
    fn patch_is_base64_encoded_on_the_wire() {
        let response = AdmissionResponse::allowed_with_patch(b"[]".to_vec());
        let value = serde_json::to_value(&response).expect("should serialize");

        assert_eq!(value["patch"], "W10=");
        assert_eq!(value["patchType"], "JSONPatch");
        assert_eq!(value["allowed"], true);

        let decoded: AdmissionResponse =
            serde_json::from_value(value).expect("should deserialize");
        assert_eq!(decoded.patch.as_deref(), Some(&b"[]"[..]));
    }

    #[test]
    fn allowed_response_omits_patch_fields() {
        let value = serde_json::to_value(AdmissionResponse::allowed()).expect("should serialize");
        let object = value.as_object().expect("response should be an object");

        assert!(!object.contains_key("patch"));
        assert!(!object.contains_key("patchType"));
        assert!(!object.contains_key("status"));
    }

    #[test]
    fn message_is_carried_in_status() {
        let value = serde_json::to_value(AdmissionResponse::allowed_with_message("boom"))
            .expect("should serialize");
        assert_eq!(value["status"]["message"], "boom");
        assert_eq!(value["allowed"], true);
    }
}
