use std::sync::Arc;

use api_types::AdmissionReview;
use error_stack::Report;
use error_stack::ResultExt;
use poem::handler;
use poem::http::header;
use poem::http::Method;
use poem::http::StatusCode;
use poem::web::Data;
use poem::Body;
use poem::Request;
use poem::Response;
use tokio::io::AsyncReadExt;
use tracing::debug;
use tracing::warn;

use super::errors::GatewayError;
use crate::domain::mutation::Mutator;

pub const ADMISSION_PATH: &str = "/admission";
pub const HEALTHZ_PATH: &str = "/healthz";
/// Upper bound for an admission review body
pub const MAX_BODY_BYTES: usize = 4 << 20;

const APPLICATION_JSON: &str = "application/json";

/// Serves the admission review endpoint
#[handler]
pub async fn admission_review(
    req: &Request,
    body: Body,
    mutator: Data<&Arc<dyn Mutator>>,
) -> Response {
    let result = match validate_request(req) {
        Ok(()) => match read_body(body, MAX_BODY_BYTES).await {
            Ok(bytes) => review(mutator.0.as_ref(), &bytes),
            Err(report) => Err(report),
        },
        Err(report) => Err(report),
    };

    match result {
        Ok(bytes) => Response::builder()
            .status(StatusCode::OK)
            .content_type(APPLICATION_JSON)
            .body(bytes),
        Err(report) => {
            let error = report.current_context();
            warn!("Rejecting admission request: {report:?}");
            Response::builder()
                .status(error.status_code())
                .body(error.to_string())
        }
    }
}

/// Liveness probe
#[handler]
pub async fn healthz() -> &'static str {
    "ok"
}

/// Checks method and content type before the body is read.
pub fn validate_request(req: &Request) -> Result<(), Report<GatewayError>> {
    if req.method() != Method::POST {
        return Err(Report::new(GatewayError::MethodNotAllowed {
            method: req.method().to_string(),
        }));
    }
    let content_type = req.header(header::CONTENT_TYPE).unwrap_or_default();
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case(APPLICATION_JSON) {
        return Err(Report::new(GatewayError::UnsupportedContentType {
            content_type: content_type.to_string(),
        }));
    }
    Ok(())
}

/// Reads at most `limit` bytes; anything longer is rejected.
pub async fn read_body(body: Body, limit: usize) -> Result<Vec<u8>, Report<GatewayError>> {
    let mut bytes = Vec::new();
    body.into_async_read()
        .take(limit as u64 + 1)
        .read_to_end(&mut bytes)
        .await
        .change_context(GatewayError::ReadBody)?;
    if bytes.len() > limit {
        return Err(Report::new(GatewayError::BodyTooLarge { limit }));
    }
    Ok(bytes)
}

/// Decodes an admission review, runs `mutator` on its request and encodes
/// the reply.
pub fn review(mutator: &dyn Mutator, body: &[u8]) -> Result<Vec<u8>, Report<GatewayError>> {
    if body.is_empty() {
        return Err(Report::new(GatewayError::EmptyBody));
    }
    let review: AdmissionReview = serde_json::from_slice(body).map_err(|e| {
        Report::new(GatewayError::Decode {
            message: e.to_string(),
        })
    })?;
    let request = review
        .request
        .as_ref()
        .ok_or_else(|| Report::new(GatewayError::MissingRequest))?;
    debug!(uid = %request.uid, "Reviewing admission request");

    let response = mutator
        .mutate(request)
        .ok_or_else(|| Report::new(GatewayError::NilResponse))?;
    serde_json::to_vec(&review.reply(response)).change_context(GatewayError::Encode)
}

#[cfg(test)]
mod tests {
    use api_types::AdmissionRequest;
    use api_types::AdmissionResponse;
    use serde_json::json;
    use serde_json::Value;

    use super::*;

    struct AllowAll;

    impl Mutator for AllowAll {
        fn mutate(&self, _request: &AdmissionRequest) -> Option<AdmissionResponse> {
            Some(AdmissionResponse::allowed())
        }
    }

    fn post(content_type: &str) -> Request {
        Request::builder()
            .method(Method::POST)
            .header(header::CONTENT_TYPE, content_type)
            .finish()
    }

    #[test]
    fn json_with_parameters_is_accepted() {
        assert!(validate_request(&post("application/json")).is_ok());
        assert!(validate_request(&post("Application/JSON; charset=utf-8")).is_ok());
    }

    #[test]
    fn other_content_types_are_rejected() {
        let report = validate_request(&post("text/plain")).expect_err("should be rejected");

        assert!(matches!(
            report.current_context(),
            GatewayError::UnsupportedContentType { content_type } if content_type == "text/plain"
        ));
    }

    #[test]
    fn non_post_is_rejected() {
        let request = Request::builder()
            .method(Method::GET)
            .header(header::CONTENT_TYPE, APPLICATION_JSON)
            .finish();

        let report = validate_request(&request).expect_err("should be rejected");

        assert!(matches!(
            report.current_context(),
            GatewayError::MethodNotAllowed { .. }
        ));
    }

    #[tokio::test]
    async fn body_at_limit_is_read() {
        let bytes = read_body(Body::from(vec![b'x'; 16]), 16)
            .await
            .expect("body should be read");

        assert_eq!(bytes.len(), 16);
    }

    #[tokio::test]
    async fn body_over_limit_is_rejected() {
        let report = read_body(Body::from(vec![b'x'; 17]), 16)
            .await
            .expect_err("body should be rejected");

        assert!(matches!(
            report.current_context(),
            GatewayError::BodyTooLarge { limit: 16 }
        ));
    }

    #[test]
    fn review_echoes_uid() {
        let body = json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {"uid": "abc", "object": {}}
        });

        let reply = review(&AllowAll, body.to_string().as_bytes()).expect("review should succeed");

        let reply: Value = serde_json::from_slice(&reply).expect("reply should be JSON");
        assert_eq!(reply["response"]["uid"], "abc");
        assert_eq!(reply["response"]["allowed"], true);
        assert_eq!(reply["kind"], "AdmissionReview");
    }

    #[test]
    fn empty_and_malformed_bodies_are_rejected() {
        let empty = review(&AllowAll, b"").expect_err("empty body should fail");
        let malformed = review(&AllowAll, b"{not json").expect_err("malformed body should fail");
        let missing = review(&AllowAll, br#"{"kind": "AdmissionReview"}"#)
            .expect_err("missing request should fail");

        assert!(matches!(empty.current_context(), GatewayError::EmptyBody));
        assert!(matches!(malformed.current_context(), GatewayError::Decode { .. }));
        assert!(matches!(missing.current_context(), GatewayError::MissingRequest));
    }
}
