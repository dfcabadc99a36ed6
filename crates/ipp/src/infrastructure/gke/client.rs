use std::time::Duration;

use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::token::TokenSource;
use super::CloudError;
use crate::domain::scale_out::ListNodePoolsResponse;
use crate::domain::scale_out::NodePool;
use crate::domain::scale_out::NodePoolApi;
use crate::domain::scale_out::Operation;

pub const DEFAULT_GKE_ENDPOINT: &str = "https://container.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetNodePoolSizeRequest {
    node_count: usize,
}

/// Node pool API over the GKE REST interface
pub struct GkeClient {
    http: reqwest::Client,
    endpoint: String,
    tokens: TokenSource,
}

impl GkeClient {
    pub fn new(endpoint: &str, tokens: TokenSource) -> Result<Self, Report<CloudError>> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .change_context(CloudError::ClientBuild)?;
        Ok(Self::with_http_client(http, endpoint, tokens))
    }

    pub fn with_http_client(http: reqwest::Client, endpoint: &str, tokens: TokenSource) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/v1/{resource}", self.endpoint)
    }

    async fn get<T: DeserializeOwned>(&self, resource: &str) -> Result<T, Report<CloudError>> {
        let url = self.url(resource);
        self.send(self.http.get(&url), url).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        resource: &str,
        body: &B,
    ) -> Result<T, Report<CloudError>> {
        let url = self.url(resource);
        self.send(self.http.post(&url).json(body), url).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: String,
    ) -> Result<T, Report<CloudError>> {
        let token = self.tokens.token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .change_context_lazy(|| CloudError::Request { url: url.clone() })?;

        let status = response.status();
        debug!(url, %status, "GKE API response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Report::new(CloudError::Http {
                url,
                status: status.as_u16(),
                body,
            }));
        }
        response
            .json::<T>()
            .await
            .change_context(CloudError::Decode { url })
    }
}

#[async_trait]
impl NodePoolApi for GkeClient {
    async fn list_node_pools(&self, parent: &str) -> Result<Vec<NodePool>, Report<CloudError>> {
        let response: ListNodePoolsResponse = self.get(&format!("{parent}/nodePools")).await?;
        Ok(response.node_pools)
    }

    async fn set_node_pool_size(
        &self,
        node_pool: &str,
        node_count: usize,
    ) -> Result<Operation, Report<CloudError>> {
        self.post(
            &format!("{node_pool}:setSize"),
            &SetNodePoolSizeRequest { node_count },
        )
        .await
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, Report<CloudError>> {
        self.get(name).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::body_json;
    use wiremock::matchers::header;
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;

    use super::*;
    use crate::domain::scale_out::OperationStatus;

    const PARENT: &str = "projects/p/locations/us-central1-a/clusters/c";

    fn client(server: &MockServer) -> GkeClient {
        GkeClient::new(&server.uri(), TokenSource::Static("ya29.test".to_string()))
            .expect("client should build")
    }

    #[tokio::test]
    async fn lists_node_pools_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PARENT}/nodePools")))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nodePools": [
                    {"name": "default-pool", "initialNodeCount": 3},
                    {"name": "ipp", "config": {"metadata": {"ipp-reserved": "true"}}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pools = client(&server)
            .list_node_pools(PARENT)
            .await
            .expect("node pools should be listed");

        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].initial_node_count, 3);
        assert!(pools[1].is_reserved());
    }

    #[tokio::test]
    async fn set_size_posts_node_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{PARENT}/nodePools/ipp:setSize")))
            .and(body_json(json!({"nodeCount": 4})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-123",
                "status": "RUNNING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let operation = client(&server)
            .set_node_pool_size(&format!("{PARENT}/nodePools/ipp"), 4)
            .await
            .expect("resize should be accepted");

        assert_eq!(operation.name, "operation-123");
        assert_eq!(operation.status, OperationStatus::Running);
    }

    #[tokio::test]
    async fn get_operation_decodes_abort_details() {
        let server = MockServer::start().await;
        let name = "projects/p/locations/us-central1-a/operations/operation-123";
        Mock::given(method("GET"))
            .and(path(format!("/v1/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-123",
                "status": "ABORTING",
                "detail": "quota exceeded",
                "statusMessage": "IN_USE_ADDRESSES"
            })))
            .mount(&server)
            .await;

        let operation = client(&server)
            .get_operation(name)
            .await
            .expect("operation should be fetched");

        assert_eq!(operation.status, OperationStatus::Aborting);
        assert_eq!(operation.detail, "quota exceeded");
        assert_eq!(operation.status_message, "IN_USE_ADDRESSES");
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PARENT}/nodePools")))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let report = client(&server)
            .list_node_pools(PARENT)
            .await
            .expect_err("request should fail");

        assert!(matches!(
            report.current_context(),
            CloudError::Http { status: 403, body, .. } if body == "permission denied"
        ));
    }

    #[tokio::test]
    async fn undecodable_body_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PARENT}/nodePools")))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let report = client(&server)
            .list_node_pools(PARENT)
            .await
            .expect_err("decoding should fail");

        assert!(matches!(report.current_context(), CloudError::Decode { .. }));
    }
}
