use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use poem::get;
use poem::listener::BoxListener;
use poem::listener::Listener;
use poem::listener::RustlsCertificate;
use poem::listener::RustlsConfig;
use poem::listener::TcpListener;
use poem::middleware::Tracing;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::errors::GatewayError;
use super::handlers::admission_review;
use super::handlers::healthz;
use super::handlers::ADMISSION_PATH;
use super::handlers::HEALTHZ_PATH;
use crate::config::TlsConfig;
use crate::domain::mutation::Mutator;

/// In-flight requests get this long to finish after shutdown is requested
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhook routes with `mutator` attached
pub fn routes(mutator: Arc<dyn Mutator>) -> impl Endpoint {
    Route::new()
        .at(ADMISSION_PATH, admission_review)
        .at(HEALTHZ_PATH, get(healthz))
        .data(mutator)
        .with(Tracing)
}

/// HTTP(S) server for the admission webhook
pub struct WebhookServer {
    listen_addr: String,
    tls: Option<TlsConfig>,
    mutator: Arc<dyn Mutator>,
}

impl WebhookServer {
    pub fn new(listen_addr: String, tls: Option<TlsConfig>, mutator: Arc<dyn Mutator>) -> Self {
        Self {
            listen_addr,
            tls,
            mutator,
        }
    }

    /// Serves until `cancellation_token` is cancelled.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::ServerError`] if the TLS material cannot be read or
    ///   the server fails to bind or run
    pub async fn run(self, cancellation_token: CancellationToken) -> Result<(), Report<GatewayError>> {
        info!(
            listen_addr = %self.listen_addr,
            tls = self.tls.is_some(),
            "Starting admission webhook server"
        );
        let listener = self.listener().await?;

        let result = Server::new(listener)
            .run_with_graceful_shutdown(
                routes(self.mutator),
                async move { cancellation_token.cancelled().await },
                Some(SHUTDOWN_TIMEOUT),
            )
            .await;
        match result {
            Ok(()) => {
                info!("Admission webhook server stopped");
                Ok(())
            }
            Err(e) => {
                error!("Admission webhook server failed: {e}");
                Err(Report::new(GatewayError::ServerError {
                    message: format!("Server failed: {e}"),
                }))
            }
        }
    }

    async fn listener(&self) -> Result<BoxListener, Report<GatewayError>> {
        let tcp = TcpListener::bind(self.listen_addr.clone());
        let Some(tls) = &self.tls else {
            warn!("No TLS certificate configured, serving plain HTTP");
            return Ok(tcp.boxed());
        };

        let cert = tokio::fs::read(&tls.cert_path)
            .await
            .change_context_lazy(|| GatewayError::ServerError {
                message: format!("Failed to read TLS certificate {}", tls.cert_path.display()),
            })?;
        let key = tokio::fs::read(&tls.key_path)
            .await
            .change_context_lazy(|| GatewayError::ServerError {
                message: format!("Failed to read TLS key {}", tls.key_path.display()),
            })?;
        let config = RustlsConfig::new().fallback(RustlsCertificate::new().cert(cert).key(key));
        Ok(tcp.rustls(config).boxed())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use poem::http::StatusCode;
    use poem::test::TestClient;

    use super::*;
    use crate::domain::mutation::MutationEngine;
    use crate::domain::mutation::StaticAffinity;
    use crate::domain::mutation::StaticAffinityConfig;

    fn mutator() -> Arc<dyn Mutator> {
        Arc::new(MutationEngine::new(Arc::new(StaticAffinity::new(
            StaticAffinityConfig {
                node_label_key: "ipp-dedicated".to_string(),
                node_taint_key: "ipp-dedicated".to_string(),
                class_label_key: "ipp-class".to_string(),
            },
        ))))
    }

    #[tokio::test]
    async fn healthz_answers_ok() {
        let client = TestClient::new(routes(mutator()));

        let response = client.get(HEALTHZ_PATH).send().await;

        response.assert_status_is_ok();
        response.assert_text("ok").await;
    }

    #[tokio::test]
    async fn missing_tls_material_fails_to_start() {
        let server = WebhookServer::new(
            "127.0.0.1:0".to_string(),
            Some(TlsConfig {
                cert_path: PathBuf::from("/nonexistent/tls.crt"),
                key_path: PathBuf::from("/nonexistent/tls.key"),
            }),
            mutator(),
        );

        let report = server
            .run(CancellationToken::new())
            .await
            .expect_err("server should not start");

        assert!(matches!(
            report.current_context(),
            GatewayError::ServerError { message } if message.contains("tls.crt")
        ));
        assert_eq!(
            report.current_context().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn cancelled_server_stops() {
        let token = CancellationToken::new();
        token.cancel();
        let server = WebhookServer::new("127.0.0.1:0".to_string(), None, mutator());

        server.run(token).await.expect("server should stop cleanly");
    }
}
