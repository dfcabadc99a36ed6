use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::Application;
use crate::config::PlacementConfig;
use crate::config::WebhookArgs;
use crate::domain::mutation::DynamicProvisioning;
use crate::domain::mutation::MutationEngine;
use crate::domain::mutation::Mutator;
use crate::domain::mutation::PlacementStrategy;
use crate::domain::mutation::StaticAffinity;
use crate::domain::scale_out::ScaleOutConfig;
use crate::domain::scale_out::ScaleOutDriver;
use crate::infrastructure::gke::GkeClient;
use crate::infrastructure::gke::MetadataTokenSource;
use crate::infrastructure::gke::TokenSource;
use crate::infrastructure::k8s::KubeNodes;
use crate::infrastructure::kube_client::init_kube_client;

/// Application builder
pub struct ApplicationBuilder {
    args: WebhookArgs,
}

impl ApplicationBuilder {
    pub fn new(args: WebhookArgs) -> Self {
        Self { args }
    }

    /// Validates the arguments and builds every component. With dynamic
    /// placement this contacts both the cluster and the GKE API.
    pub async fn build(self) -> Result<Application> {
        info!("Building application components...");

        let tls = self
            .args
            .tls_config()
            .map_err(|e| anyhow::anyhow!("Invalid TLS configuration: {e:?}"))?;
        let placement = self
            .args
            .placement_config()
            .map_err(|e| anyhow::anyhow!("Invalid placement configuration: {e:?}"))?;

        let (strategy, driver): (Arc<dyn PlacementStrategy>, Option<ScaleOutDriver>) =
            match placement {
                PlacementConfig::StaticAffinity(config) => {
                    (Arc::new(StaticAffinity::new(config)), None)
                }
                PlacementConfig::Dynamic(config) => {
                    let driver = self.create_driver(config).await?;
                    let strategy = DynamicProvisioning::new(Arc::new(driver.clone()));
                    (Arc::new(strategy), Some(driver))
                }
            };
        info!(strategy = strategy.name(), "Placement strategy selected");

        let mutator: Arc<dyn Mutator> = Arc::new(MutationEngine::new(strategy));

        Ok(Application {
            mutator,
            driver,
            args: self.args,
            tls,
            cancellation_token: CancellationToken::new(),
        })
    }

    async fn create_driver(&self, config: ScaleOutConfig) -> Result<ScaleOutDriver> {
        let client = init_kube_client(self.args.kubeconfig.as_deref())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {e:?}"))?;

        let tokens = match &self.args.gke_access_token {
            Some(token) => TokenSource::Static(token.clone()),
            None => {
                let http = reqwest::Client::builder().build()?;
                TokenSource::Metadata(MetadataTokenSource::new(
                    http,
                    &self.args.gce_metadata_endpoint,
                ))
            }
        };
        let gke = GkeClient::new(&self.args.gke_endpoint, tokens)
            .map_err(|e| anyhow::anyhow!("Failed to create GKE client: {e:?}"))?;

        ScaleOutDriver::start(config, Arc::new(gke), Arc::new(KubeNodes::new(client)))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start scale-out driver: {e:?}"))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[tokio::test]
    async fn static_placement_builds_without_cloud_access() {
        let args = WebhookArgs::try_parse_from([
            "webhook",
            "--placement",
            "static-affinity",
            "--addr",
            "127.0.0.1:0",
        ])
        .expect("arguments should parse");

        let app = ApplicationBuilder::new(args)
            .build()
            .await
            .expect("application should build");

        assert!(app.driver.is_none());
        app.shutdown().await.expect("shutdown should succeed");
    }

    #[tokio::test]
    async fn half_configured_tls_is_rejected() {
        let args = WebhookArgs::try_parse_from([
            "webhook",
            "--placement",
            "static-affinity",
            "--tlskey",
            "/tls/tls.key",
        ])
        .expect("arguments should parse");

        let result = ApplicationBuilder::new(args).build().await;

        assert!(result.is_err(), "a key without certificate must fail");
    }
}
