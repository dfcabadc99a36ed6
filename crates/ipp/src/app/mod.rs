//! Process wiring: build components from the CLI arguments, serve until a
//! shutdown signal arrives, then drain background work.

mod builder;

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

pub use builder::ApplicationBuilder;

use crate::api::WebhookServer;
use crate::config::TlsConfig;
use crate::config::WebhookArgs;
use crate::domain::mutation::Mutator;
use crate::domain::scale_out::ScaleOutDriver;

/// Application core structure, managing all components
pub struct Application {
    pub mutator: Arc<dyn Mutator>,
    /// Present with dynamic placement only
    pub driver: Option<ScaleOutDriver>,
    pub args: WebhookArgs,
    tls: Option<TlsConfig>,
    cancellation_token: CancellationToken,
}

impl Application {
    /// Serves admission reviews until SIGTERM/SIGINT or until the server
    /// stops on its own. Background scale-outs are drained when serving
    /// fails.
    pub async fn run(&self) -> Result<()> {
        let result = self.serve().await;
        if result.is_err() {
            self.shutdown().await?;
        }
        result
    }

    async fn serve(&self) -> Result<()> {
        let server = WebhookServer::new(
            self.args.addr.clone(),
            self.tls.clone(),
            self.mutator.clone(),
        );
        let token = self.cancellation_token.clone();
        let mut server_task = tokio::spawn(async move { server.run(token).await });

        tokio::select! {
            result = wait_for_signal() => {
                result?;
                info!("Shutdown signal received, stopping webhook server");
                self.cancellation_token.cancel();
                (&mut server_task)
                    .await?
                    .map_err(|e| anyhow::anyhow!("Webhook server failed: {e:?}"))?;
            }
            result = &mut server_task => {
                result?.map_err(|e| anyhow::anyhow!("Webhook server failed: {e:?}"))?;
                warn!("Webhook server stopped unexpectedly");
            }
        }

        info!("Application run completed");
        Ok(())
    }

    /// Gracefully shutdown application
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down application...");
        self.cancellation_token.cancel();
        if let Some(driver) = &self.driver {
            driver.shutdown().await;
        }
        info!("Application shutdown completed");
        Ok(())
    }
}

async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, initiating graceful shutdown");
    }
    Ok(())
}
