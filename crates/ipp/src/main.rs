use anyhow::Result;
use clap::Parser;
use ipp::app::ApplicationBuilder;
use ipp::config::Cli;
use ipp::config::Commands;
use ipp::config::WebhookArgs;
use utils::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Webhook(webhook_args) => run_webhook(cli.debug, *webhook_args).await,
    }
}

async fn run_webhook(debug: bool, webhook_args: WebhookArgs) -> Result<()> {
    let _guard = logging::init(debug, webhook_args.log_file.as_deref())?;

    tracing::info!("Starting instance-per-pod webhook {}", &**version::VERSION);

    let app = ApplicationBuilder::new(webhook_args).build().await?;

    app.run().await?;
    app.shutdown().await?;

    Ok(())
}
