use clap::Parser;
use clap::Subcommand;
use utils::version;

use crate::config::webhook::WebhookArgs;

/// Instance-per-Pod
#[derive(Parser)]
#[command(name = "ipp", version = &**version::VERSION)]
pub struct Cli {
    #[arg(long, global = true, env = "IPP_DEBUG", help = "Enable debug logging")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the admission webhook daemon
    Webhook(Box<WebhookArgs>),
}
