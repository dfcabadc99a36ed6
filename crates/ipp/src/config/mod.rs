//! Command line configuration.

use core::error::Error;

pub mod cli;
pub mod webhook;

pub use cli::Cli;
pub use cli::Commands;
pub use webhook::Placement;
pub use webhook::PlacementConfig;
pub use webhook::TlsConfig;
pub use webhook::WebhookArgs;

/// Invalid flag combinations or values
#[derive(Debug, derive_more::Display)]
pub enum ConfigError {
    #[display("--gke-parent needs to be specified for dynamic placement")]
    MissingGkeParent,
    #[display("invalid --gke-parent {parent:?}")]
    InvalidGkeParent { parent: String },
    #[display("{flag} must not be empty")]
    EmptyValue { flag: &'static str },
    #[display("--tlscert and --tlskey must be set together, --{missing} is missing")]
    IncompleteTls { missing: &'static str },
}

impl Error for ConfigError {}
