use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;
use error_stack::Report;
use error_stack::ResultExt;

use super::ConfigError;
use crate::domain::mutation::StaticAffinityConfig;
use crate::domain::scale_out::ClusterPath;
use crate::domain::scale_out::ScaleOutConfig;
use crate::infrastructure::gke::DEFAULT_GKE_ENDPOINT;
use crate::infrastructure::gke::DEFAULT_METADATA_ENDPOINT;

/// Which placement strategy mutates pods
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Placement {
    /// Every pod outside system namespaces gets a freshly provisioned node
    Dynamic,
    /// Pods carrying the class label are steered to a dedicated node pool
    StaticAffinity,
}

#[derive(Parser, Clone, Debug)]
pub struct WebhookArgs {
    #[arg(
        long,
        env = "IPP_ADDR",
        default_value = "0.0.0.0:443",
        help = "Address the webhook listens on"
    )]
    pub addr: String,

    #[arg(
        long = "tlscert",
        alias = "tls-cert",
        env = "IPP_TLS_CERT",
        value_hint = clap::ValueHint::FilePath,
        help = "TLS certificate file (PEM)"
    )]
    pub tls_cert: Option<PathBuf>,

    #[arg(
        long = "tlskey",
        alias = "tls-key",
        env = "IPP_TLS_KEY",
        value_hint = clap::ValueHint::FilePath,
        help = "TLS private key file (PEM)"
    )]
    pub tls_key: Option<PathBuf>,

    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to in-cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "IPP_PLACEMENT",
        value_enum,
        default_value_t = Placement::Dynamic,
        help = "Placement strategy"
    )]
    pub placement: Placement,

    #[arg(
        long,
        env = "IPP_GKE_PARENT",
        help = "GKE cluster, in the format 'projects/*/locations/*/clusters/*' (dynamic placement)"
    )]
    pub gke_parent: Option<String>,

    #[arg(
        long,
        env = "IPP_GKE_ENDPOINT",
        default_value = DEFAULT_GKE_ENDPOINT,
        help = "GKE API endpoint"
    )]
    pub gke_endpoint: String,

    #[arg(
        long,
        env = "IPP_GKE_ACCESS_TOKEN",
        hide_env_values = true,
        help = "Static GKE access token; the GCE metadata server is used when unset"
    )]
    pub gke_access_token: Option<String>,

    #[arg(
        long,
        env = "GCE_METADATA_HOST_URL",
        default_value = DEFAULT_METADATA_ENDPOINT,
        help = "GCE metadata server used to obtain access tokens"
    )]
    pub gce_metadata_endpoint: String,

    #[arg(
        long,
        env = "IPP_NODE_LABEL_KEY",
        default_value = "ipp-dedicated",
        help = "Node label marking dedicated nodes (static-affinity placement)"
    )]
    pub node_label_key: String,

    #[arg(
        long,
        env = "IPP_NODE_TAINT_KEY",
        default_value = "ipp-dedicated",
        help = "Taint carried by dedicated nodes (static-affinity placement)"
    )]
    pub node_taint_key: String,

    #[arg(
        long,
        env = "IPP_CLASS_LABEL_KEY",
        default_value = "ipp-class",
        help = "Pod label opting pods in (static-affinity placement)"
    )]
    pub class_label_key: String,

    #[arg(
        long,
        env = "IPP_LOG_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Also write logs to this file, rotated daily"
    )]
    pub log_file: Option<PathBuf>,
}

/// Validated placement settings
#[derive(Debug, Clone)]
pub enum PlacementConfig {
    Dynamic(ScaleOutConfig),
    StaticAffinity(StaticAffinityConfig),
}

/// Certificate and key paths for the HTTPS listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl WebhookArgs {
    pub fn placement_config(&self) -> Result<PlacementConfig, Report<ConfigError>> {
        match self.placement {
            Placement::Dynamic => {
                let parent = self
                    .gke_parent
                    .as_deref()
                    .filter(|parent| !parent.is_empty())
                    .ok_or_else(|| Report::new(ConfigError::MissingGkeParent))?;
                let parent = parent.parse::<ClusterPath>().change_context_lazy(|| {
                    ConfigError::InvalidGkeParent {
                        parent: parent.to_string(),
                    }
                })?;
                Ok(PlacementConfig::Dynamic(ScaleOutConfig::new(parent)))
            }
            Placement::StaticAffinity => {
                for (flag, value) in [
                    ("--node-label-key", &self.node_label_key),
                    ("--node-taint-key", &self.node_taint_key),
                    ("--class-label-key", &self.class_label_key),
                ] {
                    if value.is_empty() {
                        return Err(Report::new(ConfigError::EmptyValue { flag }));
                    }
                }
                Ok(PlacementConfig::StaticAffinity(StaticAffinityConfig {
                    node_label_key: self.node_label_key.clone(),
                    node_taint_key: self.node_taint_key.clone(),
                    class_label_key: self.class_label_key.clone(),
                }))
            }
        }
    }

    /// TLS is enabled when both paths are set and disabled when neither is.
    pub fn tls_config(&self) -> Result<Option<TlsConfig>, Report<ConfigError>> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert_path), Some(key_path)) => Ok(Some(TlsConfig {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(Report::new(ConfigError::IncompleteTls { missing: "tlskey" })),
            (None, Some(_)) => Err(Report::new(ConfigError::IncompleteTls { missing: "tlscert" })),
        }
    }
}
