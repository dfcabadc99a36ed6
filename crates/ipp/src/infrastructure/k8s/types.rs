use core::error::Error;

/// Errors that can occur during Kubernetes operations.
#[derive(Debug, derive_more::Display)]
pub enum KubernetesError {
    #[display("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[display("Failed to list nodes with selector {selector}")]
    ListFailed { selector: String },
    #[display("Failed to patch node {name}")]
    PatchFailed { name: String },
}

impl Error for KubernetesError {}
