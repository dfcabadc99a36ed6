//! GKE `container.googleapis.com/v1` REST client.

use core::error::Error;

pub mod client;
pub mod token;

pub use client::GkeClient;
pub use client::DEFAULT_GKE_ENDPOINT;
pub use token::MetadataTokenSource;
pub use token::TokenSource;
pub use token::DEFAULT_METADATA_ENDPOINT;

/// Errors raised by the cloud node pool API.
#[derive(Debug, derive_more::Display)]
pub enum CloudError {
    #[display("Failed to build HTTP client")]
    ClientBuild,
    #[display("Failed to obtain access token: {message}")]
    Token { message: String },
    #[display("Request to {url} failed")]
    Request { url: String },
    #[display("Request to {url} returned {status}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },
    #[display("Failed to decode response from {url}")]
    Decode { url: String },
}

impl Error for CloudError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_error_display_formatting() {
        let http = CloudError::Http {
            url: "https://container.googleapis.com/v1/x".to_string(),
            status: 403,
            body: "permission denied".to_string(),
        };
        assert_eq!(
            http.to_string(),
            "Request to https://container.googleapis.com/v1/x returned 403: permission denied"
        );

        let token = CloudError::Token {
            message: "no metadata server".to_string(),
        };
        assert_eq!(
            token.to_string(),
            "Failed to obtain access token: no metadata server"
        );
    }
}
