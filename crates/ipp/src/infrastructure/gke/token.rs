//! Access tokens for the GKE REST API.

use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::CloudError;

pub const DEFAULT_METADATA_ENDPOINT: &str = "http://metadata.google.internal";
const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
const METADATA_FLAVOR: &str = "Google";
/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where bearer tokens come from
pub enum TokenSource {
    /// A fixed token, e.g. from `gcloud auth print-access-token`
    Static(String),
    /// The default service account of the GCE instance
    Metadata(MetadataTokenSource),
}

impl TokenSource {
    pub async fn token(&self) -> Result<String, Report<CloudError>> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Metadata(source) => source.token().await,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Token source backed by the GCE metadata server, cached until shortly
/// before expiry
pub struct MetadataTokenSource {
    http: reqwest::Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataTokenSource {
    pub fn new(http: reqwest::Client, endpoint: &str) -> Self {
        Self {
            http,
            url: format!("{}{METADATA_TOKEN_PATH}", endpoint.trim_end_matches('/')),
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, Report<CloudError>> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let fetched = self.fetch().await?;
        let lifetime = Duration::from_secs(fetched.expires_in).saturating_sub(EXPIRY_MARGIN);
        debug!(expires_in = fetched.expires_in, "Fetched access token from metadata server");
        let access_token = fetched.access_token;
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(access_token)
    }

    async fn fetch(&self) -> Result<MetadataToken, Report<CloudError>> {
        let token_error = || CloudError::Token {
            message: format!("metadata server request to {} failed", self.url),
        };
        let response = self
            .http
            .get(&self.url)
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)
            .send()
            .await
            .change_context_lazy(token_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Report::new(token_error())
                .attach_printable(format!("metadata server answered {status}")));
        }
        response
            .json::<MetadataToken>()
            .await
            .change_context_lazy(token_error)
    }
}
