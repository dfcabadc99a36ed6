use core::error::Error;

use poem::http::StatusCode;

/// Errors raised while handling an admission review over HTTP
#[derive(Debug, derive_more::Display)]
pub enum GatewayError {
    #[display("invalid method {method}, only POST requests are allowed")]
    MethodNotAllowed { method: String },
    #[display("unsupported content type {content_type:?}, only application/json is supported")]
    UnsupportedContentType { content_type: String },
    #[display("failed to read request body")]
    ReadBody,
    #[display("empty request body")]
    EmptyBody,
    #[display("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[display("failed to decode admission review: {message}")]
    Decode { message: String },
    #[display("admission review has no request")]
    MissingRequest,
    #[display("mutator returned no response")]
    NilResponse,
    #[display("failed to encode admission review")]
    Encode,
    #[display("Server error: {message}")]
    ServerError { message: String },
}

impl GatewayError {
    /// Client mistakes map to 400, failures on our side to 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NilResponse | GatewayError::Encode | GatewayError::ServerError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl Error for GatewayError {}
