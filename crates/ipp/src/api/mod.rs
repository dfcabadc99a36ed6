//! Admission review HTTP gateway.
//!
//! Validates inbound requests (method, content type, body size), decodes the
//! admission review envelope, hands the inner request to a
//! [`Mutator`](crate::domain::mutation::Mutator) and writes the reply
//! envelope. Client mistakes are answered with 400 before the mutator runs; a
//! mutator that produces no response is answered with 500.

pub mod errors;
pub mod handlers;
pub mod server;

pub use errors::GatewayError;
pub use handlers::review;
pub use handlers::ADMISSION_PATH;
pub use handlers::MAX_BODY_BYTES;
pub use server::routes;
pub use server::WebhookServer;
