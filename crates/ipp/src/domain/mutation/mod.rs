//! Admission-time pod mutation.
//!
//! The [`MutationEngine`] decodes the reviewed pod, asks the configured
//! [`PlacementStrategy`] whether the pod is in policy and turns the
//! strategy's patch into an admission response. Every response it produces
//! allows the pod; failures are reported in the response status instead.

use core::error::Error;

pub mod engine;
pub mod patch;
pub mod strategy;

pub use engine::MutationEngine;
pub use engine::Mutator;
pub use strategy::dynamic::DynamicProvisioning;
pub use strategy::dynamic::PodScheduler;
pub use strategy::static_affinity::StaticAffinity;
pub use strategy::static_affinity::StaticAffinityConfig;
pub use strategy::IgnoreReason;
pub use strategy::PlacementStrategy;

/// Errors raised while building a pod mutation.
#[derive(Debug, derive_more::Display)]
pub enum MutationError {
    #[display("failed to unmarshal Pod: {message}")]
    PodDecode { message: String },
    #[display("failed to schedule pod {pod}")]
    Schedule { pod: String },
    #[display("failed to build patch: {message}")]
    PatchBuild { message: String },
    #[display("failed to serialize patch: {message}")]
    PatchSerialize { message: String },
}

impl Error for MutationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_error_display_formatting() {
        let decode = MutationError::PodDecode {
            message: "expected value at line 1 column 1".to_string(),
        };
        assert_eq!(
            decode.to_string(),
            "failed to unmarshal Pod: expected value at line 1 column 1"
        );

        let schedule = MutationError::Schedule {
            pod: "default/web-0".to_string(),
        };
        assert_eq!(schedule.to_string(), "failed to schedule pod default/web-0");
    }
}
