//! External image scorer capability.
//!
//! Scoring itself is opaque: the core submits `(user_id, image bytes)` and records
//! whatever comes back. The orchestrator does not retry scorer calls.

#[cfg(feature = "grpc")]
mod grpc;

#[cfg(feature = "grpc")]
pub use grpc::{GrpcScorer, VerifyRequest, VerifyResponse, PROCESS_IMAGE_PATH};

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::ScorerError;

/// What the scorer reported for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub success: bool,
    pub score: f32,
    pub message: String,
}

/// Remote scoring service.
#[async_trait]
pub trait ImageScorer: Send + Sync {
    /// Score `image` on behalf of `user_id`.
    ///
    /// Implementations should bound the call by the context's remaining time.
    async fn process(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        image: &[u8],
    ) -> Result<ScoreResult, ScorerError>;
}
