//! gRPC client for the `verify.ImageProcessor` service.
//!
//! Messages are declared inline with `prost` derives, so no protobuf toolchain is
//! needed at build time. Field tags must stay in step with the service's
//! `verify.proto`.

use std::time::Duration;

use async_trait::async_trait;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};

use super::{ImageScorer, ScoreResult};
use crate::context::RequestContext;
use crate::error::ScorerError;

/// Fully-qualified method path of `ImageProcessor.ProcessImage`.
pub const PROCESS_IMAGE_PATH: &str = "/verify.ImageProcessor/ProcessImage";

#[derive(Clone, PartialEq, prost::Message)]
pub struct VerifyRequest {
    #[prost(string, tag = "1")]
    pub user_id: String,
    #[prost(bytes = "vec", tag = "2")]
    pub image_data: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VerifyResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(float, tag = "2")]
    pub score: f32,
    #[prost(string, tag = "3")]
    pub message: String,
}

impl TryFrom<VerifyResponse> for ScoreResult {
    type Error = ScorerError;

    fn try_from(response: VerifyResponse) -> Result<Self, Self::Error> {
        if !response.score.is_finite() {
            return Err(ScorerError::InvalidResponse(format!(
                "score is not a finite number: {}",
                response.score
            )));
        }

        Ok(Self {
            success: response.success,
            score: response.score,
            message: response.message,
        })
    }
}

/// Scorer backed by a lazily connected tonic `Channel`.
///
/// The channel reconnects on demand, so a scorer that is down at startup only fails
/// the requests made while it is unreachable.
#[derive(Clone)]
pub struct GrpcScorer {
    channel: Channel,
}

impl GrpcScorer {
    /// Build a client for `addr` (e.g. `http://rust-service:50051`) without dialing.
    pub fn connect_lazy(addr: &str, connect_timeout: Duration) -> Result<Self, ScorerError> {
        let endpoint = Endpoint::from_shared(addr.to_string())
            .map_err(|e| ScorerError::Transport(format!("invalid scorer address {addr:?}: {e}")))?
            .connect_timeout(connect_timeout);

        tracing::info!(addr, "Image processor client configured");
        Ok(Self {
            channel: endpoint.connect_lazy(),
        })
    }
}

#[async_trait]
impl ImageScorer for GrpcScorer {
    async fn process(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        image: &[u8],
    ) -> Result<ScoreResult, ScorerError> {
        let mut client = tonic::client::Grpc::new(self.channel.clone());
        client
            .ready()
            .await
            .map_err(|e| ScorerError::Transport(e.to_string()))?;

        let mut request = tonic::Request::new(VerifyRequest {
            user_id: user_id.to_string(),
            image_data: image.to_vec(),
        });
        if let Some(remaining) = ctx.remaining() {
            request.set_timeout(remaining);
        }

        let codec: ProstCodec<VerifyRequest, VerifyResponse> = ProstCodec::default();
        let response = client
            .unary(request, PathAndQuery::from_static(PROCESS_IMAGE_PATH), codec)
            .await?;

        ScoreResult::try_from(response.into_inner())
    }
}
