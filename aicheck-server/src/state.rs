//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;
use std::time::Duration;

use aicheck_core::{RequestContext, VerificationService};

use crate::auth::JwtVerifier;
use crate::config::Config;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Verification flows over the configured store, cache and scorer
    pub service: Arc<VerificationService>,
    /// Bearer token verifier
    pub jwt: Arc<JwtVerifier>,
    /// Deadline applied to each request's context
    pub request_timeout: Duration,
    /// Maximum accepted image size in bytes
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(service: VerificationService, jwt: JwtVerifier, config: &Config) -> Self {
        Self {
            service: Arc::new(service),
            jwt: Arc::new(jwt),
            request_timeout: config.request_timeout(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Fresh context bounded by the request timeout
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }
}
