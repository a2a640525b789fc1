//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod duplicates;
pub mod health;
pub mod metrics;
pub mod result;
pub mod verify;

pub use crate::state::AppState;
pub use duplicates::{get_duplicates_handler, DuplicateEntry, DuplicatesResponse};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use metrics::{metrics_summary_handler, MetricsResponse};
pub use result::{get_result_handler, ResultResponse};
pub use verify::{verify_handler, VerifyMetadata, VerifyResponse};
