//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document for the AI Check API.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::{
    DuplicateEntry, DuplicatesResponse, HealthResponse, MetricsResponse, ReadyResponse,
    ResultResponse, VerifyMetadata, VerifyResponse,
};

/// AI Check API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "AI Check API",
        version = "0.1.0",
        description = r#"
## Image Verification API

Submit an image to `POST /verify`. The image is scored by the image processor,
the outcome is stored durably and cached, and a `request_id` is returned for
later lookups via `GET /result/{id}` and `GET /duplicates/{id}`.

Images are fingerprinted with SHA-1; the same image can be verified only once
per user.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    tags(
        (name = "Verification", description = "Verify images and look up results"),
        (name = "Metrics", description = "Aggregate verification metrics"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::verify::verify_handler,
        crate::handlers::result::get_result_handler,
        crate::handlers::duplicates::get_duplicates_handler,
        crate::handlers::metrics::metrics_summary_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            VerifyResponse,
            VerifyMetadata,
            ResultResponse,
            DuplicatesResponse,
            DuplicateEntry,
            MetricsResponse,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Registers the `bearer_token` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_token",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/ready",
            "/verify",
            "/result/{id}",
            "/duplicates/{id}",
            "/metrics/summary",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_token"));
    }
}
