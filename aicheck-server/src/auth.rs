//! JWT authentication module
//!
//! Provides the `AuthenticatedUser` extractor for Axum handlers. Tokens are HS256
//! JWTs signed with the shared `JWT_SECRET`; the `sub` claim becomes the user id.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Claims read from bearer tokens
#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    aud: Option<Audience>,
}

/// `aud` may be a single string or an array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Self::One(aud) => aud == expected,
            Self::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Verifies HS256 bearer tokens against a shared secret.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    audience: Option<String>,
}

impl JwtVerifier {
    /// Build a verifier for `secret`, requiring `audience` in `aud` when given.
    pub fn new(secret: &str, audience: Option<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // `exp` is checked when present but not required
        validation.required_spec_claims.clear();
        // Audience is checked below so it can report its own error code
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            audience: audience.filter(|aud| !aud.trim().is_empty()),
        }
    }

    /// Validate `token` and return its subject.
    pub fn verify(&self, token: &str) -> Result<String, ApiError> {
        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    ApiError::auth_error("AUTH_TOKEN_EXPIRED", "JWT token has expired")
                }
                ErrorKind::InvalidSignature => {
                    ApiError::auth_error("AUTH_INVALID_TOKEN", "Invalid JWT signature")
                }
                _ => ApiError::auth_error(
                    "AUTH_INVALID_TOKEN",
                    format!("JWT validation failed: {}", e),
                ),
            })?;

        let claims = token_data.claims;

        if let Some(expected) = &self.audience {
            let matches = claims
                .aud
                .as_ref()
                .is_some_and(|aud| aud.contains(expected));
            if !matches {
                return Err(ApiError::auth_error(
                    "AUTH_INVALID_AUDIENCE",
                    "Token audience does not match",
                ));
            }
        }

        if claims.sub.is_empty() {
            return Err(ApiError::auth_error(
                "AUTH_MISSING_SUBJECT",
                "Token has no subject",
            ));
        }

        Ok(claims.sub)
    }
}

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::auth_error("AUTH_MISSING_TOKEN", "Missing Authorization header")
        })?;

    let auth_value = auth_header.to_str().map_err(|_| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Invalid Authorization header encoding",
        )
    })?;

    let token = match auth_value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => {
            return Err(ApiError::auth_error(
                "AUTH_INVALID_TOKEN",
                "Authorization header must use Bearer scheme",
            ))
        }
    };

    if token.is_empty() {
        return Err(ApiError::auth_error(
            "AUTH_MISSING_TOKEN",
            "Bearer token is empty",
        ));
    }

    Ok(token)
}

/// Authenticated user extractor.
///
/// Reads `Authorization: Bearer <token>`, validates the token and exposes its subject.
/// Returns 401 with structured error codes on any failure.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)?;
        let user_id = state.jwt.verify(token)?;

        Ok(AuthenticatedUser { user_id })
    }
}
