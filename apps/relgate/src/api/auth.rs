//! # Authentication Module
//!
//! Two concerns live here:
//! - API key authentication: when `api_key` is configured, every request
//!   except `/health` must carry it.
//! - The acting user: handlers that act on behalf of someone read the
//!   trusted `X-User-Id` header through the [`ActingUser`] extractor.
//!
//! ## Usage
//!
//! ```text
//! Authorization: Bearer <your-api-key>
//! X-User-Id: 42
//! ```

use super::types::ErrorResponse;
use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use relgate_core::UserId;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header naming the user a request acts for.
pub const USER_HEADER: &str = "x-user-id";

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// API key authentication middleware.
///
/// `/health` is always allowed (for load balancer checks). Both
/// `Bearer <key>` and a raw `<key>` are accepted.
pub async fn api_key_auth_middleware(
    State(expected): State<Arc<str>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(header_value) = auth_header else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            "Missing Authorization header"
        );
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    };

    let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
    if keys_match(provided, &expected) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(
            event = "auth_failure",
            reason = "invalid_api_key",
            "Authentication failed: invalid API key"
        );
        Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

/// Constant-time comparison over keys padded to the same length, so the
/// running time does not leak where they differ or how long the key is.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

// =============================================================================
// ACTING USER
// =============================================================================

/// The user named by the `X-User-Id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_HEADER) else {
            return Err(reject(
                StatusCode::UNAUTHORIZED,
                "missing X-User-Id header".to_string(),
            ));
        };

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|id| ActingUser(UserId(id)))
            .ok_or_else(|| {
                reject(
                    StatusCode::BAD_REQUEST,
                    "X-User-Id must be a numeric user id".to_string(),
                )
            })
    }
}

fn reject(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_keys_match() {
        assert!(keys_match("secret-key", "secret-key"));
    }

    #[test]
    fn prefix_of_key_does_not_match() {
        assert!(!keys_match("secret", "secret-key"));
        assert!(!keys_match("secret-key-extra", "secret-key"));
        assert!(!keys_match("", "secret-key"));
    }
}
