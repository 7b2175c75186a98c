//! Bearer token gate for `/v1`.
//!
//! The controller does not issue or introspect credentials. It compares the
//! presented bearer token with the configured one; with no token configured
//! every caller is let through.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use fleet_id::RequestId;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::api::error::ApiError;
use crate::state::AppState;

pub const AUTHORIZATION_HEADER: &str = "Authorization";

fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(AUTHORIZATION_HEADER)
        .ok_or("missing Authorization header")?
        .to_str()
        .map_err(|_| "Authorization header is not valid text")?
        .trim();

    let token = value
        .strip_prefix("Bearer ")
        .ok_or("Authorization must be a Bearer token")?
        .trim();

    if token.is_empty() {
        return Err("Authorization Bearer token cannot be empty");
    }
    Ok(token)
}

/// Compares digests so the comparison time does not depend on where the
/// tokens first differ.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Stable, non-secret id for logging who called.
fn actor_id(token: &str) -> String {
    let hex = format!("{:x}", Sha256::digest(token.as_bytes()));
    format!("tok_{}", hex.get(..16).unwrap_or(&hex))
}

pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_token() else {
        return Ok(next.run(request).await);
    };

    let request_id = RequestId::new();
    let token = bearer_token(request.headers()).map_err(|reason| {
        warn!(%request_id, path = %request.uri().path(), reason, "Rejected unauthenticated request");
        ApiError::unauthorized("unauthorized", reason).with_request_id(request_id.to_string())
    })?;

    if !tokens_match(token, expected) {
        warn!(%request_id, path = %request.uri().path(), actor = %actor_id(token), "Rejected invalid token");
        return Err(ApiError::unauthorized("invalid_token", "bearer token is not valid")
            .with_request_id(request_id.to_string()));
    }

    debug!(%request_id, actor = %actor_id(token), "Authorized request");
    Ok(next.run(request).await)
}
