//! Basic authentication extractor.
//!
//! When credentials are configured, every protected handler takes an
//! [`Authorized`] argument, which checks the `Authorization: Basic ...`
//! header against them. With no credentials configured it always succeeds.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use fleet_ship_control::FleetApi;

use crate::config::BasicAuthConfig;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Proof that a request passed basic authentication.
#[derive(Debug, Clone)]
pub struct Authorized {
    /// The authenticated user, if auth is enabled.
    pub username: Option<String>,
}

/// Decode a `Basic` authorization header value into user name and password.
#[must_use]
pub fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Compare two strings without exiting early on the first difference.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check a request's authorization header against the configured credentials.
///
/// # Errors
///
/// Returns `ApiError::Unauthorized` if the header is missing, malformed or
/// carries the wrong credentials.
pub fn check_credentials(
    expected: &BasicAuthConfig,
    header: Option<&str>,
) -> Result<String, ApiError> {
    let (username, password) = header.and_then(decode_basic).ok_or(ApiError::Unauthorized)?;

    let user_ok = constant_time_eq(&username, &expected.username);
    let pass_ok = constant_time_eq(&password, &expected.password);
    if user_ok && pass_ok {
        Ok(username)
    } else {
        tracing::warn!(username = %username, "Rejected basic auth credentials");
        Err(ApiError::Unauthorized)
    }
}

#[async_trait]
impl<F> FromRequestParts<Arc<GatewayState<F>>> for Authorized
where
    F: FleetApi + ?Sized + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<F>>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = &state.config.basic_auth else {
            return Ok(Self { username: None });
        };

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let username = check_credentials(expected, header)?;
        Ok(Self {
            username: Some(username),
        })
    }
}
