//! Session token extraction for the WebSocket upgrade.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Deserialize;

use crate::chat::user::Session;
use crate::error::ApiError;
use crate::AppState;

/// Authenticated session resolved from the `token` query parameter or the
/// `Authorization: Bearer <token>` header, in that order.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn token_from_query(parts: &Parts) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

fn token_from_header(parts: &Parts) -> Result<String, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("invalid token"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| ApiError::unauthorized("invalid token"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::unauthorized("invalid token type"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("invalid token"));
    }
    Ok(token.to_string())
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match token_from_query(parts) {
            Some(token) => token,
            None => token_from_header(parts)?,
        };

        let session = state
            .sessions
            .resolve(&token)
            .await
            .map_err(|err| {
                tracing::warn!(%err, "session lookup failed");
                ApiError::unauthorized("Token lookup failed")
            })?
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

        Ok(AuthSession(session))
    }
}
