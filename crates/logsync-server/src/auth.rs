//! Viewer-identity extraction.
//!
//! The spec treats authentication as out of scope — both sync endpoints and
//! the delete endpoint just need *some* already-resolved `owner_user_id` /
//! `viewer_user_id` to hand the service layer. This module gives that a
//! concrete, testable seam (an `api_keys` table + a literal Bearer token)
//! rather than a stub that always returns the same id, mirroring the
//! teacher's `AuthUser` extractor without reimplementing OAuth/device-code.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

use crate::error::ApiErr;
use crate::state::AppState;

pub fn hash_api_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Resolved owner for the API-key-authenticated sync endpoints. Always
/// required — missing or unrecognized key is `Unauthorized`.
pub struct ApiKeyAuth {
    pub owner_user_id: i64,
}

impl<S> FromRequestParts<S> for ApiKeyAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let raw_key = bearer_token(parts).ok_or_else(|| crate::error::unauthorized("missing API key"))?;
        let owner_user_id = app_state
            .resolve_api_key(&raw_key)
            .ok_or_else(|| crate::error::unauthorized("invalid API key"))?;
        Ok(ApiKeyAuth { owner_user_id })
    }
}

/// Resolved viewer for the (optionally authenticated) file-read endpoint.
/// A missing or invalid key is *not* an error here — it just means
/// unauthenticated, and the access resolver decides what that's worth.
pub struct OptionalViewer(pub Option<i64>);

impl<S> FromRequestParts<S> for OptionalViewer
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let viewer = bearer_token(parts).and_then(|key| app_state.resolve_api_key(&key));
        Ok(OptionalViewer(viewer))
    }
}

/// Resolved owner for the delete endpoint, authenticated via a session
/// cookie. The cookie carries the user id directly; issuance and refresh
/// of that cookie are handled by the surrounding web session layer, not
/// by this service.
pub struct SessionUser(pub i64);

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let cookie_header = parts
            .headers
            .get(axum::http::header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let user_id = cookie_header
            .split(';')
            .map(str::trim)
            .find_map(|kv| kv.strip_prefix("session_user_id="))
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(|| crate::error::unauthorized("missing or invalid session cookie"))?;

        Ok(SessionUser(user_id))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::to_string)
}
