//! Request extractors.

use crate::error::ApiError;
use crate::AppState;
use api_shared::auth::{authenticate, API_KEY_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use raccord_core::Caller;

/// JSON request body whose rejections answer 400 with the usual error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// The caller identified by the forwarded identity headers.
///
/// Rejects with 401 when the API key or identity headers are missing or invalid.
pub struct AuthenticatedCaller(pub Caller);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthenticatedCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = authenticate(
            state.cfg.api_key(),
            header(parts, API_KEY_HEADER),
            header(parts, USER_ID_HEADER),
            header(parts, USER_ROLE_HEADER),
        )?;
        Ok(Self(caller))
    }
}
