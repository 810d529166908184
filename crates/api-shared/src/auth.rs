//! Caller authentication.
//!
//! Identity is established by the upstream authentication layer and forwarded as headers. This
//! module only checks the optional API key and parses the forwarded identity.

use raccord_core::{Caller, RecordId, Role};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("invalid {header} header: {reason}")]
    InvalidHeader {
        header: &'static str,
        reason: String,
    },
}

/// Validates the provided API key against the configured one.
///
/// With no key configured every request passes.
pub fn validate_api_key(expected: Option<&str>, provided: Option<&str>) -> Result<(), AuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match provided {
        None => Err(AuthError::MissingApiKey),
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(AuthError::InvalidApiKey),
    }
}

/// Checks the API key, then builds the caller from the forwarded identity headers.
pub fn authenticate(
    expected_api_key: Option<&str>,
    api_key: Option<&str>,
    user_id: Option<&str>,
    user_role: Option<&str>,
) -> Result<Caller, AuthError> {
    validate_api_key(expected_api_key, api_key)?;

    let user_id = user_id.ok_or(AuthError::MissingHeader(USER_ID_HEADER))?;
    let id = RecordId::parse(user_id).map_err(|e| AuthError::InvalidHeader {
        header: USER_ID_HEADER,
        reason: e.to_string(),
    })?;
    let role: Role = user_role
        .ok_or(AuthError::MissingHeader(USER_ROLE_HEADER))?
        .parse()
        .map_err(|e: raccord_core::RaccordError| AuthError::InvalidHeader {
            header: USER_ROLE_HEADER,
            reason: e.to_string(),
        })?;

    Ok(Caller::new(id.uuid(), role))
}
