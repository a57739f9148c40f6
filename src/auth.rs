//! Caller identification
//!
//! Requests arrive through a gateway that has already authenticated the
//! user and forwards the identity in headers:
//! - `x-user-id`: numeric user id (required)
//! - `x-moderator`: `true` for moderator sessions

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::debug;

use crate::error::BountyError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const MODERATOR_HEADER: &str = "x-moderator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub is_moderator: bool,
}

impl Caller {
    pub fn can_manage(&self, owner_id: Option<i64>) -> bool {
        self.is_moderator || owner_id == Some(self.user_id)
    }
}

pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, BountyError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| BountyError::unauthorized("Missing user identity"))?;

    let user_id: i64 = raw.trim().parse().map_err(|_| {
        debug!("Rejected malformed user id header: {:?}", raw);
        BountyError::unauthorized("Malformed user identity")
    })?;

    let is_moderator = headers
        .get(MODERATOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

    Ok(Caller {
        user_id,
        is_moderator,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = BountyError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)
    }
}
