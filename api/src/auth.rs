//! Bearer credential extraction

use crate::{ApiError, ApiState};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use points_core::AccountId;
use points_economy::EconomyError;

/// The account behind the request's `Authorization: Bearer` credential
#[derive(Debug, Clone)]
pub struct Caller(pub AccountId);

impl FromRequestParts<ApiState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(EconomyError::Unauthenticated)?;

        let account = state.identity.resolve_caller(credential)?;
        Ok(Caller(account))
    }
}
