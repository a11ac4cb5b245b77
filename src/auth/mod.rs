use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::SharedState;

/// Compare secrets without leaking a timing side channel.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Guard for the operator/monitoring API: a static admin bearer token
/// from configuration. The dashboard's own user auth lives in front of
/// this service.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

impl FromRequestParts<SharedState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized("Missing bearer token".to_string()))?;

        if constant_time_eq(bearer.token().as_bytes(), state.config.admin_token.as_bytes()) {
            Ok(AdminAuth)
        } else {
            Err(AppError::Unauthorized("Invalid admin token".to_string()))
        }
    }
}
