//! Connection authentication extractor
//!
//! Browsers cannot set headers on a WebSocket handshake, so the token may come
//! either from `Authorization: Bearer` or from a `token` query parameter. The
//! header wins when both are present.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Query},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use relay_common::AppError;
use relay_core::UserId;
use serde::Deserialize;

use super::error::AdmissionError;
use super::GatewayState;

/// User admitted by token verification
#[derive(Debug, Clone, Copy)]
pub struct WsAuth {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for WsAuth
where
    S: Send + Sync,
    GatewayState: FromRef<S>,
{
    type Rejection = AdmissionError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header_token = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string());

        let token = match header_token {
            Some(token) => token,
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(query)| query.token)
                .filter(|token| !token.is_empty())
                .ok_or(AppError::MissingAuth)?,
        };

        let state = GatewayState::from_ref(state);
        let user_id = state.jwt_service().verify(&token).map_err(|e| {
            tracing::debug!(error = %e, "Connection token rejected");
            e
        })?;

        Ok(Self { user_id })
    }
}
