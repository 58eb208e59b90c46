use super::error::ApiError;
use crate::model::TenantKey;
use crate::pipeline::DocumentApi;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use std::sync::Arc;

/// Tenant resolved from the request's bearer token.
#[derive(Debug, Clone)]
pub struct Caller(pub TenantKey);

#[async_trait]
impl<S> FromRequestParts<Arc<S>> for Caller
where
    S: DocumentApi + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<S>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::unauthenticated())?;
        let tenant = state.authenticate(bearer.token())?;
        Ok(Self(tenant))
    }
}
