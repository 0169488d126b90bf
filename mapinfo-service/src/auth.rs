//! Optional bearer token authentication.
//!
//! Anonymous requests are accepted. When an `Authorization: Bearer <token>`
//! header is present the token is made available to handlers; it is not
//! validated here.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::convert::Infallible;

/// Identity attached to a request, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalAuth {
    token: Option<String>,
}

impl OptionalAuth {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer_token)
            .map(str::to_string);
        Ok(Self { token })
    }
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively.
pub fn extract_bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
