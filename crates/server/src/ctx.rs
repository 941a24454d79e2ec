//! Request-scoped user identity. A real deployment would populate this from an upstream identity
//! provider's verified session; the spec treats authentication as external, so this crate only
//! needs somewhere to carry the already-authenticated user id through a request.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct Ctx {
    user_id: String,
}

impl Ctx {
    pub fn new(user_id: String) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        if let Some(ctx) = parts.extensions.get::<Ctx>() {
            return Ok(ctx.clone());
        }
        // Fallback used when no upstream identity middleware is installed: trust an `X-User-Id`
        // header. Standalone/demo mode only — a real deployment installs identity middleware
        // that inserts a verified `Ctx` into request extensions before this extractor runs.
        parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .map(|user_id| Ctx::new(user_id.to_string()))
            .ok_or(Error::AuthFailNoUser)
    }
}
