//! Authorization contract implementation.
//!
//! The spec places authorization *policy* outside the collaborative core (see `contracts::
//! AuthzProvider`); this crate ships only a trivial default so the server is runnable
//! standalone. A deployment with a real policy engine swaps this out without touching the
//! coordinator.

use async_trait::async_trait;
use braid_core::contracts::AuthzProvider;
use braid_core::error::Result;

/// Allows any authenticated user to edit any page. Authentication itself (verifying who the
/// caller is) happens upstream of [`crate::ctx::Ctx`]; this only gates the edit action.
pub struct DefaultAuthz;

#[async_trait]
impl AuthzProvider for DefaultAuthz {
    async fn ensure_can_edit(&self, _user_id: &str, _page_id: &str) -> Result<()> {
        Ok(())
    }
}
