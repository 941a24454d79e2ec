//! External contracts the coordinator and committer depend on but never implement themselves.
//!
//! The core is deliberately ignorant of user identity, authorization policy, and the concrete
//! shape of durable page/revision storage — it only calls these traits. `crates/server` supplies
//! real implementations; a trivial allow-all `AuthzProvider` is provided here for standalone use.

use async_trait::async_trait;

use crate::error::Result;

/// Authorization contract: may `user` edit `page_id`?
#[async_trait]
pub trait AuthzProvider: Send + Sync + 'static {
    async fn ensure_can_edit(&self, user_id: &str, page_id: &str) -> Result<()>;
}

/// Fire-and-forget activity logging. Failures must never fail the calling operation.
#[async_trait]
pub trait ActivityLog: Send + Sync + 'static {
    async fn log_commit(&self, user_id: &str, page_id: &str, slug: &str, title: &str, message: &str);
}

/// The durable page this session materializes into.
#[derive(Debug, Clone, Default)]
pub struct PageFields {
    pub title: String,
    pub summary: String,
    pub body: String,
    pub body_format: String,
}

#[async_trait]
pub trait PageStore: Send + Sync + 'static {
    /// The page's last-committed body, used to seed a freshly (re)created session.
    async fn load_committed_content(&self, page_id: &str) -> Result<Option<String>>;

    /// Write the page's committed fields after a successful commit.
    async fn apply_commit(&self, page_id: &str, user_id: &str, fields: &PageFields) -> Result<()>;
}

/// A durable revision produced by a commit.
#[derive(Debug, Clone)]
pub struct NewRevision {
    pub page_id: String,
    pub author: String,
    pub note: String,
    pub snapshot: String,
    pub format: String,
    pub opaque_update_bytes: Option<Vec<u8>>,
}

#[async_trait]
pub trait RevisionStore: Send + Sync + 'static {
    /// Insert a revision and return its assigned id.
    async fn insert(&self, revision: NewRevision) -> Result<i64>;
}

/// Allow-all authorization, for standalone operation or tests.
pub struct AllowAllAuthz;

#[async_trait]
impl AuthzProvider for AllowAllAuthz {
    async fn ensure_can_edit(&self, _user_id: &str, _page_id: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allow_all_never_rejects() {
        let authz = AllowAllAuthz;
        assert!(authz.ensure_can_edit("anyone", "any-page").await.is_ok());
    }
}
