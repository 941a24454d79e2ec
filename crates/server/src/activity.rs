//! Fire-and-forget activity logging.

use async_trait::async_trait;
use braid_core::contracts::ActivityLog;
use tracing::info;

pub struct TracingActivityLog;

#[async_trait]
impl ActivityLog for TracingActivityLog {
    async fn log_commit(&self, user_id: &str, page_id: &str, slug: &str, title: &str, message: &str) {
        info!(user_id, page_id, slug, title, message, "page committed");
    }
}
