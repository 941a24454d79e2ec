//! Materializer + committer (C7): turns a checkpoint snapshot into a durable `Revision` and
//! updates the owning `Page`.

use crate::contracts::{NewRevision, PageFields, PageStore, RevisionStore};
use crate::error::Result;

/// Parse a checkpoint's opaque bytes into page fields.
///
/// The current wire format is JSON with an optional `blocks: [...]` array. A heading block
/// becomes the title, the first non-empty paragraph (truncated to 500 chars) becomes the
/// summary, and all blocks concatenate into markdown. Anything that fails to parse as that shape
/// falls back to treating the bytes as raw UTF-8 body text.
pub fn materialize(snapshot_bytes: &[u8]) -> PageFields {
    let Ok(text) = std::str::from_utf8(snapshot_bytes) else {
        return PageFields { title: String::new(), summary: String::new(), body: String::new(), body_format: "markdown".into() };
    };

    let parsed: Option<serde_json::Value> = serde_json::from_str(text).ok();
    let Some(blocks) = parsed.as_ref().and_then(|v| v.get("blocks")).and_then(|b| b.as_array()) else {
        return PageFields { title: String::new(), summary: String::new(), body: text.to_string(), body_format: "markdown".into() };
    };

    let mut title = String::new();
    let mut summary = String::new();
    let mut body = String::new();

    for block in blocks {
        let kind = block.get("type").and_then(|t| t.as_str()).unwrap_or("paragraph");
        let text = block.get("text").and_then(|t| t.as_str()).unwrap_or("");
        match kind {
            "heading" => {
                if title.is_empty() {
                    title = text.to_string();
                }
                body.push_str("## ");
                body.push_str(text);
                body.push('\n');
            }
            "code" => {
                body.push_str("```\n");
                body.push_str(text);
                body.push_str("\n```\n");
            }
            _ => {
                if summary.is_empty() && !text.trim().is_empty() {
                    summary = text.chars().take(500).collect();
                }
                body.push_str(text);
                body.push('\n');
            }
        }
    }

    PageFields { title, summary, body, body_format: "markdown".into() }
}

/// Commit the current checkpoint of `page_id` into a new `Revision`, then update the page's
/// committed fields. All-or-nothing: implementations of `PageStore`/`RevisionStore` are expected
/// to participate in a single transaction so a failure leaves no visible change.
pub async fn commit(
    page_store: &dyn PageStore,
    revision_store: &dyn RevisionStore,
    page_id: &str,
    author: &str,
    message: &str,
    checkpoint_bytes: &[u8],
) -> Result<i64> {
    let fields = materialize(checkpoint_bytes);

    let revision_id = revision_store
        .insert(NewRevision {
            page_id: page_id.to_string(),
            author: author.to_string(),
            note: message.to_string(),
            snapshot: fields.body.clone(),
            format: fields.body_format.clone(),
            opaque_update_bytes: Some(checkpoint_bytes.to_vec()),
        })
        .await?;

    page_store.apply_commit(page_id, author, &fields).await?;

    Ok(revision_id)
}
