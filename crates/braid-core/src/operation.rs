//! The operation model (C1): Insert/Delete/Replace edits over a plain-text document.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CollabError, Result};

/// A single edit, in one of three shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OperationKind {
    Insert { position: usize, content: String },
    Delete { position: usize, length: usize, deleted_content: Option<String> },
    Replace {
        selection_start: usize,
        selection_end: usize,
        new_content: String,
        original_content: Option<String>,
    },
}

/// An operation plus the bookkeeping the coordinator needs to order and acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_id: String,
    pub user_id: String,
    pub kind: OperationKind,
    pub client_timestamp_ms: i64,
    pub expected_sequence_number: u64,
    pub server_sequence_number: u64,
    pub server_timestamp_ms: Option<i64>,
    pub retry_count: u32,
}

impl Operation {
    pub fn new(user_id: impl Into<String>, kind: OperationKind, expected_sequence_number: u64, client_timestamp_ms: i64) -> Self {
        Self {
            operation_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            kind,
            client_timestamp_ms,
            expected_sequence_number,
            server_sequence_number: 0,
            server_timestamp_ms: None,
            retry_count: 0,
        }
    }

    /// Structural validity, independent of any document content.
    pub fn is_well_formed(&self) -> bool {
        match &self.kind {
            OperationKind::Insert { content, .. } => !content.is_empty(),
            OperationKind::Delete { length, .. } => *length > 0,
            OperationKind::Replace { selection_start, selection_end, new_content, .. } => {
                selection_end >= selection_start && (selection_end > selection_start || !new_content.is_empty())
            }
        }
    }

    /// Whether this operation's referenced positions lie within `content`.
    pub fn can_apply_to(&self, content: &str) -> bool {
        let len = content.chars().count();
        match &self.kind {
            OperationKind::Insert { position, .. } => *position <= len,
            OperationKind::Delete { position, length, .. } => position + length <= len,
            OperationKind::Replace { selection_start, selection_end, .. } => *selection_end <= len,
        }
    }

    /// Apply this operation to `content`, returning the new content.
    ///
    /// Positions are character offsets, not byte offsets, since the wire protocol exchanges
    /// plain-text cursor positions with clients that do not know about UTF-8 byte boundaries.
    pub fn apply(&self, content: &str) -> Result<String> {
        if !self.is_well_formed() {
            return Err(CollabError::BadOperation(format!("malformed operation {}", self.operation_id)));
        }
        if !self.can_apply_to(content) {
            return Err(CollabError::BadOperation(format!(
                "operation {} out of bounds for content of length {}",
                self.operation_id,
                content.chars().count()
            )));
        }
        let chars: Vec<char> = content.chars().collect();
        let result: String = match &self.kind {
            OperationKind::Insert { position, content: insert } => {
                let mut out: String = chars[..*position].iter().collect();
                out.push_str(insert);
                out.push_str(&chars[*position..].iter().collect::<String>());
                out
            }
            OperationKind::Delete { position, length, .. } => {
                let mut out: String = chars[..*position].iter().collect();
                out.push_str(&chars[position + length..].iter().collect::<String>());
                out
            }
            OperationKind::Replace { selection_start, selection_end, new_content, .. } => {
                let mut out: String = chars[..*selection_start].iter().collect();
                out.push_str(new_content);
                out.push_str(&chars[*selection_end..].iter().collect::<String>());
                out
            }
        };
        Ok(result)
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            OperationKind::Insert { .. } => "insert",
            OperationKind::Delete { .. } => "delete",
            OperationKind::Replace { .. } => "replace",
        }
    }

    /// True once transform has reduced this operation to a no-op (empty insert or shrunk-to-zero
    /// delete/replace). Such operations are dropped rather than applied.
    pub fn is_noop(&self) -> bool {
        match &self.kind {
            OperationKind::Insert { content, .. } => content.is_empty(),
            OperationKind::Delete { length, .. } => *length == 0,
            OperationKind::Replace { selection_start, selection_end, new_content, .. } => {
                selection_start == selection_end && new_content.is_empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(pos: usize, s: &str) -> Operation {
        Operation::new("u1", OperationKind::Insert { position: pos, content: s.to_string() }, 0, 0)
    }

    fn delete(pos: usize, len: usize) -> Operation {
        Operation::new("u1", OperationKind::Delete { position: pos, length: len, deleted_content: None }, 0, 0)
    }

    fn replace(start: usize, end: usize, s: &str) -> Operation {
        Operation::new(
            "u1",
            OperationKind::Replace {
                selection_start: start,
                selection_end: end,
                new_content: s.to_string(),
                original_content: None,
            },
            0,
            0,
        )
    }

    #[test]
    fn insert_grows_by_content_length() {
        let op = insert(2, "XY");
        let out = op.apply("abcd").unwrap();
        assert_eq!(out, "abXYcd");
        assert_eq!(out.chars().count(), 4 + 2);
    }

    #[test]
    fn delete_shrinks_by_length() {
        let op = delete(1, 2);
        let out = op.apply("abcd").unwrap();
        assert_eq!(out, "ad");
        assert_eq!(out.chars().count(), 4 - 2);
    }

    #[test]
    fn replace_adjusts_by_delta() {
        let op = replace(0, 2, "XYZ");
        let out = op.apply("abcd").unwrap();
        assert_eq!(out, "XYZcd");
        assert_eq!(out.chars().count(), 4 - 2 + 3);
    }

    #[test]
    fn insert_past_end_is_rejected() {
        let op = insert(10, "x");
        assert!(op.apply("abcd").is_err());
    }

    #[test]
    fn empty_insert_is_malformed() {
        let op = insert(0, "");
        assert!(!op.is_well_formed());
    }

    #[test]
    fn zero_length_delete_is_malformed() {
        let op = delete(0, 0);
        assert!(!op.is_well_formed());
    }

    #[test]
    fn replace_with_empty_selection_and_content_is_malformed() {
        let op = replace(2, 2, "");
        assert!(!op.is_well_formed());
    }

    #[test]
    fn replace_with_empty_selection_and_new_content_degenerates_to_insert_semantics() {
        let op = replace(2, 2, "x");
        assert!(op.is_well_formed());
        let out = op.apply("abcd").unwrap();
        assert_eq!(out, "abxcd");
    }
}
