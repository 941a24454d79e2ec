//! The transform engine (C2): pure operational-transformation rules.
//!
//! `transform(op, other)` produces the form `op` must take when replayed *after* `other` has
//! already been applied. Ties are always broken by `other.server_sequence_number` — never by
//! client timestamp, since clock skew across clients makes timestamp ordering non-deterministic
//! from the server's point of view.

use crate::operation::{Operation, OperationKind};

/// Transform `op` against an already-applied `other`. Returns `None` if `op` becomes a no-op or
/// otherwise unrecoverable (e.g. a delete whose entire range was already removed).
pub fn transform(op: &Operation, other: &Operation) -> Option<Operation> {
    let mut out = op.clone();
    out.kind = transform_kind(&op.kind, &other.kind, op.server_sequence_number, other.server_sequence_number)?;
    Some(out)
}

/// Transform `op` sequentially against every entry of `history` whose `server_sequence_number`
/// exceeds `op.expected_sequence_number`, in ascending order. Returns `None` if the operation is
/// dropped at any step.
pub fn transform_against_history<'a>(op: &Operation, history: impl IntoIterator<Item = &'a Operation>) -> Option<Operation> {
    let mut current = op.clone();
    let mut tail: Vec<&Operation> = history
        .into_iter()
        .filter(|h| h.server_sequence_number > op.expected_sequence_number)
        .collect();
    tail.sort_by_key(|h| h.server_sequence_number);
    for h in tail {
        current = transform(&current, h)?;
    }
    Some(current)
}

fn transform_kind(a: &OperationKind, b: &OperationKind, a_seq: u64, b_seq: u64) -> Option<OperationKind> {
    use OperationKind::*;
    match (a, b) {
        (Insert { position, content }, Insert { position: bp, content: bc }) => {
            let shift = bc.chars().count();
            let new_pos = if *bp < *position || (*bp == *position && b_seq < a_seq) {
                position + shift
            } else {
                *position
            };
            Some(Insert { position: new_pos, content: content.clone() })
        }

        (Insert { position, content }, Delete { position: bp, length, .. }) => {
            let del_end = bp + length;
            let new_pos = if del_end <= *position {
                position.saturating_sub(*length)
            } else if *bp < *position {
                *bp
            } else {
                *position
            };
            Some(Insert { position: new_pos, content: content.clone() })
        }

        (Insert { position, content }, Replace { selection_start, selection_end, new_content, .. }) => {
            let del_len = selection_end - selection_start;
            let ins_len = new_content.chars().count();
            let new_pos = if *selection_end <= *position {
                (position + ins_len).saturating_sub(del_len)
            } else if *selection_start < *position {
                *selection_start + ins_len
            } else {
                *position
            };
            Some(Insert { position: new_pos, content: content.clone() })
        }

        (Delete { position, length, deleted_content }, Insert { position: bp, content: bc }) => {
            let shift = bc.chars().count();
            let new_pos = if *bp <= *position {
                position + shift
            } else if *bp < position + length {
                // insertion lands inside the delete range: widen it.
                return Some(Delete {
                    position: *position,
                    length: length + shift,
                    deleted_content: deleted_content.clone(),
                });
            } else {
                *position
            };
            Some(Delete { position: new_pos, length: *length, deleted_content: deleted_content.clone() })
        }

        (Delete { position, length, deleted_content }, Delete { position: bp, length: blen, .. }) => {
            let a_start = *position;
            let a_end = position + length;
            let b_start = *bp;
            let b_end = bp + blen;

            if b_end <= a_start {
                Some(Delete { position: a_start - blen, length: *length, deleted_content: deleted_content.clone() })
            } else if b_start >= a_end {
                Some(Delete { position: a_start, length: *length, deleted_content: deleted_content.clone() })
            } else {
                // Overlap: shrink `a` by the portion `b` already removed.
                let overlap_start = a_start.max(b_start);
                let overlap_end = a_end.min(b_end);
                let overlap = overlap_end.saturating_sub(overlap_start);
                let remaining = length.saturating_sub(overlap);
                let new_pos = if a_start >= b_start { b_start } else { a_start };
                if remaining == 0 {
                    None
                } else {
                    Some(Delete { position: new_pos, length: remaining, deleted_content: None })
                }
            }
        }

        (Delete { position, length, deleted_content }, Replace { selection_start, selection_end, new_content, .. }) => {
            let synthetic_delete = Delete {
                position: *selection_start,
                length: selection_end - selection_start,
                deleted_content: None,
            };
            let after_delete = transform_kind(
                &Delete { position: *position, length: *length, deleted_content: deleted_content.clone() },
                &synthetic_delete,
                a_seq,
                b_seq,
            )?;
            let ins_len = new_content.chars().count();
            if ins_len == 0 {
                return Some(after_delete);
            }
            let synthetic_insert = Insert { position: *selection_start, content: new_content.clone() };
            transform_kind(&after_delete, &synthetic_insert, a_seq, b_seq)
        }

        (Replace { selection_start, selection_end, new_content, original_content }, Insert { .. }) => {
            let as_delete = Delete { position: *selection_start, length: selection_end - selection_start, deleted_content: None };
            let transformed = transform_kind(&as_delete, b, a_seq, b_seq)?;
            if let Delete { position, length, .. } = transformed {
                Some(Replace {
                    selection_start: position,
                    selection_end: position + length,
                    new_content: new_content.clone(),
                    original_content: original_content.clone(),
                })
            } else {
                None
            }
        }

        (Replace { selection_start, selection_end, new_content, original_content }, Delete { .. }) => {
            let as_delete = Delete { position: *selection_start, length: selection_end - selection_start, deleted_content: None };
            let transformed = transform_kind(&as_delete, b, a_seq, b_seq)?;
            match transformed {
                Delete { position, length, .. } => Some(Replace {
                    selection_start: position,
                    selection_end: position + length,
                    new_content: new_content.clone(),
                    original_content: original_content.clone(),
                }),
                _ => None,
            }
        }

        (
            Replace { selection_start, selection_end, new_content, .. },
            Replace { selection_start: bs, selection_end: be, new_content: b_new, .. },
        ) => {
            let overlaps = *selection_start < *be && *bs < *selection_end;
            if !overlaps {
                let as_delete = Delete { position: *selection_start, length: selection_end - selection_start, deleted_content: None };
                let transformed = transform_kind(&as_delete, b, a_seq, b_seq)?;
                if let Delete { position, length, .. } = transformed {
                    return Some(Replace {
                        selection_start: position,
                        selection_end: position + length,
                        new_content: new_content.clone(),
                        original_content: None,
                    });
                }
                return None;
            }
            // Overlapping Replace vs Replace: lower server sequence wins outright. The loser
            // degrades to an Insert of its own new content, placed immediately after the
            // winner's inserted text, so neither user's intent is silently discarded.
            if a_seq < b_seq {
                Some(Replace {
                    selection_start: *selection_start,
                    selection_end: *selection_end,
                    new_content: new_content.clone(),
                    original_content: None,
                })
            } else {
                let winner_end = bs + b_new.chars().count();
                if new_content.is_empty() {
                    None
                } else {
                    Some(Insert { position: winner_end, content: new_content.clone() })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;

    fn op(seq: u64, kind: OperationKind) -> Operation {
        let mut o = Operation::new("u", kind, 0, 0);
        o.server_sequence_number = seq;
        o
    }

    fn insert(seq: u64, pos: usize, s: &str) -> Operation {
        op(seq, OperationKind::Insert { position: pos, content: s.into() })
    }

    fn delete(seq: u64, pos: usize, len: usize) -> Operation {
        op(seq, OperationKind::Delete { position: pos, length: len, deleted_content: None })
    }

    fn replace(seq: u64, start: usize, end: usize, s: &str) -> Operation {
        op(
            seq,
            OperationKind::Replace { selection_start: start, selection_end: end, new_content: s.into(), original_content: None },
        )
    }

    #[test]
    fn scenario_concurrent_inserts_same_position() {
        // "AB" -> A: Insert(1, "X") seq=1 -> "AXB"
        let a = insert(1, 1, "X");
        let b = insert(0, 1, "Y"); // B's original op, not yet sequenced
        let transformed_b = transform(&b, &a).unwrap();
        let content = a.apply("AB").unwrap();
        let content = transformed_b.apply(&content).unwrap();
        assert_eq!(content, "AXYB");
    }

    #[test]
    fn scenario_delete_overlapping_insert() {
        // "ABCDE", A: Delete(1,3) seq=1 -> "AE". B: Insert(3, "X") lands inside deleted range.
        let a = delete(1, 1, 3);
        let b = insert(0, 3, "X");
        let transformed_b = transform(&b, &a).unwrap();
        let content = a.apply("ABCDE").unwrap();
        let content = transformed_b.apply(&content).unwrap();
        assert_eq!(content, "AXE");
    }

    #[test]
    fn scenario_conflicting_replaces() {
        // "Hello world". A: Replace(0,5,"Howdy") seq=1. B: Replace(0,5,"Yo") loses, degrades to Insert.
        let a = replace(1, 0, 5, "Howdy");
        let b = replace(0, 0, 5, "Yo");
        let transformed_b = transform(&b, &a).unwrap();
        let content = a.apply("Hello world").unwrap();
        let content = transformed_b.apply(&content).unwrap();
        assert_eq!(content, "HowdyYo world");
    }

    #[test]
    fn insert_insert_commute_for_independent_positions() {
        let a = insert(1, 5, "A");
        let b = insert(2, 0, "B");
        let content = "0123456789";
        let ab = {
            let t_b = transform(&b, &a).unwrap();
            let c1 = a.apply(content).unwrap();
            t_b.apply(&c1).unwrap()
        };
        let ba = {
            let t_a = transform(&a, &b).unwrap();
            let c1 = b.apply(content).unwrap();
            t_a.apply(&c1).unwrap()
        };
        assert_eq!(ab, ba);
    }

    #[test]
    fn delete_delete_disjoint_commute() {
        let a = delete(1, 0, 2);
        let b = delete(2, 5, 2);
        let content = "0123456789";
        let ab = {
            let t_b = transform(&b, &a).unwrap();
            let c1 = a.apply(content).unwrap();
            t_b.apply(&c1).unwrap()
        };
        let ba = {
            let t_a = transform(&a, &b).unwrap();
            let c1 = b.apply(content).unwrap();
            t_a.apply(&c1).unwrap()
        };
        assert_eq!(ab, ba);
    }

    #[test]
    fn transform_against_history_only_considers_later_entries() {
        let history = vec![delete(1, 0, 1), insert(2, 0, "Z")];
        let incoming = insert(0, 5, "Q");
        let mut incoming_with_expected = incoming.clone();
        incoming_with_expected.expected_sequence_number = 0;
        let result = transform_against_history(&incoming_with_expected, &history).unwrap();
        // delete(0,1) shifts position left by 1, then insert(0,"Z") shifts it right by 1: net unchanged.
        if let OperationKind::Insert { position, .. } = result.kind {
            assert_eq!(position, 5);
        } else {
            panic!("expected insert");
        }
    }
}
