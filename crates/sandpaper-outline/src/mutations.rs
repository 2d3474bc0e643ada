//! Structural edits over a [`BlockStore`].
//!
//! Each function works out the full result first and then writes it with a
//! single splice, so a rejected request never leaves a partial edit behind.

use crate::blocks::{Block, BlockStore, BlockType};
use crate::outline::{subtree_end, Outline};
use std::ops::Range;

/// First and last index covered by the subtrees of `selected`.
pub fn subtree_span(blocks: &[Block], selected: &[usize]) -> Option<(usize, usize)> {
    let start = selected.iter().copied().min()?;
    if start >= blocks.len() {
        return None;
    }
    let end = selected
        .iter()
        .copied()
        .filter(|ix| *ix < blocks.len())
        .map(|ix| subtree_end(blocks, ix))
        .max()
        .unwrap_or(start);
    Some((start, end))
}

/// Last index of the rows that go along with `ix` when it is deleted,
/// duplicated or indented on its own.
///
/// A collapsed block carries its folded subtree. A column layout or column
/// carries the rows embedded in it. Any other block stands alone, even when
/// it is embedded and its own children are hidden by the layout.
pub fn hidden_run_end(blocks: &[Block], outline: &Outline, ix: usize) -> usize {
    let Some(block) = blocks.get(ix) else {
        return ix;
    };
    let collapsed = outline.item(ix).is_some_and(|item| item.collapsed);
    let container = matches!(block.block_type, BlockType::ColumnLayout | BlockType::Column);
    if collapsed || container {
        subtree_end(blocks, ix)
    } else {
        ix
    }
}

/// `selected` plus the rows folded or embedded under them, sorted.
pub fn with_hidden_descendants(blocks: &[Block], outline: &Outline, selected: &[usize]) -> Vec<usize> {
    let mut all: Vec<usize> = Vec::with_capacity(selected.len());
    for &ix in selected {
        if ix >= blocks.len() {
            continue;
        }
        all.extend(ix..=hidden_run_end(blocks, outline, ix));
    }
    all.sort_unstable();
    all.dedup();
    all
}

/// Splits at a byte offset, backing off to the nearest char boundary.
pub fn split_text(text: &str, cursor: usize) -> (String, String) {
    let mut cursor = cursor.min(text.len());
    while cursor > 0 && !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    (text[..cursor].to_string(), text[cursor..].to_string())
}

pub fn insert_at<S: BlockStore + ?Sized>(store: &mut S, ix: usize, block: Block) -> Option<usize> {
    if ix > store.len() {
        return None;
    }
    store.splice(ix..ix, vec![block]);
    Some(ix)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Block that should receive focus.
    pub focus_uid: String,
    /// True when the whole document was removed and replaced by `replacement`.
    pub replaced_document: bool,
}

/// Removes `start..=end`. Removing everything leaves `replacement()` as the
/// only block.
pub fn delete_span<S: BlockStore + ?Sized>(
    store: &mut S,
    start: usize,
    end: usize,
    replacement: impl FnOnce() -> Block,
) -> Option<DeleteOutcome> {
    let len = store.len();
    if start > end || end >= len {
        return None;
    }

    if start == 0 && end + 1 == len {
        let block = replacement();
        let focus_uid = block.uid.clone();
        store.splice(0..len, vec![block]);
        return Some(DeleteOutcome {
            focus_uid,
            replaced_document: true,
        });
    }

    let blocks = store.blocks();
    let focus = blocks
        .get(end + 1)
        .or_else(|| start.checked_sub(1).and_then(|ix| blocks.get(ix)))?;
    let focus_uid = focus.uid.clone();
    store.splice(start..end + 1, Vec::new());
    Some(DeleteOutcome {
        focus_uid,
        replaced_document: false,
    })
}

/// Shifts each listed block by `delta`, clamping at zero.
pub fn adjust_indents<S: BlockStore + ?Sized>(store: &mut S, indices: &[usize], delta: i64) -> bool {
    if delta == 0 {
        return false;
    }
    let mut changed = false;
    for &ix in indices {
        let Some(block) = store.blocks().get(ix) else {
            continue;
        };
        let next = (block.indent + delta).max(0);
        changed |= store.set_indent(ix, next);
    }
    changed
}

/// Clones `start..=end` directly after `end`. Returns where the clones landed.
pub fn duplicate_span<S: BlockStore + ?Sized>(
    store: &mut S,
    start: usize,
    end: usize,
    mut clone: impl FnMut(&Block) -> Block,
) -> Option<Range<usize>> {
    if start > end || end >= store.len() {
        return None;
    }
    let clones: Vec<Block> = store.blocks()[start..=end].iter().map(&mut clone).collect();
    let insert_at = end + 1;
    let count = clones.len();
    store.splice(insert_at..insert_at, clones);
    Some(insert_at..insert_at + count)
}

/// Moves `start..=end` so it sits right before `insert_before` (an index in
/// the current sequence, `len` meaning "at the end") and shifts the moved
/// indents by `indent_delta`.
///
/// Rejected when the insertion point falls inside the span, or when nothing
/// would change.
pub fn relocate_span<S: BlockStore + ?Sized>(
    store: &mut S,
    start: usize,
    end: usize,
    insert_before: usize,
    indent_delta: i64,
) -> bool {
    let blocks = store.blocks();
    let len = blocks.len();
    if start > end || end >= len || insert_before > len {
        return false;
    }
    if insert_before > start && insert_before <= end {
        return false;
    }

    let mut segment = blocks[start..=end].to_vec();
    let mut indent_changed = false;
    if indent_delta != 0 {
        for block in &mut segment {
            let next = (block.indent + indent_delta).max(0);
            indent_changed |= next != block.indent;
            block.indent = next;
        }
    }
    let moves = insert_before < start || insert_before > end + 1;
    if !moves && !indent_changed {
        return false;
    }

    if !moves {
        store.splice(start..end + 1, segment);
    } else if insert_before < start {
        let mut content = segment;
        content.extend_from_slice(&blocks[insert_before..start]);
        store.splice(insert_before..end + 1, content);
    } else {
        let mut content = blocks[end + 1..insert_before].to_vec();
        content.extend(segment);
        store.splice(start..insert_before, content);
    }
    true
}

/// Insertion point for moving `start..=end` one visible step up or down.
///
/// Down: after the whole subtree of the next visible row. Up: before the
/// largest subtree that ends right above the span and contains the previous
/// visible row, so a step down followed by a step up lands back in place.
pub fn step_move_target(
    blocks: &[Block],
    outline: &Outline,
    start: usize,
    end: usize,
    direction: i32,
) -> Option<usize> {
    if direction > 0 {
        let next = outline.next_visible_after(end)?;
        return Some(subtree_end(blocks, next) + 1);
    }
    if direction < 0 {
        let prev = outline.previous_visible_before(start)?;
        let mut target = prev;
        let mut current = outline.parent_of(prev);
        while let Some(ancestor) = current {
            if subtree_end(blocks, ancestor) >= start {
                break;
            }
            target = ancestor;
            current = outline.parent_of(ancestor);
        }
        return Some(target);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn block(uid: &str, indent: i64) -> Block {
        Block::new(uid, uid, indent)
    }

    fn uids(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().map(|block| block.uid.as_str()).collect()
    }

    fn flat(count: usize) -> Vec<Block> {
        (1..=count).map(|ix| block(&format!("b{ix}"), 0)).collect()
    }

    #[test]
    fn subtree_span_unions_subtrees() {
        let blocks = vec![block("a", 0), block("b", 0), block("b1", 1), block("c", 0)];
        assert_eq!(subtree_span(&blocks, &[0, 1]), Some((0, 2)));
        assert_eq!(subtree_span(&blocks, &[]), None);
    }

    #[test]
    fn with_hidden_descendants_pulls_in_folded_rows() {
        let blocks = vec![block("a", 0), block("a1", 1), block("a2", 2), block("b", 0)];
        let outline = Outline::build(&blocks, &HashSet::from(["a".to_string()]));
        assert_eq!(with_hidden_descendants(&blocks, &outline, &[0, 3]), vec![0, 1, 2, 3]);
        let open = Outline::build(&blocks, &HashSet::new());
        assert_eq!(with_hidden_descendants(&blocks, &open, &[0]), vec![0]);
    }

    #[test]
    fn with_hidden_descendants_covers_column_layouts() {
        let blocks = vec![
            block("layout", 0).with_type(BlockType::ColumnLayout),
            block("col", 1).with_type(BlockType::Column),
            block("child", 2),
            block("after", 0),
        ];
        let outline = Outline::build(&blocks, &HashSet::new());
        assert_eq!(with_hidden_descendants(&blocks, &outline, &[0]), vec![0, 1, 2]);
        assert_eq!(with_hidden_descendants(&blocks, &outline, &[1]), vec![1, 2]);
    }

    #[test]
    fn embedded_rows_do_not_carry_their_children() {
        let blocks = vec![
            block("layout", 0).with_type(BlockType::ColumnLayout),
            block("col", 1).with_type(BlockType::Column),
            block("c1", 2),
            block("c1a", 3),
            block("after", 0),
        ];
        let outline = Outline::build(&blocks, &HashSet::new());
        assert!(outline.is_hidden(3));
        assert_eq!(hidden_run_end(&blocks, &outline, 2), 2);

        let folded = Outline::build(&blocks, &HashSet::from(["c1".to_string()]));
        assert_eq!(hidden_run_end(&blocks, &folded, 2), 3);
    }

    #[test]
    fn split_text_respects_char_boundaries() {
        assert_eq!(split_text("hello", 2), ("he".to_string(), "llo".to_string()));
        assert_eq!(split_text("héllo", 2), ("h".to_string(), "éllo".to_string()));
        assert_eq!(split_text("hi", 9), ("hi".to_string(), String::new()));
    }

    #[test]
    fn delete_span_focuses_next_then_previous() {
        let mut blocks = flat(3);
        let outcome = delete_span(&mut blocks, 0, 0, || block("fresh", 0)).expect("delete");
        assert_eq!(outcome.focus_uid, "b2");
        assert_eq!(uids(&blocks), vec!["b2", "b3"]);

        let outcome = delete_span(&mut blocks, 1, 1, || block("fresh", 0)).expect("delete");
        assert_eq!(outcome.focus_uid, "b2");
        assert_eq!(uids(&blocks), vec!["b2"]);
    }

    #[test]
    fn delete_span_replaces_whole_document() {
        let mut blocks = flat(2);
        let outcome = delete_span(&mut blocks, 0, 1, || block("fresh", 0)).expect("delete");
        assert!(outcome.replaced_document);
        assert_eq!(outcome.focus_uid, "fresh");
        assert_eq!(uids(&blocks), vec!["fresh"]);
    }

    #[test]
    fn delete_span_rejects_out_of_range() {
        let mut blocks = flat(2);
        assert!(delete_span(&mut blocks, 1, 5, || block("fresh", 0)).is_none());
        assert!(delete_span(&mut blocks, 1, 0, || block("fresh", 0)).is_none());
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn adjust_indents_clamps_at_zero() {
        let mut blocks = vec![block("a", 0), block("b", 1)];
        assert!(adjust_indents(&mut blocks, &[0, 1], -1));
        assert_eq!(blocks[0].indent, 0);
        assert_eq!(blocks[1].indent, 0);
        assert!(!adjust_indents(&mut blocks, &[0, 1], -1));
    }

    #[test]
    fn duplicate_span_inserts_clones_after_run() {
        let mut blocks = vec![block("a", 0), block("b", 1), block("c", 0)];
        let range = duplicate_span(&mut blocks, 0, 1, |source| {
            Block::new(format!("{}-copy", source.uid), source.text.clone(), source.indent)
        })
        .expect("duplicate");
        assert_eq!(range, 2..4);
        assert_eq!(uids(&blocks), vec!["a", "b", "a-copy", "b-copy", "c"]);
        assert_eq!(blocks[3].indent, 1);
    }

    #[test]
    fn relocate_span_moves_down_and_up() {
        let mut blocks = flat(5);
        assert!(relocate_span(&mut blocks, 1, 2, 4, 0));
        assert_eq!(uids(&blocks), vec!["b1", "b4", "b2", "b3", "b5"]);
        assert!(relocate_span(&mut blocks, 2, 3, 1, 0));
        assert_eq!(uids(&blocks), vec!["b1", "b2", "b3", "b4", "b5"]);
        assert!(relocate_span(&mut blocks, 0, 0, 5, 0));
        assert_eq!(uids(&blocks), vec!["b2", "b3", "b4", "b5", "b1"]);
    }

    #[test]
    fn relocate_span_rejects_inside_and_noop() {
        let mut blocks = flat(4);
        assert!(!relocate_span(&mut blocks, 1, 2, 2, 0));
        assert!(!relocate_span(&mut blocks, 1, 2, 1, 0));
        assert!(!relocate_span(&mut blocks, 1, 2, 3, 0));
        assert!(!relocate_span(&mut blocks, 1, 2, 9, 0));
        assert_eq!(uids(&blocks), vec!["b1", "b2", "b3", "b4"]);
    }

    #[test]
    fn relocate_span_applies_indent_delta_in_place() {
        let mut blocks = vec![block("a", 0), block("b", 0), block("b1", 1)];
        assert!(relocate_span(&mut blocks, 1, 2, 1, 1));
        assert_eq!(blocks[1].indent, 1);
        assert_eq!(blocks[2].indent, 2);
    }

    #[test]
    fn step_move_target_skips_hidden_rows() {
        let blocks = vec![block("a", 0), block("b", 0), block("b1", 1), block("c", 0)];
        let outline = Outline::build(&blocks, &HashSet::from(["b".to_string()]));
        assert_eq!(step_move_target(&blocks, &outline, 0, 0, 1), Some(3));
        assert_eq!(step_move_target(&blocks, &outline, 3, 3, -1), Some(1));
        assert_eq!(step_move_target(&blocks, &outline, 3, 3, 1), None);
        assert_eq!(step_move_target(&blocks, &outline, 0, 0, -1), None);
    }

    #[test]
    fn step_up_jumps_over_expanded_sibling_subtree() {
        let blocks = vec![block("n", 0), block("n1", 1), block("s", 0)];
        let outline = Outline::build(&blocks, &HashSet::new());
        assert_eq!(step_move_target(&blocks, &outline, 2, 2, -1), Some(0));
    }

    #[test]
    fn step_up_from_first_child_goes_before_parent() {
        let blocks = vec![block("r", 0), block("n", 1), block("s", 2)];
        let outline = Outline::build(&blocks, &HashSet::new());
        assert_eq!(step_move_target(&blocks, &outline, 2, 2, -1), Some(1));
    }
}
