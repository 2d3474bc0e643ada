//! Column layouts render their `column` children side by side, with each
//! column's descendants listed inside it. The outline hides all of those rows;
//! this module is the projection the layout renderer reads instead.

use crate::blocks::{Block, BlockType};
use crate::outline::{has_children, subtree_end, Outline};
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRowPreview {
    pub uid: String,
    pub actual_ix: usize,
    /// Nesting below the column: direct children are depth 0.
    pub depth: i64,
    pub collapsed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnPreview {
    pub uid: String,
    pub actual_ix: usize,
    pub label: String,
    pub rows: Vec<ColumnRowPreview>,
}

pub fn is_column_layout(blocks: &[Block], ix: usize) -> bool {
    blocks
        .get(ix)
        .is_some_and(|block| matches!(block.block_type, BlockType::ColumnLayout))
}

pub fn build_column_preview(
    blocks: &[Block],
    layout_ix: usize,
    collapsed: &HashSet<String>,
) -> Vec<ColumnPreview> {
    if !is_column_layout(blocks, layout_ix) {
        return Vec::new();
    }
    let layout_indent = blocks[layout_ix].indent;
    let mut columns: Vec<ColumnPreview> = Vec::new();

    let mut ix = layout_ix + 1;
    while ix < blocks.len() {
        let current = &blocks[ix];
        if current.indent <= layout_indent {
            break;
        }

        if current.indent == layout_indent + 1 && matches!(current.block_type, BlockType::Column) {
            let label = if current.text.trim().is_empty() {
                format!("Column {}", columns.len() + 1)
            } else {
                current.text.lines().next().unwrap_or_default().trim().to_string()
            };

            let column_indent = current.indent;
            let mut rows = Vec::new();
            let mut folded_below: Option<i64> = None;
            let mut row_ix = ix + 1;
            while row_ix < blocks.len() {
                let child = &blocks[row_ix];
                if child.indent <= column_indent {
                    break;
                }
                if let Some(limit) = folded_below {
                    if child.indent > limit {
                        row_ix += 1;
                        continue;
                    }
                    folded_below = None;
                }

                let is_collapsed = collapsed.contains(&child.uid)
                    && (has_children(blocks, row_ix)
                        || child.block_type.is_foldable_without_children());
                if is_collapsed {
                    folded_below = Some(child.indent);
                }
                rows.push(ColumnRowPreview {
                    uid: child.uid.clone(),
                    actual_ix: row_ix,
                    depth: (child.indent - column_indent - 1).max(0),
                    collapsed: is_collapsed,
                });
                row_ix += 1;
            }

            columns.push(ColumnPreview {
                uid: current.uid.clone(),
                actual_ix: ix,
                label,
                rows,
            });
            ix = row_ix;
            continue;
        }

        ix += 1;
    }

    columns
}

/// Where a new column goes (end of the layout) and how many columns exist.
pub fn column_insert_point(blocks: &[Block], layout_ix: usize) -> Option<(usize, usize)> {
    if !is_column_layout(blocks, layout_ix) {
        return None;
    }
    let layout_indent = blocks[layout_ix].indent;
    let column_count = blocks[layout_ix + 1..]
        .iter()
        .take_while(|block| block.indent > layout_indent)
        .filter(|block| {
            block.indent == layout_indent + 1 && matches!(block.block_type, BlockType::Column)
        })
        .count();
    Some((subtree_end(blocks, layout_ix) + 1, column_count))
}

/// Index right after the last descendant of a column.
pub fn column_child_insert_point(blocks: &[Block], column_ix: usize) -> Option<usize> {
    let column = blocks.get(column_ix)?;
    if !matches!(column.block_type, BlockType::Column) {
        return None;
    }
    Some(subtree_end(blocks, column_ix) + 1)
}

/// Nearest ancestor column of `ix` that sits directly in a column layout.
pub fn enclosing_column(blocks: &[Block], outline: &Outline, ix: usize) -> Option<usize> {
    let mut current = outline.parent_of(ix);
    while let Some(candidate) = current {
        let parent = outline.parent_of(candidate);
        if blocks
            .get(candidate)
            .is_some_and(|block| matches!(block.block_type, BlockType::Column))
            && parent.is_some_and(|layout| is_column_layout(blocks, layout))
        {
            return Some(candidate);
        }
        current = parent;
    }
    None
}

/// True when no collapsed row between `column_ix` and `ix` folds `ix` out of
/// the column preview.
pub fn shown_in_column(outline: &Outline, column_ix: usize, ix: usize) -> bool {
    let mut current = outline.parent_of(ix);
    while let Some(parent) = current {
        if parent == column_ix {
            return true;
        }
        if outline.item(parent).is_some_and(|item| item.collapsed) {
            return false;
        }
        current = outline.parent_of(parent);
    }
    false
}

/// Closest row above `ix` that the column shows. `None` at the column's top.
pub fn previous_in_column(outline: &Outline, column_ix: usize, ix: usize) -> Option<usize> {
    (column_ix + 1..ix)
        .rev()
        .find(|&candidate| shown_in_column(outline, column_ix, candidate))
}

/// Insertion point for moving `start..=end` one shown row up or down without
/// leaving the column at `column_ix`. Steps mirror the outline move: down
/// lands after the next row's subtree, up lands before the largest subtree
/// that ends right above the span.
pub fn step_move_target_in_column(
    blocks: &[Block],
    outline: &Outline,
    column_ix: usize,
    start: usize,
    end: usize,
    direction: i32,
) -> Option<usize> {
    if start <= column_ix {
        return None;
    }
    let column_end = subtree_end(blocks, column_ix);
    if direction > 0 {
        let next = (end + 1..=column_end)
            .find(|&candidate| shown_in_column(outline, column_ix, candidate))?;
        return Some(subtree_end(blocks, next) + 1);
    }
    if direction < 0 {
        let prev = previous_in_column(outline, column_ix, start)?;
        let mut target = prev;
        let mut current = outline.parent_of(prev);
        while let Some(ancestor) = current {
            if ancestor <= column_ix || subtree_end(blocks, ancestor) >= start {
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

    fn block(uid: &str, indent: i64) -> Block {
        Block::new(uid, uid, indent)
    }

    fn typed(uid: &str, text: &str, indent: i64, block_type: BlockType) -> Block {
        Block::new(uid, text, indent).with_type(block_type)
    }

    fn layout_doc() -> Vec<Block> {
        vec![
            typed("layout", "", 0, BlockType::ColumnLayout),
            typed("col-a", "Ideas", 1, BlockType::Column),
            block("a1", 2),
            block("a1-child", 3),
            block("a2", 2),
            typed("col-b", "", 1, BlockType::Column),
            block("b1", 2),
            block("after", 0),
        ]
    }

    fn row_uids(column: &ColumnPreview) -> Vec<&str> {
        column.rows.iter().map(|row| row.uid.as_str()).collect()
    }

    #[test]
    fn preview_lists_rows_per_column_with_depth() {
        let blocks = layout_doc();
        let columns = build_column_preview(&blocks, 0, &HashSet::new());
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].label, "Ideas");
        assert_eq!(columns[1].label, "Column 2");
        assert_eq!(row_uids(&columns[0]), vec!["a1", "a1-child", "a2"]);
        let depths: Vec<_> = columns[0].rows.iter().map(|row| row.depth).collect();
        assert_eq!(depths, vec![0, 1, 0]);
        assert_eq!(row_uids(&columns[1]), vec!["b1"]);
        assert_eq!(columns[1].actual_ix, 5);
    }

    #[test]
    fn preview_skips_rows_under_nested_fold() {
        let blocks = layout_doc();
        let collapsed = HashSet::from(["a1".to_string()]);
        let columns = build_column_preview(&blocks, 0, &collapsed);
        assert_eq!(row_uids(&columns[0]), vec!["a1", "a2"]);
        assert!(columns[0].rows[0].collapsed);
    }

    #[test]
    fn preview_is_empty_for_non_layout_blocks() {
        let blocks = layout_doc();
        assert!(build_column_preview(&blocks, 2, &HashSet::new()).is_empty());
        assert!(build_column_preview(&blocks, 99, &HashSet::new()).is_empty());
    }

    #[test]
    fn insert_points_follow_subtrees() {
        let blocks = layout_doc();
        assert_eq!(column_insert_point(&blocks, 0), Some((7, 2)));
        assert_eq!(column_child_insert_point(&blocks, 1), Some(5));
        assert_eq!(column_child_insert_point(&blocks, 5), Some(7));
        assert_eq!(column_child_insert_point(&blocks, 2), None);
    }

    #[test]
    fn enclosing_column_finds_column_ancestor() {
        let blocks = layout_doc();
        let outline = Outline::build(&blocks, &HashSet::new());
        assert_eq!(enclosing_column(&blocks, &outline, 3), Some(1));
        assert_eq!(enclosing_column(&blocks, &outline, 6), Some(5));
        assert_eq!(enclosing_column(&blocks, &outline, 7), None);
    }

    #[test]
    fn shown_in_column_skips_nested_folds() {
        let blocks = layout_doc();
        let collapsed = HashSet::from(["a1".to_string()]);
        let outline = Outline::build(&blocks, &collapsed);
        assert!(shown_in_column(&outline, 1, 2));
        assert!(!shown_in_column(&outline, 1, 3));
        assert!(shown_in_column(&outline, 1, 4));
        assert_eq!(previous_in_column(&outline, 1, 4), Some(2));
        assert_eq!(previous_in_column(&outline, 1, 2), None);
    }

    #[test]
    fn column_moves_stop_at_column_edges() {
        let blocks = layout_doc();
        let outline = Outline::build(&blocks, &HashSet::new());
        // a1 (with a1-child) steps below a2; a2 steps above a1's subtree.
        assert_eq!(step_move_target_in_column(&blocks, &outline, 1, 2, 3, 1), Some(5));
        assert_eq!(step_move_target_in_column(&blocks, &outline, 1, 4, 4, -1), Some(2));
        assert_eq!(step_move_target_in_column(&blocks, &outline, 1, 2, 3, -1), None);
        assert_eq!(step_move_target_in_column(&blocks, &outline, 1, 4, 4, 1), None);
        assert_eq!(step_move_target_in_column(&blocks, &outline, 5, 6, 6, 1), None);
    }
}
